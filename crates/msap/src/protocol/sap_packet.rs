// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! SAP packet framing (RFC 2974 Sec.4).
//!
//! Wire layout:
//!
//! ```text
//! byte 0    V=1 (3 bits) | A | R | T | E | C
//! byte 1    authentication length (32-bit words)
//! bytes 2-3 message identifier hash (big-endian)
//! bytes 4.. originating source (4 bytes IPv4 / 16 bytes IPv6, per A)
//! then      authentication data (auth_len * 4 bytes, skipped)
//! then      NUL-terminated MIME payload type
//! then      payload
//! ```
//!
//! Legacy senders omit the payload-type string and start the payload
//! directly with `v=0`; the decoder accepts that as implicit
//! `application/sdp` (RFC 2974 Sec.6 backward compatibility).

use crate::config::{PAYLOAD_TYPE_SDP, SAP_VERSION};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Flag bit: address type (0 = IPv4, 1 = IPv6).
const FLAG_ADDRESS_TYPE: u8 = 0x10;
/// Flag bit: message type (0 = announcement, 1 = deletion).
const FLAG_MESSAGE_TYPE: u8 = 0x04;
/// Flag bit: payload is encrypted.
const FLAG_ENCRYPTED: u8 = 0x02;
/// Flag bit: payload is zlib-compressed.
const FLAG_COMPRESSED: u8 = 0x01;

/// SAP message type flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Session announcement (flag clear).
    Announcement,
    /// Session deletion (flag set).
    Deletion,
}

/// Parsed SAP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SapHeader {
    /// Announcement or deletion.
    pub message_type: MessageType,
    /// Encryption flag. Recognized but never produced; encrypted
    /// payloads are surfaced opaque for the caller to ignore.
    pub encrypted: bool,
    /// Compression flag. Recognized but never produced.
    pub compressed: bool,
    /// 16-bit message identifier hash; stable per session so receivers
    /// can spot duplicate announcements.
    pub msg_id_hash: u16,
    /// Originating source address (determines the address-type flag).
    pub source: IpAddr,
}

impl SapHeader {
    /// Header for an announcement originating from `source`.
    pub fn announcement(msg_id_hash: u16, source: IpAddr) -> Self {
        Self {
            message_type: MessageType::Announcement,
            encrypted: false,
            compressed: false,
            msg_id_hash,
            source,
        }
    }

    /// Header for a deletion originating from `source`.
    pub fn deletion(msg_id_hash: u16, source: IpAddr) -> Self {
        Self {
            message_type: MessageType::Deletion,
            ..Self::announcement(msg_id_hash, source)
        }
    }
}

/// Decoded SAP packet: header plus payload-type string and raw payload.
///
/// The payload is only SDP when `payload_type` is `application/sdp` and
/// neither the encrypted nor compressed flag is set; callers ignore
/// anything else (SAP permits multiplexed payload types).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SapPacket {
    pub header: SapHeader,
    pub payload_type: String,
    pub payload: Vec<u8>,
}

impl SapPacket {
    /// True when the payload can be handed to the SDP decoder.
    pub fn is_sdp(&self) -> bool {
        self.payload_type == PAYLOAD_TYPE_SDP
            && !self.header.encrypted
            && !self.header.compressed
    }
}

/// SAP framing violations. Non-fatal on the receive path: the packet is
/// dropped and the loop continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedPacket {
    /// Shorter than the fixed header.
    TooShort,
    /// Version field is not the supported SAP version.
    UnsupportedVersion(u8),
    /// Declared address type needs more bytes than the packet has.
    TruncatedSourceAddress,
    /// Declared authentication data runs past the end of the packet.
    TruncatedAuthData,
    /// Payload-type string has no NUL terminator.
    UnterminatedPayloadType,
    /// Payload-type string is not valid UTF-8.
    PayloadTypeNotUtf8,
}

impl std::fmt::Display for MalformedPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedPacket::TooShort => write!(f, "packet shorter than SAP header"),
            MalformedPacket::UnsupportedVersion(v) => write!(f, "unsupported SAP version {}", v),
            MalformedPacket::TruncatedSourceAddress => write!(f, "truncated source address"),
            MalformedPacket::TruncatedAuthData => write!(f, "truncated authentication data"),
            MalformedPacket::UnterminatedPayloadType => {
                write!(f, "payload type string not NUL-terminated")
            }
            MalformedPacket::PayloadTypeNotUtf8 => write!(f, "payload type string not UTF-8"),
        }
    }
}

impl std::error::Error for MalformedPacket {}

/// Stable 16-bit message identifier hash for a session name.
///
/// Receivers use the hash to correlate repeated announcements, so it
/// must not change between re-announcements of the same session.
pub fn message_id_hash(session_name: &str) -> u16 {
    let mut hasher = DefaultHasher::new();
    session_name.hash(&mut hasher);
    (hasher.finish() & 0xFFFF) as u16
}

/// Frame a SAP packet: header fields, NUL-terminated payload type, payload.
///
/// Authentication data is never emitted; the auth length byte is always
/// zero. Incoming auth data is skipped by [`decode`] and not surfaced.
pub fn encode(header: &SapHeader, payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let addr_len = match header.source {
        IpAddr::V4(_) => 4,
        IpAddr::V6(_) => 16,
    };
    let mut buf = Vec::with_capacity(4 + addr_len + payload_type.len() + 1 + payload.len());

    let mut flags = SAP_VERSION << 5;
    if matches!(header.source, IpAddr::V6(_)) {
        flags |= FLAG_ADDRESS_TYPE;
    }
    if header.message_type == MessageType::Deletion {
        flags |= FLAG_MESSAGE_TYPE;
    }
    if header.encrypted {
        flags |= FLAG_ENCRYPTED;
    }
    if header.compressed {
        flags |= FLAG_COMPRESSED;
    }

    buf.push(flags);
    buf.push(0); // auth length: no authentication data produced
    buf.extend_from_slice(&header.msg_id_hash.to_be_bytes());
    match header.source {
        IpAddr::V4(v4) => buf.extend_from_slice(&v4.octets()),
        IpAddr::V6(v6) => buf.extend_from_slice(&v6.octets()),
    }
    buf.extend_from_slice(payload_type.as_bytes());
    buf.push(0);
    buf.extend_from_slice(payload);
    buf
}

/// Parse a SAP packet off the wire.
///
/// Validates minimum length, version, and address-type consistency.
/// Unknown payload types parse successfully; the caller decides whether
/// to ignore them (see [`SapPacket::is_sdp`]).
pub fn decode(buf: &[u8]) -> Result<SapPacket, MalformedPacket> {
    if buf.len() < 4 {
        return Err(MalformedPacket::TooShort);
    }

    let flags = buf[0];
    let version = flags >> 5;
    if version != SAP_VERSION {
        return Err(MalformedPacket::UnsupportedVersion(version));
    }

    let auth_len = buf[1];
    let msg_id_hash = u16::from_be_bytes([buf[2], buf[3]]);

    let addr_len = if flags & FLAG_ADDRESS_TYPE != 0 { 16 } else { 4 };
    if buf.len() < 4 + addr_len {
        return Err(MalformedPacket::TruncatedSourceAddress);
    }
    let source = if addr_len == 16 {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&buf[4..20]);
        IpAddr::V6(Ipv6Addr::from(octets))
    } else {
        let mut octets = [0u8; 4];
        octets.copy_from_slice(&buf[4..8]);
        IpAddr::V4(Ipv4Addr::from(octets))
    };

    let auth_end = 4 + addr_len + usize::from(auth_len) * 4;
    if buf.len() < auth_end {
        return Err(MalformedPacket::TruncatedAuthData);
    }
    let rest = &buf[auth_end..];

    // Legacy senders put the SDP body straight after the header.
    let (payload_type, payload) = if rest.starts_with(b"v=0") {
        (PAYLOAD_TYPE_SDP.to_string(), rest.to_vec())
    } else {
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(MalformedPacket::UnterminatedPayloadType)?;
        let mime = std::str::from_utf8(&rest[..nul])
            .map_err(|_| MalformedPacket::PayloadTypeNotUtf8)?
            .to_string();
        (mime, rest[nul + 1..].to_vec())
    };

    Ok(SapPacket {
        header: SapHeader {
            message_type: if flags & FLAG_MESSAGE_TYPE != 0 {
                MessageType::Deletion
            } else {
                MessageType::Announcement
            },
            encrypted: flags & FLAG_ENCRYPTED != 0,
            compressed: flags & FLAG_COMPRESSED != 0,
            msg_id_hash,
            source,
        },
        payload_type,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4_source() -> IpAddr {
        "192.168.1.10".parse().expect("valid address")
    }

    #[test]
    fn test_roundtrip_announcement_v4() {
        let header = SapHeader::announcement(0xBEEF, v4_source());
        let sdp = b"v=0\r\ns=Stream 1\r\n";
        let bytes = encode(&header, PAYLOAD_TYPE_SDP, sdp);

        let packet = decode(&bytes).expect("decode should succeed");
        assert_eq!(packet.header, header);
        assert_eq!(packet.payload_type, PAYLOAD_TYPE_SDP);
        assert_eq!(packet.payload, sdp);
        assert!(packet.is_sdp());
    }

    #[test]
    fn test_roundtrip_deletion_v6() {
        let source: IpAddr = "fe80::1".parse().expect("valid address");
        let header = SapHeader::deletion(0x0102, source);
        let bytes = encode(&header, PAYLOAD_TYPE_SDP, b"v=0\r\n");

        let packet = decode(&bytes).expect("decode should succeed");
        assert_eq!(packet.header.message_type, MessageType::Deletion);
        assert_eq!(packet.header.source, source);
        assert_eq!(packet.header.msg_id_hash, 0x0102);
    }

    #[test]
    fn test_too_short_rejected() {
        assert_eq!(decode(&[0x20, 0, 0]), Err(MalformedPacket::TooShort));
    }

    #[test]
    fn test_bad_version_rejected() {
        // Version bits 011 instead of 001.
        let mut bytes = encode(&SapHeader::announcement(1, v4_source()), PAYLOAD_TYPE_SDP, b"");
        bytes[0] = (bytes[0] & 0x1F) | (3 << 5);
        assert_eq!(decode(&bytes), Err(MalformedPacket::UnsupportedVersion(3)));
    }

    #[test]
    fn test_truncated_v6_source_rejected() {
        // Address-type flag set but only 4 source bytes present.
        let bytes = [0x20 | FLAG_ADDRESS_TYPE, 0, 0, 0, 10, 0, 0, 1];
        assert_eq!(decode(&bytes), Err(MalformedPacket::TruncatedSourceAddress));
    }

    #[test]
    fn test_truncated_auth_data_rejected() {
        // Auth length claims 4 words that are not there.
        let bytes = [0x20, 4, 0, 0, 10, 0, 0, 1];
        assert_eq!(decode(&bytes), Err(MalformedPacket::TruncatedAuthData));
    }

    #[test]
    fn test_auth_data_skipped_and_header_reencodes_exactly() {
        // One 32-bit word of auth data between the source and the
        // payload type; the decoder skips it without surfacing it.
        let mut bytes = vec![0x20, 1, 0xBE, 0xEF, 192, 168, 1, 10];
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        bytes.extend_from_slice(b"application/sdp\0v=0\r\n");

        let packet = decode(&bytes).expect("decode should succeed");
        assert_eq!(packet.header, SapHeader::announcement(0xBEEF, v4_source()));
        assert_eq!(packet.payload, b"v=0\r\n");

        // Re-encoding the decoded header yields an auth-free packet that
        // decodes to the same thing.
        let reencoded = encode(&packet.header, &packet.payload_type, &packet.payload);
        assert_eq!(reencoded[1], 0);
        assert_eq!(decode(&reencoded).expect("decode should succeed"), packet);
    }

    #[test]
    fn test_unterminated_payload_type_rejected() {
        let mut bytes = vec![0x20, 0, 0, 0, 10, 0, 0, 1];
        bytes.extend_from_slice(b"application/sdp"); // no NUL, no v=0
        assert_eq!(decode(&bytes), Err(MalformedPacket::UnterminatedPayloadType));
    }

    #[test]
    fn test_legacy_packet_without_payload_type() {
        // Original senders start the payload directly with "v=0".
        let mut bytes = vec![0x20, 0, 0xAB, 0xCD, 192, 168, 1, 10];
        bytes.extend_from_slice(b"v=0\r\ns=legacy\r\n");

        let packet = decode(&bytes).expect("decode should succeed");
        assert_eq!(packet.payload_type, PAYLOAD_TYPE_SDP);
        assert!(packet.payload.starts_with(b"v=0"));
        assert_eq!(packet.header.msg_id_hash, 0xABCD);
    }

    #[test]
    fn test_unknown_payload_type_surfaced_not_fatal() {
        let header = SapHeader::announcement(7, v4_source());
        let bytes = encode(&header, "application/x-vendor", b"blob");

        let packet = decode(&bytes).expect("decode should succeed");
        assert_eq!(packet.payload_type, "application/x-vendor");
        assert!(!packet.is_sdp());
    }

    #[test]
    fn test_encrypted_flag_surfaced_opaque() {
        let mut header = SapHeader::announcement(7, v4_source());
        header.encrypted = true;
        let bytes = encode(&header, PAYLOAD_TYPE_SDP, b"garbage");

        let packet = decode(&bytes).expect("decode should succeed");
        assert!(packet.header.encrypted);
        assert!(!packet.is_sdp());
    }

    #[test]
    fn test_message_id_hash_stable() {
        assert_eq!(message_id_hash("Stream 1"), message_id_hash("Stream 1"));
        assert_ne!(message_id_hash("Stream 1"), message_id_hash("Stream 2"));
    }

    #[test]
    fn test_random_garbage_never_panics() {
        // The decoder sits on an open multicast port; arbitrary bytes
        // must produce an error or a packet, never a panic.
        fastrand::seed(0x5EED);
        for _ in 0..500 {
            let len = fastrand::usize(0..256);
            let buf: Vec<u8> = (0..len).map(|_| fastrand::u8(..)).collect();
            let _ = decode(&buf);
        }
    }
}
