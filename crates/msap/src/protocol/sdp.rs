// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! SDP body generation and parsing (RFC 4566).
//!
//! The encoder produces a minimally-valid session description: version,
//! origin, session name, connection, time-active and one video media
//! section with format attributes. The decoder is line-oriented and
//! lenient: unknown or malformed lines are skipped (vendor extensions
//! are common), but a body without origin, connection or media lines is
//! rejected.

use crate::error::Result;
use crate::session::{Colourspace, SessionDescriptor};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// SDP body violations. Non-fatal on the receive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedSdp {
    /// Payload is not UTF-8 text.
    NotUtf8,
    /// No parseable `o=` line.
    MissingOrigin,
    /// No parseable `c=` line.
    MissingConnection,
    /// No parseable `m=` line.
    MissingMedia,
}

impl std::fmt::Display for MalformedSdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedSdp::NotUtf8 => write!(f, "SDP payload is not UTF-8"),
            MalformedSdp::MissingOrigin => write!(f, "missing origin (o=) line"),
            MalformedSdp::MissingConnection => write!(f, "missing connection (c=) line"),
            MalformedSdp::MissingMedia => write!(f, "missing media (m=) line"),
        }
    }
}

impl std::error::Error for MalformedSdp {}

fn addr_type(addr: IpAddr) -> &'static str {
    match addr {
        IpAddr::V4(_) => "IP4",
        IpAddr::V6(_) => "IP6",
    }
}

/// Encode a descriptor into SDP text.
///
/// Validates the descriptor first: an invalid descriptor fails here
/// rather than producing malformed SDP on the wire.
pub fn encode(desc: &SessionDescriptor) -> Result<String> {
    desc.validate()?;

    // Session id/version: seconds since the epoch, as the original
    // announcer does. Receivers only need it to be present.
    let session_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let cs = desc.colourspace;
    let colorimetry = cs
        .colorimetry()
        .map(|c| format!("colorimetry={}; ", c))
        .unwrap_or_default();

    let mut sdp = format!(
        "v=0\r\n\
         o=- {id} {id} IN {ot} {origin}\r\n\
         s={name}\r\n\
         c=IN {ct} {dest}/15\r\n\
         t=0 0\r\n\
         m=video {port} RTP/AVP 96\r\n\
         a=rtpmap:96 {enc}/90000\r\n",
        id = session_id,
        ot = addr_type(desc.origin),
        origin = desc.origin,
        name = desc.name,
        ct = addr_type(desc.destination),
        dest = desc.destination,
        port = desc.port,
        enc = cs.encoding_name(),
    );
    sdp.push_str(&format!(
        "a=fmtp:96 sampling={}; width={}; height={}; depth={}; {}progressive\r\n",
        cs.sampling(),
        desc.width,
        desc.height,
        cs.depth(),
        colorimetry,
    ));
    sdp.push_str(&format!("a=framerate:{}\r\n", desc.framerate));
    Ok(sdp)
}

/// Accumulated state while walking the SDP lines.
#[derive(Default)]
struct SdpFields {
    name: Option<String>,
    origin: Option<IpAddr>,
    destination: Option<IpAddr>,
    port: Option<u16>,
    encoding_name: Option<String>,
    attributes: HashMap<String, String>,
    framerate: Option<u32>,
}

/// Decode an SDP payload into a descriptor.
///
/// Unknown and malformed lines are skipped; only the absence of the
/// mandatory origin, connection and media lines is an error. The raw
/// text is preserved in the returned descriptor's `sdp_text`.
pub fn decode(payload: &[u8]) -> std::result::Result<SessionDescriptor, MalformedSdp> {
    let text = std::str::from_utf8(payload).map_err(|_| MalformedSdp::NotUtf8)?;

    let mut fields = SdpFields::default();
    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches(['\r', '\0']);
        if line.len() < 2 {
            continue;
        }
        let (kind, rest) = line.split_at(2);
        match kind {
            "s=" => fields.name = Some(rest.to_string()),
            "o=" => parse_origin(rest, &mut fields),
            "c=" => parse_connection(rest, &mut fields),
            "m=" => parse_media(rest, &mut fields),
            "a=" => parse_attribute(rest, &mut fields),
            // v=, t=, b=, i=, ... carry nothing we need; vendor lines
            // and anything unparseable are skipped by design of SAP
            // receivers.
            _ => {}
        }
    }

    let origin = fields.origin.ok_or(MalformedSdp::MissingOrigin)?;
    let destination = fields.destination.ok_or(MalformedSdp::MissingConnection)?;
    let port = fields.port.ok_or(MalformedSdp::MissingMedia)?;

    let width = parse_attr_u32(&fields.attributes, "width");
    let height = parse_attr_u32(&fields.attributes, "height");
    let depth = parse_attr_u32(&fields.attributes, "depth");
    let colourspace = resolve_colourspace(
        fields.encoding_name.as_deref(),
        fields.attributes.get("sampling").map(String::as_str),
        fields.attributes.get("profile-level-id").map(String::as_str),
        depth,
    );

    Ok(SessionDescriptor {
        name: fields.name.unwrap_or_default(),
        origin,
        destination,
        port,
        height,
        width,
        framerate: fields.framerate.unwrap_or(0),
        colourspace,
        sdp_text: text.to_string(),
    })
}

/// `o=<username> <sess-id> <sess-version> <nettype> <addrtype> <addr>`:
/// the origin address is the last token, minus any `/ttl` suffix.
fn parse_origin(rest: &str, fields: &mut SdpFields) {
    if let Some(last) = rest.split_whitespace().last() {
        let addr = last.split('/').next().unwrap_or(last);
        if let Ok(ip) = addr.parse::<IpAddr>() {
            fields.origin = Some(ip);
        }
    }
}

/// `c=IN IP4 <addr>[/ttl]` or `c=IN IP6 <addr>`.
fn parse_connection(rest: &str, fields: &mut SdpFields) {
    let mut tokens = rest.split_whitespace();
    if tokens.next() != Some("IN") {
        return;
    }
    let Some(addrtype) = tokens.next() else { return };
    if addrtype != "IP4" && addrtype != "IP6" {
        return;
    }
    if let Some(addr) = tokens.next() {
        let addr = addr.split('/').next().unwrap_or(addr);
        if let Ok(ip) = addr.parse::<IpAddr>() {
            fields.destination = Some(ip);
        }
    }
}

/// `m=<media> <port>[/<count>] <proto> <fmt>`: second token is the
/// port, optionally followed by a port count for hierarchically
/// encoded streams.
fn parse_media(rest: &str, fields: &mut SdpFields) {
    let mut tokens = rest.split_whitespace();
    let _media = tokens.next();
    if let Some(port_field) = tokens.next() {
        let port = port_field.split('/').next().unwrap_or(port_field);
        if let Ok(port) = port.parse::<u16>() {
            fields.port = Some(port);
        }
    }
}

/// Attribute lines we understand: `rtpmap:96 <enc>/90000`,
/// `fmtp:96 k=v; k=v; ...`, `framerate:<n>`. Everything else is kept in
/// the attribute map untouched (and otherwise ignored).
fn parse_attribute(rest: &str, fields: &mut SdpFields) {
    if let Some(rtpmap) = rest.strip_prefix("rtpmap:") {
        // "96 raw/90000" -> "raw"
        if let Some(entry) = rtpmap.split_whitespace().nth(1) {
            let enc = entry.split('/').next().unwrap_or(entry);
            fields.encoding_name = Some(enc.to_string());
        }
    } else if let Some(fmtp) = rest.strip_prefix("fmtp:") {
        // Skip the payload-type number, then split "k=v; k=v" pairs.
        let params = fmtp.split_once(' ').map_or("", |(_, p)| p);
        for pair in params.split(';') {
            let pair = pair.trim();
            if let Some((key, value)) = pair.split_once('=') {
                fields
                    .attributes
                    .insert(key.trim().to_string(), value.trim().to_string());
            } else if !pair.is_empty() {
                // Bare flags like "progressive".
                fields.attributes.insert(pair.to_string(), String::new());
            }
        }
    } else if let Some(rate) = rest.strip_prefix("framerate:") {
        // Fractional rates (29.97 NTSC) truncate to their integer part.
        let rate = rate.trim();
        let whole = rate.split('.').next().unwrap_or(rate);
        if let Ok(fps) = whole.parse::<u32>() {
            fields.framerate = Some(fps);
        }
    }
}

fn parse_attr_u32(attributes: &HashMap<String, String>, key: &str) -> u32 {
    attributes
        .get(key)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0)
}

/// Map rtpmap encoding name + fmtp attributes back to a colourspace.
///
/// The rtpmap name wins when it is unambiguous; raw formats fall back
/// to the sampling string and bit depth. H.264 senders that omit the
/// rtpmap line are recognized by their profile-level-id, as the
/// original listener does. Anything else defaults to JPEG 2000.
fn resolve_colourspace(
    encoding_name: Option<&str>,
    sampling: Option<&str>,
    profile_level_id: Option<&str>,
    depth: u32,
) -> Colourspace {
    match encoding_name {
        Some("H264") => return Colourspace::H264Part4,
        Some("MP4V-ES") => return Colourspace::H264Part10,
        Some("jpeg2000") => return Colourspace::Jpeg2000,
        _ => {}
    }
    match sampling {
        Some("RGB") => return Colourspace::Rgb24,
        Some("YCbCr-4:2:2") => return Colourspace::Yuv422,
        Some("GRAYSCALE") | Some("Mono") => {
            return if depth == 16 {
                Colourspace::Mono16
            } else {
                Colourspace::Mono8
            };
        }
        _ => {}
    }
    if profile_level_id.is_some_and(|p| p.eq_ignore_ascii_case("42A01E")) {
        return Colourspace::H264Part4;
    }
    Colourspace::Jpeg2000
}
