// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! Session descriptor data model.
//!
//! A [`SessionDescriptor`] is one advertised or discovered media stream:
//! where it comes from, where it goes, and enough format metadata
//! (geometry, framerate, colourspace) for a receiver to configure itself.

use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv4Addr};

/// Supported colour/encoding formats, as advertised on the SDP media
/// attribute lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colourspace {
    /// 24-bit RGB, 8 bits per channel.
    Rgb24,
    /// YCbCr 4:2:2 interleaved.
    Yuv422,
    /// 8-bit greyscale.
    Mono8,
    /// 16-bit greyscale.
    Mono16,
    /// JPEG 2000 compressed.
    Jpeg2000,
    /// H.264 (MPEG-4 Part 4 AVC).
    H264Part4,
    /// H.264 (MPEG-4 Part 10).
    H264Part10,
}

impl Colourspace {
    /// RTP payload encoding name for the `a=rtpmap` line.
    pub fn encoding_name(self) -> &'static str {
        match self {
            Colourspace::Rgb24 | Colourspace::Yuv422 | Colourspace::Mono8 | Colourspace::Mono16 => {
                "raw"
            }
            Colourspace::Jpeg2000 => "jpeg2000",
            Colourspace::H264Part4 => "H264",
            Colourspace::H264Part10 => "MP4V-ES",
        }
    }

    /// Sampling string for the `a=fmtp` line.
    pub fn sampling(self) -> &'static str {
        match self {
            Colourspace::Rgb24 => "RGB",
            Colourspace::Yuv422 | Colourspace::Jpeg2000 => "YCbCr-4:2:2",
            Colourspace::Mono8 | Colourspace::Mono16 => "GRAYSCALE",
            Colourspace::H264Part4 | Colourspace::H264Part10 => "YCbCr-4:2:0",
        }
    }

    /// Bit depth per sample for the `a=fmtp` line.
    pub fn depth(self) -> u8 {
        match self {
            Colourspace::Mono16 => 16,
            _ => 8,
        }
    }

    /// Colorimetry string for the `a=fmtp` line, if the format carries one.
    pub fn colorimetry(self) -> Option<&'static str> {
        match self {
            Colourspace::Rgb24 => Some("BT709-2"),
            Colourspace::Yuv422 => Some("BT601-5"),
            _ => None,
        }
    }
}

/// One advertised or discovered media stream.
///
/// Built by the caller on the announce side (then validated and encoded
/// to SDP), or produced by the SDP decoder on the listen side.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescriptor {
    /// Session name (user-chosen, not guaranteed unique on the network).
    pub name: String,
    /// Address the announcement originates from (SDP `o=` line). Distinct
    /// from the stream's destination address.
    pub origin: IpAddr,
    /// Destination address of the media stream (SDP `c=` line).
    pub destination: IpAddr,
    /// Destination UDP port of the media stream.
    pub port: u16,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frames per second.
    pub framerate: u32,
    /// Colour/encoding format.
    pub colourspace: Colourspace,
    /// Raw SDP text this descriptor was decoded from (empty for locally
    /// constructed descriptors). Preserved for diagnostics/pass-through.
    pub sdp_text: String,
}

impl SessionDescriptor {
    /// Create a descriptor for a local stream to be announced.
    ///
    /// The origin address is filled in by the announcer from the selected
    /// source interface; it defaults to unspecified here.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        destination: IpAddr,
        port: u16,
        width: u32,
        height: u32,
        framerate: u32,
        colourspace: Colourspace,
    ) -> Self {
        Self {
            name: name.into(),
            origin: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            destination,
            port,
            height,
            width,
            framerate,
            colourspace,
            sdp_text: String::new(),
        }
    }

    /// Validate the descriptor before it is allowed anywhere near the wire.
    ///
    /// Height, width, framerate and port must all be strictly positive;
    /// an invalid descriptor fails encoding rather than producing
    /// malformed SDP.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidDescriptor("session name is empty".into()));
        }
        if self.height == 0 {
            return Err(Error::InvalidDescriptor("height must be positive".into()));
        }
        if self.width == 0 {
            return Err(Error::InvalidDescriptor("width must be positive".into()));
        }
        if self.framerate == 0 {
            return Err(Error::InvalidDescriptor(
                "framerate must be positive".into(),
            ));
        }
        if self.port == 0 {
            return Err(Error::InvalidDescriptor("port must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_descriptor() -> SessionDescriptor {
        SessionDescriptor::new(
            "HD Stream",
            "239.192.5.2".parse().expect("valid address"),
            5004,
            1920,
            1080,
            30,
            Colourspace::Yuv422,
        )
    }

    #[test]
    fn test_valid_descriptor_passes() {
        assert!(valid_descriptor().validate().is_ok());
    }

    #[test]
    fn test_zero_height_rejected() {
        let mut d = valid_descriptor();
        d.height = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_zero_width_rejected() {
        let mut d = valid_descriptor();
        d.width = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_zero_framerate_rejected() {
        let mut d = valid_descriptor();
        d.framerate = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut d = valid_descriptor();
        d.port = 0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut d = valid_descriptor();
        d.name.clear();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_mono16_depth() {
        assert_eq!(Colourspace::Mono16.depth(), 16);
        assert_eq!(Colourspace::Mono8.depth(), 8);
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(Colourspace::Yuv422.encoding_name(), "raw");
        assert_eq!(Colourspace::Jpeg2000.encoding_name(), "jpeg2000");
        assert_eq!(Colourspace::H264Part4.encoding_name(), "H264");
    }
}
