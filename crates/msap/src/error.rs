// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! Crate-level error type.
//!
//! Parse errors on received traffic never surface here - malformed
//! packets are dropped at the point of occurrence (the network is
//! noisy by nature). This enum covers construction-time and
//! transport-time failures, which are always surfaced synchronously
//! to the caller.

use std::fmt;

/// Errors surfaced by the announcer/listener public API.
#[derive(Debug)]
pub enum Error {
    /// Caller-supplied descriptor failed validation (zero dimension,
    /// port, or framerate). Rejected before anything reaches the wire.
    InvalidDescriptor(String),
    /// Operation not valid in the current lifecycle state.
    InvalidState(String),
    /// Generic I/O error with underlying cause.
    IoError(std::io::Error),
    /// Failed to bind the SAP socket.
    BindFailed(String),
    /// Failed to join the SAP multicast group.
    MulticastJoinFailed(String),
    /// Send operation failed.
    SendFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDescriptor(msg) => write!(f, "Invalid session descriptor: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::MulticastJoinFailed(msg) => write!(f, "Multicast join failed: {}", msg),
            Error::SendFailed(msg) => write!(f, "Send failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::InvalidDescriptor("height must be positive".into());
        assert_eq!(
            e.to_string(),
            "Invalid session descriptor: height must be positive"
        );

        let e = Error::SendFailed("network unreachable".into());
        assert_eq!(e.to_string(), "Send failed: network unreachable");
    }

    #[test]
    fn test_io_error_source_preserved() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let e = Error::from(io);
        assert!(e.source().is_some());
    }
}
