// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! # MSAP - Multicast Session Announcement Protocol
//!
//! A pure Rust implementation of SAP (Session Announcement Protocol,
//! RFC 2974) with SDP session descriptions (RFC 4566), for announcing
//! and discovering media streams on a local network.
//!
//! ## Quick Start
//!
//! Announce a stream:
//!
//! ```rust,no_run
//! use msap::{Announcer, Colourspace, Result, SessionDescriptor};
//!
//! fn main() -> Result<()> {
//!     let announcer = Announcer::new();
//!     announcer.add_announcement(SessionDescriptor::new(
//!         "Camera 1",
//!         "239.192.1.1".parse().expect("valid address"),
//!         5004,
//!         640,
//!         480,
//!         25,
//!         Colourspace::Yuv422,
//!     ))?;
//!     announcer.start()?;
//!
//!     // ... stream runs ...
//!
//!     announcer.stop(); // sends deletion packets
//!     Ok(())
//! }
//! ```
//!
//! Discover streams:
//!
//! ```rust,no_run
//! use msap::{Listener, Result};
//!
//! fn main() -> Result<()> {
//!     let listener = Listener::new();
//!     listener.start()?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(2));
//!     for entry in listener.announcements() {
//!         println!("{} @ {}:{}", entry.descriptor.name,
//!                  entry.descriptor.destination, entry.descriptor.port);
//!     }
//!
//!     listener.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                       Application                            |
//! |          Announcer (send)     |     Listener (receive)       |
//! +--------------------------------------------------------------+
//! |                       Protocol Layer                         |
//! |   sap_packet (RFC 2974 framing) | sdp (RFC 4566 bodies)      |
//! +--------------------------------------------------------------+
//! |                       Transport Layer                        |
//! |   MulticastTransport: 224.2.127.254:9875, all interfaces     |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionDescriptor`] | One media stream: addresses, geometry, colourspace |
//! | [`Announcer`] | Re-announces a session set on a scaled interval |
//! | [`Listener`] | Receives announcements into a [`SessionTable`] |
//! | [`SessionTable`] | Shared table of discovered sessions with expiry |
//!
//! ## Modules Overview
//!
//! - [`session`] - Session descriptor data model
//! - [`protocol`] - SAP and SDP wire codecs
//! - [`transport`] - Multicast socket management
//! - [`table`] - Discovered-session table and expiry sweeper
//!
//! ## See Also
//!
//! - [RFC 2974 - Session Announcement Protocol](https://www.rfc-editor.org/rfc/rfc2974)
//! - [RFC 4566 - SDP: Session Description Protocol](https://www.rfc-editor.org/rfc/rfc4566)

pub mod announcer;
pub mod config;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod session;
pub mod table;
pub mod transport;

pub use announcer::Announcer;
pub use error::{Error, Result};
pub use listener::{Listener, ListenerMetrics};
pub use protocol::{MalformedPacket, MalformedSdp, MessageType, SapHeader, SapPacket};
pub use session::{Colourspace, SessionDescriptor};
pub use table::{SessionEntry, SessionKey, SessionTable};
pub use transport::MulticastTransport;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
