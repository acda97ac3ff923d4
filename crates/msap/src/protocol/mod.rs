// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! Wire codecs for SAP packets and SDP bodies.
//!
//! ```text
//! SessionDescriptor --sdp::encode--> SDP text --sap_packet::encode--> bytes
//! bytes --sap_packet::decode--> (SapHeader, payload) --sdp::decode--> SessionDescriptor
//! ```
//!
//! Both decoders are fed straight off the network: they reject bad input
//! with typed errors and never panic on arbitrary bytes.

pub mod sap_packet;
pub mod sdp;

pub use sap_packet::{MalformedPacket, MessageType, SapHeader, SapPacket};
pub use sdp::MalformedSdp;
