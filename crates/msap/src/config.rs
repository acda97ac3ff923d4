// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! Protocol constants and timing defaults - single source of truth.
//!
//! Centralizes all SAP (RFC 2974) wire constants and runtime timing
//! defaults. **Never hardcode these elsewhere!**

use std::time::Duration;

// =======================================================================
// SAP wire constants (RFC 2974 Sec.3)
// =======================================================================

/// Well-known SAP IPv4 multicast group (RFC 2974 Sec.3, global scope).
pub const SAP_MULTICAST_IP: [u8; 4] = [224, 2, 127, 254];

/// String version of [`SAP_MULTICAST_IP`] (for fast parsing).
pub const SAP_MULTICAST_GROUP: &str = "224.2.127.254";

/// IPv6 SAP multicast group (RFC 2974 Sec.3, link-local scope `FF0X::2:7FFE`).
pub const SAP_MULTICAST_GROUP_V6: &str = "ff02::2:7ffe";

/// Well-known SAP port (IANA registered).
pub const SAP_PORT: u16 = 9875;

/// SAP protocol version carried in the header version field.
pub const SAP_VERSION: u8 = 1;

/// MIME payload type for SDP bodies.
pub const PAYLOAD_TYPE_SDP: &str = "application/sdp";

/// Maximum UDP datagram we send or accept (MTU-sized, matches the
/// original wire usage; SAP payloads must fit one datagram).
pub const MAX_PACKET_SIZE: usize = 1500;

/// Multicast TTL for announcements. Matches the `/15` scope advertised
/// on the SDP connection line.
pub const SAP_MULTICAST_TTL: u32 = 15;

// =======================================================================
// Timing defaults
// =======================================================================

/// Base announcement interval for a single registered session.
///
/// RFC 2974 Sec.3.1: senders scale the interval with the amount of
/// announcement traffic so aggregate bandwidth stays constant. See
/// [`announce_interval`].
pub const BASE_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Lower clamp for the scaled announcement interval.
pub const MIN_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Upper clamp for the scaled announcement interval.
pub const MAX_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(30);

/// Default session expiry: entries not refreshed within this window are
/// swept (10x the base announce interval - silence implies the sender
/// went away uncleanly).
pub const DEFAULT_EXPIRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Sweeper check rate (1 Hz).
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Compute the effective announcement interval for `session_count`
/// registered sessions.
///
/// The scheduler sends one packet per session per tick, so the tick
/// interval grows linearly with the session count and aggregate
/// announcement bandwidth stays roughly constant (RFC 2974 Sec.3.1
/// self-throttling). Clamped to `[min, max]`.
pub fn announce_interval(
    base: Duration,
    min: Duration,
    max: Duration,
    session_count: usize,
) -> Duration {
    let scaled = base.saturating_mul(session_count.max(1) as u32);
    scaled.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(count: usize) -> Duration {
        announce_interval(
            BASE_ANNOUNCE_INTERVAL,
            MIN_ANNOUNCE_INTERVAL,
            MAX_ANNOUNCE_INTERVAL,
            count,
        )
    }

    #[test]
    fn test_interval_single_session_is_base() {
        assert_eq!(interval(1), Duration::from_secs(1));
    }

    #[test]
    fn test_interval_scales_with_session_count() {
        assert_eq!(interval(5), Duration::from_secs(5));
    }

    #[test]
    fn test_interval_clamped_to_max() {
        assert_eq!(interval(1000), MAX_ANNOUNCE_INTERVAL);
    }

    #[test]
    fn test_interval_zero_sessions_treated_as_one() {
        assert_eq!(interval(0), MIN_ANNOUNCE_INTERVAL);
    }

    #[test]
    fn test_interval_custom_bounds() {
        let fast = announce_interval(
            Duration::from_millis(50),
            Duration::from_millis(50),
            Duration::from_millis(500),
            2,
        );
        assert_eq!(fast, Duration::from_millis(100));
    }
}
