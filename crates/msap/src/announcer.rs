// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! Periodic SAP announcer.
//!
//! Maintains a set of session descriptors and re-announces each of them
//! from a background thread. The announce interval scales with the
//! number of advertised sessions (RFC 2974 bandwidth self-throttling):
//! `base * session_count`, clamped to the configured bounds.
//!
//! On shutdown the announcer sends a deletion packet for every session
//! so receivers drop them immediately instead of waiting for expiry.

use crate::config::{
    announce_interval, BASE_ANNOUNCE_INTERVAL, MAX_ANNOUNCE_INTERVAL, MIN_ANNOUNCE_INTERVAL,
    PAYLOAD_TYPE_SDP,
};
use crate::error::{Error, Result};
use crate::protocol::sap_packet::{self, SapHeader};
use crate::protocol::sdp;
use crate::session::SessionDescriptor;
use crate::transport::MulticastTransport;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Consecutive all-fail announce cycles before the announcer gives up.
const MAX_FAILED_CYCLES: u32 = 3;

/// Shared announcement set, keyed by session name.
type SessionSet = Arc<Mutex<HashMap<String, SessionDescriptor>>>;

/// Periodic session announcer.
///
/// `add_announcement`/`remove_announcement` may be called before or
/// after `start()`; the scheduler picks up changes on its next cycle.
pub struct Announcer {
    sessions: SessionSet,
    transport: Mutex<Option<Arc<MulticastTransport>>>,
    running: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    base_interval: Duration,
    min_interval: Duration,
    max_interval: Duration,
}

impl Default for Announcer {
    fn default() -> Self {
        Self::new()
    }
}

impl Announcer {
    /// Announcer with the standard RFC 2974 interval bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_intervals(
            BASE_ANNOUNCE_INTERVAL,
            MIN_ANNOUNCE_INTERVAL,
            MAX_ANNOUNCE_INTERVAL,
        )
    }

    /// Announcer with custom interval bounds (tests, constrained links).
    #[must_use]
    pub fn with_intervals(base: Duration, min: Duration, max: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            transport: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            last_error: Arc::new(Mutex::new(None)),
            stop_tx: Mutex::new(None),
            handle: Mutex::new(None),
            base_interval: base,
            min_interval: min,
            max_interval: max,
        }
    }

    /// Add a session to the announcement set, or replace the existing
    /// descriptor with the same name. Validation happens here, so an
    /// invalid descriptor never reaches the scheduler.
    pub fn add_announcement(&self, descriptor: SessionDescriptor) -> Result<()> {
        descriptor.validate()?;
        let mut sessions = self.sessions.lock();
        if sessions
            .insert(descriptor.name.clone(), descriptor.clone())
            .is_some()
        {
            log::debug!("[announcer] replaced announcement '{}'", descriptor.name);
        } else {
            log::info!("[announcer] added announcement '{}'", descriptor.name);
        }
        Ok(())
    }

    /// Remove a session from the announcement set.
    ///
    /// If the announcer is running, a deletion packet is sent
    /// immediately (best-effort) so receivers drop the session without
    /// waiting for expiry. Removing an unknown name is a no-op.
    pub fn remove_announcement(&self, name: &str) -> Result<()> {
        let removed = self.sessions.lock().remove(name);
        let Some(descriptor) = removed else {
            return Ok(());
        };
        log::info!("[announcer] removed announcement '{}'", name);

        if self.running.load(Ordering::Acquire) {
            let transport = self.transport.lock().clone();
            if let Some(transport) = transport {
                if let Err(e) = send_deletion(&transport, &descriptor) {
                    log::warn!("[announcer] deletion for '{}' failed: {}", name, e);
                }
            }
        }
        Ok(())
    }

    /// Number of sessions currently in the announcement set.
    #[must_use]
    pub fn active_stream_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the scheduler thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Last fatal transport error, if the scheduler gave up.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Bind the SAP socket and start the scheduler thread.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(Error::InvalidState("announcer already running".into()));
        }
        *self.last_error.lock() = None;

        let transport = match MulticastTransport::new() {
            Ok(t) => Arc::new(t),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(e);
            }
        };
        *self.transport.lock() = Some(Arc::clone(&transport));

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let sessions = Arc::clone(&self.sessions);
        let running = Arc::clone(&self.running);
        let last_error = Arc::clone(&self.last_error);
        let (base, min, max) = (self.base_interval, self.min_interval, self.max_interval);

        let handle = std::thread::Builder::new()
            .name("msap-announcer".to_string())
            .spawn(move || {
                Self::run_loop(&sessions, &transport, &stop_rx, &running, &last_error, base, min, max);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                Error::IoError(e)
            })?;

        *self.stop_tx.lock() = Some(stop_tx);
        *self.handle.lock() = Some(handle);
        log::info!("[announcer] started");
        Ok(())
    }

    /// Scheduler loop: wait one interval, announce everything, repeat.
    #[allow(clippy::too_many_arguments)]
    fn run_loop(
        sessions: &SessionSet,
        transport: &MulticastTransport,
        stop_rx: &Receiver<()>,
        running: &AtomicBool,
        last_error: &Mutex<Option<String>>,
        base: Duration,
        min: Duration,
        max: Duration,
    ) {
        let mut failed_cycles: u32 = 0;

        loop {
            let count = sessions.lock().len();
            let interval = announce_interval(base, min, max, count);

            match stop_rx.recv_timeout(interval) {
                Ok(()) | Err(channel::RecvTimeoutError::Disconnected) => break,
                Err(channel::RecvTimeoutError::Timeout) => {}
            }

            let snapshot: Vec<SessionDescriptor> = sessions.lock().values().cloned().collect();
            if snapshot.is_empty() {
                failed_cycles = 0;
                continue;
            }

            let mut failures = 0;
            for descriptor in &snapshot {
                match send_announcement(transport, descriptor) {
                    Ok(()) => {
                        log::debug!("[announcer] announced '{}'", descriptor.name);
                    }
                    Err(e) => {
                        log::warn!("[announcer] announce '{}' failed: {}", descriptor.name, e);
                        failures += 1;
                    }
                }
            }

            if failures == snapshot.len() {
                failed_cycles += 1;
                if failed_cycles >= MAX_FAILED_CYCLES {
                    let msg = format!(
                        "{} consecutive announce cycles failed, giving up",
                        failed_cycles
                    );
                    log::error!("[announcer] {}", msg);
                    *last_error.lock() = Some(msg);
                    running.store(false, Ordering::Release);
                    return;
                }
            } else {
                failed_cycles = 0;
            }
        }

        // Graceful shutdown: tell receivers the sessions are gone.
        let snapshot: Vec<SessionDescriptor> = sessions.lock().values().cloned().collect();
        for descriptor in &snapshot {
            if let Err(e) = send_deletion(transport, descriptor) {
                log::warn!(
                    "[announcer] shutdown deletion for '{}' failed: {}",
                    descriptor.name,
                    e
                );
            }
        }
        running.store(false, Ordering::Release);
        log::info!("[announcer] stopped");
    }

    /// Stop the scheduler, sending deletions for all sessions first.
    /// Safe to call multiple times.
    pub fn stop(&self) {
        // Drop the sender: the scheduler sees Disconnected and exits
        // after sending its deletions.
        drop(self.stop_tx.lock().take());
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        *self.transport.lock() = None;
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fill in the origin if the caller left it unspecified.
fn effective_descriptor(
    transport: &MulticastTransport,
    descriptor: &SessionDescriptor,
) -> SessionDescriptor {
    let mut d = descriptor.clone();
    if d.origin.is_unspecified() {
        d.origin = transport.source_ip();
    }
    d
}

fn send_announcement(transport: &MulticastTransport, descriptor: &SessionDescriptor) -> Result<()> {
    let d = effective_descriptor(transport, descriptor);
    let sdp_text = sdp::encode(&d)?;
    let header = SapHeader::announcement(sap_packet::message_id_hash(&d.name), d.origin);
    let packet = sap_packet::encode(&header, PAYLOAD_TYPE_SDP, sdp_text.as_bytes());
    transport.send(&packet)
}

fn send_deletion(transport: &MulticastTransport, descriptor: &SessionDescriptor) -> Result<()> {
    let d = effective_descriptor(transport, descriptor);
    let sdp_text = sdp::encode(&d)?;
    let header = SapHeader::deletion(sap_packet::message_id_hash(&d.name), d.origin);
    let packet = sap_packet::encode(&header, PAYLOAD_TYPE_SDP, sdp_text.as_bytes());
    transport.send(&packet)
}
