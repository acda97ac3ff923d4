// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! SAP listener thread.
//!
//! Spawns a dedicated IO thread that receives SAP packets from the
//! multicast group, decodes them, and maintains the session table.
//! A companion sweeper thread expires sessions whose announcements
//! stopped arriving.
//!
//! # Architecture
//!
//! ```text
//! mio::poll() -> recv_from(buf) -> sap_packet::decode() -> sdp::decode()
//!                                                              v
//!                                      SessionTable (upsert / remove)
//! ```

use crate::config::{DEFAULT_EXPIRY_TIMEOUT, MAX_PACKET_SIZE};
use crate::error::{Error, Result};
use crate::protocol::sap_packet::{self, MessageType};
use crate::protocol::sdp;
use crate::table::{ExpirySweeper, SessionEntry, SessionKey, SessionTable};
use crate::transport::MulticastTransport;
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Listener metrics for diagnostics
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    /// Total packets received (all types)
    pub packets_received: AtomicU64,
    /// Packets dropped (non-SDP payload, encrypted, compressed)
    pub packets_dropped: AtomicU64,
    /// Invalid packets (malformed SAP header or SDP body)
    pub packets_invalid: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
}

impl ListenerMetrics {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get snapshot of metrics: (received, dropped, invalid, bytes).
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.packets_received.load(Ordering::Relaxed),
            self.packets_dropped.load(Ordering::Relaxed),
            self.packets_invalid.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
        )
    }
}

/// SAP session listener.
///
/// `start()` binds the SAP socket, joins the multicast group and spawns
/// the receive and sweeper threads. `stop()` shuts both down; the
/// session table keeps its entries so callers can still inspect the
/// last known state.
pub struct Listener {
    table: SessionTable,
    metrics: Arc<ListenerMetrics>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    sweeper: Mutex<Option<ExpirySweeper>>,
    expiry: Duration,
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener {
    /// Listener with the default expiry window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_expiry(DEFAULT_EXPIRY_TIMEOUT)
    }

    /// Listener with a custom expiry window (tests, slow announcers).
    #[must_use]
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            table: SessionTable::new(),
            metrics: ListenerMetrics::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            sweeper: Mutex::new(None),
            expiry,
        }
    }

    /// Bind the SAP socket and start the receive and sweeper threads.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(Error::InvalidState("listener already running".into()));
        }

        let transport = match MulticastTransport::new() {
            Ok(t) => t,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(e);
            }
        };
        let socket = transport.socket();
        socket.set_nonblocking(true).map_err(|e| {
            self.running.store(false, Ordering::Release);
            Error::IoError(e)
        })?;

        let table = self.table.clone();
        let metrics = Arc::clone(&self.metrics);
        let running = Arc::clone(&self.running);
        let expiry = self.expiry;

        let handle = std::thread::Builder::new()
            .name("msap-listener".to_string())
            .spawn(move || {
                // Transport moves into the thread so the group membership
                // lives as long as the receive loop.
                let _transport = transport;
                Self::run_loop(&socket, &table, &metrics, &running, expiry);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                Error::IoError(e)
            })?;

        let sweeper = match ExpirySweeper::start(self.table.clone()) {
            Ok(s) => s,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                return Err(Error::IoError(e));
            }
        };

        *self.handle.lock() = Some(handle);
        *self.sweeper.lock() = Some(sweeper);
        log::info!("[listener] started");
        Ok(())
    }

    /// Main IO loop (runs in dedicated thread).
    fn run_loop(
        socket: &std::net::UdpSocket,
        table: &SessionTable,
        metrics: &ListenerMetrics,
        running: &AtomicBool,
        expiry: Duration,
    ) {
        let mut poll = match Poll::new() {
            Ok(p) => p,
            Err(e) => {
                log::error!("[listener] failed to create mio Poll: {}", e);
                return;
            }
        };
        let mut events = Events::with_capacity(16);

        // Clone the socket because Arc<UdpSocket> doesn't implement Source.
        let socket_clone = match socket.try_clone() {
            Ok(s) => s,
            Err(e) => {
                log::error!("[listener] failed to clone socket: {}", e);
                return;
            }
        };
        let mut mio_socket = mio::net::UdpSocket::from_std(socket_clone);

        const SOCKET_TOKEN: Token = Token(0);
        if let Err(e) = poll
            .registry()
            .register(&mut mio_socket, SOCKET_TOKEN, Interest::READABLE)
        {
            log::error!("[listener] failed to register socket with poll: {}", e);
            return;
        }

        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        while running.load(Ordering::Relaxed) {
            // Short timeout so shutdown is noticed promptly.
            if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(10))) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::debug!("[listener] poll error: {:?}", e);
                }
                continue;
            }

            for event in events.iter() {
                if event.token() != SOCKET_TOKEN {
                    continue;
                }

                // Drain all available packets (edge-triggered style)
                loop {
                    let (len, src_addr) = match mio_socket.recv_from(&mut buf) {
                        Ok(result) => result,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            log::debug!("[listener] recv_from error: {:?}", e);
                            break;
                        }
                    };

                    metrics.packets_received.fetch_add(1, Ordering::Relaxed);
                    metrics
                        .bytes_received
                        .fetch_add(len as u64, Ordering::Relaxed);

                    Self::handle_packet(table, metrics, expiry, &buf[..len], src_addr);
                }
            }
        }

        log::debug!("[listener] receive thread exiting");
    }

    /// Process one received datagram. Separated from the socket loop so
    /// the decode and table logic is testable without a network.
    fn handle_packet(
        table: &SessionTable,
        metrics: &ListenerMetrics,
        expiry: Duration,
        data: &[u8],
        src_addr: SocketAddr,
    ) {
        let packet = match sap_packet::decode(data) {
            Ok(p) => p,
            Err(e) => {
                log::debug!("[listener] malformed SAP packet from {}: {}", src_addr, e);
                metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        // Encrypted/compressed payloads are valid SAP but opaque to us.
        if packet.header.encrypted || packet.header.compressed {
            log::debug!(
                "[listener] skipping {} payload from {}",
                if packet.header.encrypted {
                    "encrypted"
                } else {
                    "compressed"
                },
                src_addr
            );
            metrics.packets_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if !packet.is_sdp() {
            log::debug!(
                "[listener] skipping payload type '{}' from {}",
                packet.payload_type,
                src_addr
            );
            metrics.packets_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let descriptor = match sdp::decode(&packet.payload) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("[listener] malformed SDP from {}: {}", src_addr, e);
                metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        // Identity is (name, originating source). Fall back to the UDP
        // source when the header carries an unspecified address.
        let source = if packet.header.source.is_unspecified() {
            src_addr.ip()
        } else {
            packet.header.source
        };
        let key = SessionKey {
            name: descriptor.name.clone(),
            source,
        };

        match packet.header.message_type {
            MessageType::Announcement => {
                if table.upsert(key, descriptor, expiry) {
                    log::info!("[listener] discovered session from {}", source);
                }
            }
            MessageType::Deletion => {
                if table.remove(&key).is_some() {
                    log::info!("[listener] session '{}' deleted by {}", key.name, source);
                }
            }
        }
    }

    /// Stop the receive and sweeper threads.
    ///
    /// The session table keeps its entries. Safe to call multiple times.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        log::info!("[listener] stopped");
    }

    /// Whether the receive thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Snapshot of the currently known sessions.
    #[must_use]
    pub fn announcements(&self) -> Vec<SessionEntry> {
        self.table.snapshot()
    }

    /// Shared session table, for callers that want to watch it directly.
    #[must_use]
    pub fn table(&self) -> SessionTable {
        self.table.clone()
    }

    /// Listener metrics handle.
    #[must_use]
    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}
