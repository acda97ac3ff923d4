// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 msap contributors

//! Discovered-session table and expiry tracking.
//!
//! The listener stores every announced session here, keyed by
//! (session name, originating source). A background thread (1 Hz)
//! removes entries whose announcements stopped arriving.

use crate::config::SWEEP_INTERVAL;
use crate::session::SessionDescriptor;
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Table key. Two senders may use the same session name, so the
/// originating source address is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// Session name from the SDP `s=` line.
    pub name: String,
    /// Originating source from the SAP header.
    pub source: IpAddr,
}

/// One discovered session plus its liveness bookkeeping.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Decoded session description.
    pub descriptor: SessionDescriptor,
    /// Originating source from the SAP header.
    pub source: IpAddr,
    /// When the last announcement for this session arrived.
    pub last_seen: Instant,
    /// How long after `last_seen` the entry is considered stale.
    pub expiry: Duration,
}

impl SessionEntry {
    /// New entry, fresh as of now.
    pub fn new(descriptor: SessionDescriptor, source: IpAddr, expiry: Duration) -> Self {
        Self {
            descriptor,
            source,
            last_seen: Instant::now(),
            expiry,
        }
    }

    /// True once the expiry window has elapsed without a refresh.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.last_seen.elapsed() >= self.expiry
    }

    /// Re-announcement arrived: replace the descriptor and reset liveness.
    pub fn refresh(&mut self, descriptor: SessionDescriptor) {
        self.descriptor = descriptor;
        self.last_seen = Instant::now();
    }
}

/// Macro to generate poisoned lock recovery functions (eliminates duplication)
macro_rules! impl_recover_lock {
    ($fn_name:ident, $lock_method:ident, $guard_type:ty) => {
        fn $fn_name<'a, T>(lock: &'a RwLock<T>, context: &str) -> $guard_type {
            match lock.$lock_method() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    log::debug!("[table] WARNING: {} poisoned, recovering", context);
                    poisoned.into_inner()
                }
            }
        }
    };
}

impl_recover_lock!(recover_read, read, RwLockReadGuard<'a, T>);
impl_recover_lock!(recover_write, write, RwLockWriteGuard<'a, T>);

/// Shared table of currently-announced sessions.
///
/// Cheap to clone (Arc inside); the listener's receive thread writes,
/// the sweeper and API readers read.
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<RwLock<HashMap<SessionKey, SessionEntry>>>,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a session. Returns true if the session was new.
    pub fn upsert(&self, key: SessionKey, descriptor: SessionDescriptor, expiry: Duration) -> bool {
        let source = key.source;
        let mut guard = recover_write(&self.inner, "SessionTable::upsert");
        match guard.get_mut(&key) {
            Some(entry) => {
                entry.refresh(descriptor);
                false
            }
            None => {
                guard.insert(key, SessionEntry::new(descriptor, source, expiry));
                true
            }
        }
    }

    /// Remove a session (explicit deletion packet). Returns the removed
    /// entry if it was present.
    pub fn remove(&self, key: &SessionKey) -> Option<SessionEntry> {
        let mut guard = recover_write(&self.inner, "SessionTable::remove");
        guard.remove(key)
    }

    /// Clone out the current entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionEntry> {
        let guard = recover_read(&self.inner, "SessionTable::snapshot");
        guard.values().cloned().collect()
    }

    /// Look up one entry by key.
    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<SessionEntry> {
        let guard = recover_read(&self.inner, "SessionTable::get");
        guard.get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        recover_read(&self.inner, "SessionTable::len").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry whose expiry window elapsed. Returns how many
    /// were removed.
    pub fn sweep_expired(&self) -> usize {
        let expired_keys: Vec<SessionKey> = {
            let guard = recover_read(&self.inner, "SessionTable::sweep collect expired");
            guard
                .iter()
                .filter(|(_, entry)| entry.is_expired())
                .map(|(key, _)| key.clone())
                .collect()
        };

        if expired_keys.is_empty() {
            return 0;
        }

        let mut guard = recover_write(&self.inner, "SessionTable::sweep remove expired");
        let mut removed = 0;
        for key in expired_keys {
            // Re-check under the write lock: a refresh may have raced the scan.
            if guard.get(&key).is_some_and(SessionEntry::is_expired) {
                log::info!("[table] session '{}' from {} expired", key.name, key.source);
                guard.remove(&key);
                removed += 1;
            }
        }
        removed
    }
}

/// Session expiry sweeper.
///
/// Spawns a background thread (1 Hz) that removes sessions whose
/// announcements stopped arriving. Call `stop()` for a graceful
/// shutdown; dropping the sweeper joins the thread too.
pub struct ExpirySweeper {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Start the sweeper thread over a shared table.
    pub fn start(table: SessionTable) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("msap-sweeper".to_string())
            .spawn(move || {
                Self::run_loop(&table, &stop_rx);
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn run_loop(table: &SessionTable, stop_rx: &Receiver<()>) {
        loop {
            // Wait on the stop channel so shutdown wakes us immediately
            // instead of riding out a full sweep interval.
            match stop_rx.recv_timeout(SWEEP_INTERVAL) {
                Ok(()) | Err(channel::RecvTimeoutError::Disconnected) => break,
                Err(channel::RecvTimeoutError::Timeout) => {}
            }
            let removed = table.sweep_expired();
            if removed > 0 {
                log::debug!("[table] sweeper removed {} expired session(s)", removed);
            }
        }
    }

    /// Signal the thread to exit and wait for the join.
    pub fn stop(mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Colourspace;

    fn descriptor(name: &str) -> SessionDescriptor {
        SessionDescriptor::new(
            name,
            "239.192.1.1".parse().expect("valid address"),
            5004,
            640,
            480,
            25,
            Colourspace::Yuv422,
        )
    }

    fn key(name: &str) -> SessionKey {
        SessionKey {
            name: name.to_string(),
            source: "10.0.0.1".parse().expect("valid address"),
        }
    }

    #[test]
    fn test_upsert_inserts_then_refreshes() {
        let table = SessionTable::new();
        let expiry = Duration::from_secs(10);

        assert!(table.upsert(key("cam"), descriptor("cam"), expiry));
        assert_eq!(table.len(), 1);

        let mut updated = descriptor("cam");
        updated.framerate = 30;
        assert!(!table.upsert(key("cam"), updated, expiry));
        assert_eq!(table.len(), 1);

        let entry = table.get(&key("cam")).expect("entry should exist");
        assert_eq!(entry.descriptor.framerate, 30);
    }

    #[test]
    fn test_same_name_different_source_are_distinct() {
        let table = SessionTable::new();
        let expiry = Duration::from_secs(10);

        let key_b = SessionKey {
            name: "cam".to_string(),
            source: "10.0.0.2".parse().expect("valid address"),
        };
        table.upsert(key("cam"), descriptor("cam"), expiry);
        table.upsert(key_b, descriptor("cam"), expiry);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove() {
        let table = SessionTable::new();
        table.upsert(key("cam"), descriptor("cam"), Duration::from_secs(10));

        assert!(table.remove(&key("cam")).is_some());
        assert!(table.remove(&key("cam")).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let table = SessionTable::new();
        table.upsert(key("stale"), descriptor("stale"), Duration::ZERO);
        table.upsert(key("fresh"), descriptor("fresh"), Duration::from_secs(60));

        assert_eq!(table.sweep_expired(), 1);
        assert!(table.get(&key("stale")).is_none());
        assert!(table.get(&key("fresh")).is_some());
    }

    #[test]
    fn test_refresh_resets_expiry() {
        let mut entry = SessionEntry::new(
            descriptor("cam"),
            "10.0.0.1".parse().expect("valid address"),
            Duration::from_millis(50),
        );
        thread::sleep(Duration::from_millis(60));
        assert!(entry.is_expired());

        entry.refresh(descriptor("cam"));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_sweeper_start_stop() {
        let table = SessionTable::new();
        let sweeper = ExpirySweeper::start(table).expect("sweeper start should succeed");
        thread::sleep(Duration::from_millis(100));
        sweeper.stop();
    }

    #[test]
    fn test_sweeper_stops_without_waiting_full_interval() {
        let table = SessionTable::new();
        let sweeper = ExpirySweeper::start(table).expect("sweeper start should succeed");

        let started = Instant::now();
        sweeper.stop();
        // Sweep interval is 1 s; stop must not ride it out.
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_sweeper_removes_expired_session() {
        let table = SessionTable::new();
        table.upsert(key("cam"), descriptor("cam"), Duration::from_millis(100));

        let sweeper = ExpirySweeper::start(table.clone()).expect("sweeper start should succeed");

        // Sweeper runs at 1 Hz: give it one cycle plus margin.
        thread::sleep(Duration::from_millis(1400));
        assert!(table.get(&key("cam")).is_none());

        sweeper.stop();
    }

    #[test]
    fn test_sweeper_retains_active_session() {
        let table = SessionTable::new();
        table.upsert(key("cam"), descriptor("cam"), Duration::from_secs(30));

        let sweeper = ExpirySweeper::start(table.clone()).expect("sweeper start should succeed");
        thread::sleep(Duration::from_millis(1400));
        assert!(table.get(&key("cam")).is_some());

        sweeper.stop();
    }
}
