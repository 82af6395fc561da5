//! Minimal link counters, one set per controller.
//! Relaxed atomics: the values are diagnostics, not synchronization.
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ProtocolStats {
    frames_dispatched: AtomicU64,
    frames_dropped: AtomicU64,
    buffer_resets: AtomicU64,
    reconnect_attempts: AtomicU64,
    link_errors: AtomicU64,
}

/// Point-in-time copy of [`ProtocolStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_dispatched: u64,
    pub frames_dropped: u64,
    pub buffer_resets: u64,
    pub reconnect_attempts: u64,
    pub link_errors: u64,
}

impl ProtocolStats {
    pub fn inc_frames_dispatched(&self) {
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_frames_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_buffer_resets(&self) {
        self.buffer_resets.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_link_errors(&self) {
        self.link_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            buffer_resets: self.buffer_resets.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frames={} dropped={} resets={} reconnects={} link_errors={}",
            self.frames_dispatched,
            self.frames_dropped,
            self.buffer_resets,
            self.reconnect_attempts,
            self.link_errors
        )
    }
}
