//! # Serial Link Module
//!
//! The [`Link`] trait is the capability the protocol layer depends on; [`SerialLink`] is
//! the production implementation on top of the `serialport` crate.
//!
//! ## Lifecycle
//!
//! ```text
//!   Closed ──open()──► Open ──close()──► Closed
//!                       │
//!                       └─ poller thread: read chunk → data callback
//!                                         read error → error callback + backoff
//! ```
//!
//! All device access (poller reads, `send`, `open`, `close`) is serialized through one
//! lock. Callbacks run on the poller thread and never while that lock is held, so a data
//! callback may call `send`. A `close` from a callback detaches the poller instead of joining
//! it; each `open` starts a new poller with its own stop flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::warn;

use crate::error::LinkError;

mod serial;

pub use serial::SerialLink;

/// Observer for received bytes. A chunk is not necessarily a complete frame.
pub type DataCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;
/// Observer for link failures (open, read and write errors).
pub type ErrorCallback = Arc<dyn Fn(&LinkError) + Send + Sync>;

/// Baud rate used when a requested rate is not supported.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Rates the board firmware and common USB bridges agree on.
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9_600, 19_200, 38_400, 57_600, 115_200];

/// Byte-oriented device link with asynchronous receive notifications.
pub trait Link: Send + Sync {
    /// Open `path` at `baud_rate`. Succeeds immediately if already open.
    fn open(&self, path: &str, baud_rate: u32) -> Result<(), LinkError>;
    /// Stop the poller and release the device. Idempotent.
    fn close(&self);
    fn is_open(&self) -> bool;
    /// Write `data` synchronously. Fails with [`LinkError::NotOpen`] when closed.
    fn send(&self, data: &[u8]) -> Result<(), LinkError>;
    /// One non-blocking read of whatever is pending; empty when nothing is.
    fn read_raw(&self) -> Result<Vec<u8>, LinkError>;
    fn set_data_callback(&self, callback: DataCallback);
    fn set_error_callback(&self, callback: ErrorCallback);
}

/// Poller timing and sizing.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Sleep between poll iterations.
    pub poll_interval: Duration,
    /// Extra sleep after a genuine read error to avoid a hot error loop.
    pub error_backoff: Duration,
    /// Maximum bytes read per iteration.
    pub chunk_size: usize,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(100),
            chunk_size: 256,
        }
    }
}

/// Map `requested` onto the supported set, falling back to [`DEFAULT_BAUD_RATE`].
pub fn normalize_baud_rate(requested: u32) -> u32 {
    if SUPPORTED_BAUD_RATES.contains(&requested) {
        requested
    } else {
        warn!(
            "Unsupported baud rate {}, defaulting to {}",
            requested, DEFAULT_BAUD_RATE
        );
        DEFAULT_BAUD_RATE
    }
}

/// Single-slot observer registrations shared between a link and its poller.
#[derive(Default)]
pub(crate) struct CallbackSlots {
    data: Mutex<Option<DataCallback>>,
    error: Mutex<Option<ErrorCallback>>,
}

impl CallbackSlots {
    pub(crate) fn set_data(&self, callback: DataCallback) {
        *lock(&self.data) = Some(callback);
    }

    pub(crate) fn set_error(&self, callback: ErrorCallback) {
        *lock(&self.error) = Some(callback);
    }

    pub(crate) fn notify_data(&self, data: &[u8]) {
        // Clone out of the slot so re-registration from inside a callback cannot deadlock.
        let cb = lock(&self.data).clone();
        if let Some(cb) = cb {
            cb(data);
        }
    }

    pub(crate) fn notify_error(&self, error: &LinkError) {
        let cb = lock(&self.error).clone();
        if let Some(cb) = cb {
            cb(error);
        }
    }
}

/// Lock a mutex, recovering the guard if a panicking observer poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
