//! `serialport`-backed [`Link`] with a dedicated poller thread.

use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use serialport::SerialPort;

use super::{lock, normalize_baud_rate, CallbackSlots, DataCallback, ErrorCallback, Link, PollerSettings};
use crate::error::LinkError;
use crate::logutil::escape_bytes;

/// Write timeout; reads use a zero timeout so they never block the link lock.
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

type SharedPort = Arc<Mutex<Option<Box<dyn SerialPort>>>>;

/// A running poller and the stop flag only it observes. Each `open` creates a fresh pair.
struct PollerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// A serial device link. Cheap to share behind an `Arc`; every method takes `&self`.
pub struct SerialLink {
    port: SharedPort,
    open: Arc<AtomicBool>,
    worker: Mutex<Option<PollerHandle>>,
    callbacks: Arc<CallbackSlots>,
    settings: PollerSettings,
}

impl SerialLink {
    pub fn new(settings: PollerSettings) -> Self {
        Self {
            port: Arc::new(Mutex::new(None)),
            open: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            callbacks: Arc::new(CallbackSlots::default()),
            settings,
        }
    }

    /// Open the device while the link lock is held. No notifications from here.
    fn open_locked(
        &self,
        slot: &mut Option<Box<dyn SerialPort>>,
        path: &str,
        baud_rate: u32,
    ) -> Result<(), LinkError> {
        match std::fs::metadata(path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(LinkError::PermissionDenied {
                    path: path.to_string(),
                })
            }
            Err(_) => {
                return Err(LinkError::NotFound {
                    path: path.to_string(),
                })
            }
        }

        let baud_rate = normalize_baud_rate(baud_rate);
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|e| match e.kind {
                serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => {
                    LinkError::PermissionDenied {
                        path: path.to_string(),
                    }
                }
                _ => LinkError::Open {
                    path: path.to_string(),
                    reason: e.description,
                },
            })?;

        // Drop whatever the board printed before we were listening.
        if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
            debug!("Could not purge input on {}: {}", path, e);
        }

        *slot = Some(port);
        self.open.store(true, Ordering::Release);

        let stop = Arc::new(AtomicBool::new(false));
        let poller = Poller {
            port: self.port.clone(),
            stop: stop.clone(),
            callbacks: self.callbacks.clone(),
            settings: self.settings.clone(),
        };
        let handle = thread::Builder::new()
            .name("boardlink-poller".to_string())
            .spawn(move || poller.run());
        match handle {
            Ok(handle) => {
                *lock(&self.worker) = Some(PollerHandle {
                    stop,
                    thread: handle,
                });
                info!("Serial port {} open at {} baud", path, baud_rate);
                Ok(())
            }
            Err(e) => {
                *slot = None;
                self.open.store(false, Ordering::Release);
                Err(LinkError::Spawn(e))
            }
        }
    }
}

impl Default for SerialLink {
    fn default() -> Self {
        Self::new(PollerSettings::default())
    }
}

impl Link for SerialLink {
    fn open(&self, path: &str, baud_rate: u32) -> Result<(), LinkError> {
        let result = {
            let mut slot = lock(&self.port);
            if self.open.load(Ordering::Acquire) {
                return Ok(());
            }
            self.open_locked(&mut slot, path, baud_rate)
        };
        if let Err(ref e) = result {
            debug!("open {} failed: {}", path, e);
            self.callbacks.notify_error(e);
        }
        result
    }

    fn close(&self) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        let handle = lock(&self.worker).take();
        if let Some(PollerHandle { stop, thread: handle }) = handle {
            stop.store(true, Ordering::Release);
            if handle.thread().id() == thread::current().id() {
                // close() from inside a callback: joining ourselves would deadlock.
                // The detached poller exits on its next flag check.
                warn!("close() called from the serial poller thread; detaching poller");
            } else if handle.join().is_err() {
                error!("Serial poller thread panicked");
            }
        }

        let mut slot = lock(&self.port);
        *slot = None;
        self.open.store(false, Ordering::Release);
        info!("Serial port closed");
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        let result = {
            let mut slot = lock(&self.port);
            let port = match slot.as_mut() {
                Some(port) if self.open.load(Ordering::Acquire) => port,
                _ => return Err(LinkError::NotOpen),
            };
            if let Err(e) = port.set_timeout(WRITE_TIMEOUT) {
                debug!("Could not set write timeout: {}", e);
            }
            let written = port.write(data);
            if let Err(e) = port.set_timeout(Duration::ZERO) {
                // Reads now block up to the write timeout while holding the link lock.
                warn!("Could not restore non-blocking reads: {}", e);
            }
            match written {
                Ok(n) if n == data.len() => Ok(()),
                Ok(n) => Err(LinkError::ShortWrite {
                    written: n,
                    expected: data.len(),
                }),
                Err(e) => Err(LinkError::Write(e)),
            }
        };
        match result {
            Ok(()) => trace!("TX {} bytes: {}", data.len(), escape_bytes(data)),
            Err(ref e) => self.callbacks.notify_error(e),
        }
        result
    }

    fn read_raw(&self) -> Result<Vec<u8>, LinkError> {
        let mut slot = lock(&self.port);
        let port = match slot.as_mut() {
            Some(port) if self.open.load(Ordering::Acquire) => port,
            _ => return Err(LinkError::NotOpen),
        };
        let mut buffer = vec![0u8; self.settings.chunk_size];
        match port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(ref e) if is_transient(e) => Ok(Vec::new()),
            Err(e) => Err(LinkError::Read(e)),
        }
    }

    fn set_data_callback(&self, callback: DataCallback) {
        self.callbacks.set_data(callback);
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        self.callbacks.set_error(callback);
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// "Nothing to read right now" conditions; not reported as errors.
fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// State moved into the poller thread.
struct Poller {
    port: SharedPort,
    stop: Arc<AtomicBool>,
    callbacks: Arc<CallbackSlots>,
    settings: PollerSettings,
}

impl Poller {
    fn run(self) {
        debug!("Serial poller started");
        let mut buffer = vec![0u8; self.settings.chunk_size.max(1)];

        while !self.stop.load(Ordering::Acquire) {
            let read_result = {
                let mut slot = lock(&self.port);
                match slot.as_mut() {
                    Some(port) => port.read(&mut buffer),
                    None => break,
                }
            };

            // Callbacks run with the link lock released so they may call send().
            match read_result {
                Ok(n) if n > 0 => {
                    let chunk = &buffer[..n];
                    trace!("RX {} bytes: {}", n, escape_bytes(chunk));
                    self.callbacks.notify_data(chunk);
                }
                Ok(_) => {
                    trace!("Zero-length read (remote end idle or closed)");
                }
                Err(ref e) if is_transient(e) => {}
                Err(e) => {
                    warn!("Serial read error (continuing): {}", e);
                    self.callbacks.notify_error(&LinkError::Read(e));
                    thread::sleep(self.settings.error_backoff);
                }
            }

            thread::sleep(self.settings.poll_interval);
        }
        debug!("Serial poller stopped");
    }
}
