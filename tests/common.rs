//! Test utilities & fixtures.
//! `MockLink` stands in for a serial device so controller behaviour can be driven
//! byte-by-byte without hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardlink::discovery::PortDiscovery;
use boardlink::error::LinkError;
use boardlink::link::{DataCallback, ErrorCallback, Link};
use boardlink::protocol::{ControllerSettings, HardwareButton, ProtocolController};

/// In-memory [`Link`] that records every call.
#[derive(Default)]
pub struct MockLink {
    open: AtomicBool,
    /// When set, `open` fails with `NotFound` and the link stays closed.
    fail_open: AtomicBool,
    pub opens: Mutex<Vec<(String, u32)>>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub closes: Mutex<usize>,
    data_cb: Mutex<Option<DataCallback>>,
    error_cb: Mutex<Option<ErrorCallback>>,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A link that reports open from the start, like a board that is already attached.
    pub fn connected() -> Arc<Self> {
        let link = Self::new();
        link.open.store(true, Ordering::SeqCst);
        link
    }

    pub fn unavailable() -> Arc<Self> {
        let link = Self::new();
        link.fail_open.store(true, Ordering::SeqCst);
        link
    }

    pub fn set_available(&self, available: bool) {
        self.fail_open.store(!available, Ordering::SeqCst);
    }

    /// Simulate the device dropping off the bus.
    pub fn unplug(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Feed bytes to the registered data observer, as the poller would.
    pub fn deliver(&self, data: &[u8]) {
        let cb = self.data_cb.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(data);
        }
    }

    pub fn raise(&self, error: &LinkError) {
        let cb = self.error_cb.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(error);
        }
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    pub fn open_calls(&self) -> Vec<(String, u32)> {
        self.opens.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

impl Link for MockLink {
    fn open(&self, path: &str, baud_rate: u32) -> Result<(), LinkError> {
        self.opens
            .lock()
            .unwrap()
            .push((path.to_string(), baud_rate));
        if self.open.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.fail_open.load(Ordering::SeqCst) {
            let err = LinkError::NotFound {
                path: path.to_string(),
            };
            self.raise(&err);
            return Err(err);
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        *self.closes.lock().unwrap() += 1;
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, data: &[u8]) -> Result<(), LinkError> {
        if !self.is_open() {
            return Err(LinkError::NotOpen);
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn read_raw(&self) -> Result<Vec<u8>, LinkError> {
        Ok(Vec::new())
    }

    fn set_data_callback(&self, callback: DataCallback) {
        *self.data_cb.lock().unwrap() = Some(callback);
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        *self.error_cb.lock().unwrap() = Some(callback);
    }
}

/// Discovery that never finds anything, so only the fallback port is tried.
#[allow(dead_code)]
pub fn no_discovery() -> PortDiscovery {
    PortDiscovery::disabled()
}

#[allow(dead_code)]
pub fn settings_with_interval(interval: Duration) -> ControllerSettings {
    ControllerSettings {
        reconnect_interval: interval,
        ..ControllerSettings::default()
    }
}

/// Events seen by the controller's observers, in order.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Volume(u8),
    Button(HardwareButton),
}

/// Controller over `link` with both observers recording into the returned log.
#[allow(dead_code)]
pub fn recording_controller(
    link: Arc<MockLink>,
    settings: ControllerSettings,
) -> (ProtocolController, Arc<Mutex<Vec<Seen>>>) {
    let controller = ProtocolController::new(link, settings, no_discovery());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    controller.set_volume_callback(move |v| s.lock().unwrap().push(Seen::Volume(v)));
    let s = seen.clone();
    controller.set_button_callback(move |b| s.lock().unwrap().push(Seen::Button(b)));
    (controller, seen)
}
