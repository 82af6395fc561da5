//! # Board Protocol Module
//!
//! [`ProtocolController`] sits between a [`Link`] and the application:
//!
//! - consumes the link's data notifications, reassembles `!...!` frames with a
//!   [`MarkerFramer`] and turns valid ones into volume / button events
//! - owns connection management: explicit connect, auto-discovery, and a throttled
//!   cooperative reconnect
//! - formats and sends the outbound `SONG|...` and `STATE|...` lines
//!
//! ## Threading
//!
//! The volume and button observers are invoked from the link's poller thread, never from
//! the thread that registered them. The receive buffer has its own lock, independent of
//! the link's device lock, and is released before observers run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use boardlink::discovery::PortDiscovery;
//! use boardlink::link::SerialLink;
//! use boardlink::protocol::{ControllerSettings, HardwareButton, ProtocolController};
//!
//! let link = Arc::new(SerialLink::default());
//! let controller =
//!     ProtocolController::new(link, ControllerSettings::default(), PortDiscovery::default());
//! controller.set_button_callback(|button| {
//!     if button == HardwareButton::Quit {
//!         std::process::exit(0);
//!     }
//! });
//! controller.initialize();
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::discovery::PortDiscovery;
use crate::error::LinkError;
use crate::link::{lock, Link, DEFAULT_BAUD_RATE};
use crate::logutil::{escape_bytes, escape_log};
use crate::metrics::{ProtocolStats, StatsSnapshot};

pub mod framer;
pub mod message;

pub use framer::{MarkerFramer, FRAME_MARKER, RECEIVE_BUFFER_CAPACITY};
pub use message::{parse_frame, FrameError, HardwareButton, InboundMessage, OutboundMessage};

/// Device used when auto-discovery finds nothing.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
/// Minimum gap between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(2000);

pub type ButtonCallback = Arc<dyn Fn(HardwareButton) + Send + Sync>;
pub type VolumeCallback = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Fallback device for `initialize` / `refresh_connection`.
    pub default_port: String,
    /// Baud rate used for every connection attempt made by the controller itself.
    pub baud_rate: u32,
    pub reconnect_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }
}

/// Minimum-interval gate for reconnect attempts.
#[derive(Debug)]
pub struct ReconnectThrottle {
    last_attempt: Instant,
    interval: Duration,
}

impl ReconnectThrottle {
    /// The first attempt is allowed one `interval` after creation.
    pub fn new(interval: Duration) -> Self {
        Self {
            last_attempt: Instant::now(),
            interval,
        }
    }

    /// Record an attempt at `now` if the interval has elapsed; false otherwise.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_attempt) < self.interval {
            return false;
        }
        self.last_attempt = now;
        true
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Receive side shared with the link's data callback.
#[derive(Default)]
struct Receiver {
    framer: Mutex<MarkerFramer>,
    button: Mutex<Option<ButtonCallback>>,
    volume: Mutex<Option<VolumeCallback>>,
    stats: ProtocolStats,
}

impl Receiver {
    fn on_data(&self, data: &[u8]) {
        debug!("Received from board: {}", escape_bytes(data));

        let drained = lock(&self.framer).push_and_drain(data);
        if drained.reset {
            warn!("Receive buffer overflow, clearing");
            self.stats.inc_buffer_resets();
        }
        for frame in drained.frames {
            self.dispatch(&frame);
        }
    }

    fn dispatch(&self, content: &[u8]) {
        match parse_frame(content) {
            Ok(InboundMessage::Volume(volume)) => {
                info!("Board volume: {}", volume);
                self.stats.inc_frames_dispatched();
                let cb = lock(&self.volume).clone();
                if let Some(cb) = cb {
                    cb(volume);
                }
            }
            Ok(InboundMessage::Button(button)) => {
                info!("Board button pressed: {:?} ({})", button, button.id());
                self.stats.inc_frames_dispatched();
                let cb = lock(&self.button).clone();
                if let Some(cb) = cb {
                    cb(button);
                }
            }
            Err(e) => {
                debug!("Dropping frame '{}': {}", escape_bytes(content), e);
                self.stats.inc_frames_dropped();
            }
        }
    }
}

pub struct ProtocolController {
    link: Arc<dyn Link>,
    settings: ControllerSettings,
    discovery: PortDiscovery,
    receiver: Arc<Receiver>,
    throttle: Mutex<ReconnectThrottle>,
}

impl ProtocolController {
    /// Wire the controller to `link`, replacing the link's data and error observers.
    pub fn new(link: Arc<dyn Link>, settings: ControllerSettings, discovery: PortDiscovery) -> Self {
        let receiver = Arc::new(Receiver::default());

        let rx = receiver.clone();
        link.set_data_callback(Arc::new(move |data: &[u8]| rx.on_data(data)));

        let rx = receiver.clone();
        link.set_error_callback(Arc::new(move |e: &LinkError| {
            error!("Serial error: {}", e);
            rx.stats.inc_link_errors();
        }));

        let throttle = Mutex::new(ReconnectThrottle::new(settings.reconnect_interval));
        info!("Protocol controller initialized");
        Self {
            link,
            settings,
            discovery,
            receiver,
            throttle,
        }
    }

    /// Auto-connect, then fall back to the default port.
    pub fn initialize(&self) -> bool {
        if self.auto_connect() {
            return true;
        }
        self.connect(&self.settings.default_port, self.settings.baud_rate)
    }

    pub fn connect(&self, path: &str, baud_rate: u32) -> bool {
        info!("Connecting to board on {} at {} baud", path, baud_rate);
        match self.link.open(path, baud_rate) {
            Ok(()) => {
                info!("Board connected on {}", path);
                true
            }
            Err(e) => {
                debug!("Failed to connect to board on {}: {}", path, e);
                false
            }
        }
    }

    /// Try every discovered port at the configured baud rate until one opens.
    pub fn auto_connect(&self) -> bool {
        if self.is_connected() {
            return true;
        }
        info!("Auto-connecting to board...");

        for port in self.discovery.scan() {
            info!("Trying port: {}", port);
            if self.connect(&port, self.settings.baud_rate) {
                return true;
            }
        }

        warn!("Auto-connect failed, no compatible device found");
        false
    }

    /// Close the link if open and drop any partially received frame.
    pub fn disconnect(&self) {
        if self.link.is_open() {
            self.link.close();
            info!("Board disconnected");
        }
        lock(&self.receiver.framer).clear();
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    /// Cooperative reconnect; call periodically. At most one attempt per interval.
    pub fn refresh_connection(&self) {
        if self.is_connected() {
            return;
        }
        if !lock(&self.throttle).try_acquire(Instant::now()) {
            return;
        }
        self.receiver.stats.inc_reconnect_attempts();

        info!("Board not connected, attempting reconnect...");
        if self.auto_connect() {
            return;
        }
        if !self.settings.default_port.is_empty() {
            // Failures surface through the link's error observer.
            let _ = self.connect(&self.settings.default_port, self.settings.baud_rate);
        }
    }

    pub fn send_current_song_info(&self, title: &str, artist: &str) {
        if !self.is_connected() {
            return;
        }
        self.send_message(&OutboundMessage::Song {
            title: title.to_string(),
            artist: artist.to_string(),
        });
    }

    pub fn send_playback_state(&self, is_playing: bool) {
        if !self.is_connected() {
            return;
        }
        self.send_message(&OutboundMessage::State {
            playing: is_playing,
        });
    }

    fn send_message(&self, message: &OutboundMessage) {
        let line = message.encode();
        match self.link.send(line.as_bytes()) {
            Ok(()) => debug!("Sent to board: {}", escape_log(&line)),
            Err(e) => error!("Failed to send '{}' to board: {}", message, e),
        }
    }

    pub fn set_button_callback<F>(&self, callback: F)
    where
        F: Fn(HardwareButton) + Send + Sync + 'static,
    {
        *lock(&self.receiver.button) = Some(Arc::new(callback));
    }

    pub fn set_volume_callback<F>(&self, callback: F)
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        *lock(&self.receiver.volume) = Some(Arc::new(callback));
    }

    /// Bytes currently held as a partial frame.
    pub fn pending_bytes(&self) -> usize {
        lock(&self.receiver.framer).len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.receiver.stats.snapshot()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }
}

impl Drop for ProtocolController {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_blocks_until_interval_elapses() {
        let mut throttle = ReconnectThrottle::new(Duration::from_secs(2));
        let start = throttle.last_attempt;
        assert!(!throttle.try_acquire(start + Duration::from_millis(1999)));
        assert!(throttle.try_acquire(start + Duration::from_secs(2)));
        // Attempt recorded; the window restarts.
        assert!(!throttle.try_acquire(start + Duration::from_secs(3)));
        assert!(throttle.try_acquire(start + Duration::from_secs(4)));
    }

    #[test]
    fn throttle_tolerates_earlier_instant() {
        let mut throttle = ReconnectThrottle::new(Duration::from_millis(10));
        let earlier = throttle.last_attempt - Duration::from_millis(1);
        assert!(!throttle.try_acquire(earlier));
    }

    #[test]
    fn receiver_counts_dispatched_and_dropped() {
        let rx = Receiver::default();
        rx.on_data(b"!ADC:7!BAD!BTN:9!");
        let snap = rx.stats.snapshot();
        assert_eq!(snap.frames_dispatched, 1);
        assert_eq!(snap.frames_dropped, 2);
    }
}
