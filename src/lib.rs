//! # Boardlink - serial control link for a media player front panel
//!
//! Boardlink connects a host media player to a small microcontroller board over a
//! UART/USB serial link. The board reports volume-knob and button events as short
//! ASCII frames; the host answers with now-playing metadata and playback state.
//!
//! ## Features
//!
//! - **Serial Link**: Owns the OS device handle and runs a background poller thread that
//!   turns non-blocking reads into data/error notifications.
//! - **Frame Extraction**: Reassembles `!...!` frames split across arbitrary chunk
//!   boundaries, tolerates leading garbage and caps the receive buffer at 1024 bytes.
//! - **Typed Events**: Validated `ADC`/`BTN` frames become volume levels and
//!   [`protocol::HardwareButton`] presses; everything else is dropped.
//! - **Reconnect Throttling**: A cooperative `refresh_connection` that never fires more
//!   often than the configured interval.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use boardlink::config::Config;
//! use boardlink::link::SerialLink;
//! use boardlink::protocol::ProtocolController;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let link = Arc::new(SerialLink::new(config.poller_settings()));
//!     let controller =
//!         ProtocolController::new(link, config.controller_settings(), config.discovery());
//!
//!     controller.set_volume_callback(|volume| println!("volume -> {volume}"));
//!     if controller.initialize() {
//!         controller.send_current_song_info("Intro", "The xx");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`link`] - `Link` capability trait and the `serialport`-backed [`link::SerialLink`]
//! - [`protocol`] - frame extraction, validation, observers and outbound lines
//! - [`discovery`] - candidate device enumeration
//! - [`config`] - TOML configuration
//! - [`metrics`] - per-controller counters
//! - [`error`] - link error taxonomy
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ ProtocolController  │ ← framing, validation, observers, reconnect
//! └─────────────────────┘
//!          │ Link trait
//! ┌─────────────────────┐
//! │    SerialLink       │ ← device handle + poller thread
//! └─────────────────────┘
//!          │
//!      /dev/tty*
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod link;
pub mod logutil;
pub mod metrics;
pub mod protocol;
