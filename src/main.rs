//! Binary entrypoint for the Boardlink CLI.
//!
//! Commands:
//! - `run [--port <path>] [-b <baud>]` - connect to the board and react to knob/button events
//! - `ports` - list candidate serial devices found by auto-discovery
//! - `init` - write a starter `config.toml`
//! - `announce --title <t> --artist <a> [--paused]` - push now-playing info once and exit
//!
//! See the library crate docs for module-level details: `boardlink::`.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::mpsc;

use boardlink::config::Config;
use boardlink::link::SerialLink;
use boardlink::protocol::{HardwareButton, ProtocolController};

#[derive(Parser)]
#[command(name = "boardlink")]
#[command(about = "Serial link between a media player and its knob/button control board")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the board and handle its events until Quit or Ctrl-C
    Run {
        /// Serial device (skips auto-discovery)
        #[arg(short, long)]
        port: Option<String>,
        /// Baud rate (defaults to the configured rate)
        #[arg(short = 'b', long)]
        baud: Option<u32>,
    },
    /// List candidate serial devices
    Ports,
    /// Write a default configuration file
    Init,
    /// Send the current song and playback state once
    Announce {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        /// Report the player as paused instead of playing
        #[arg(long)]
        paused: bool,
        /// Serial device (skips auto-discovery)
        #[arg(short, long)]
        port: Option<String>,
    },
}

/// Board events forwarded from the poller thread to the async loop.
#[derive(Debug)]
enum BoardEvent {
    Volume(u8),
    Button(HardwareButton),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = match Config::load(&cli.config).await {
        Ok(config) => Some(config),
        Err(e) => {
            // Logging is not up yet; a missing file is normal for first runs.
            eprintln!("{e}; using built-in defaults");
            None
        }
    };
    init_logging(&config, cli.verbose);
    let config = config.unwrap_or_default();

    match cli.command {
        Commands::Run { port, baud } => run(config, port, baud).await?,
        Commands::Ports => {
            let ports = config.discovery().scan();
            if ports.is_empty() {
                println!("No candidate serial devices found");
            }
            for port in ports {
                println!("{port}");
            }
        }
        Commands::Announce {
            title,
            artist,
            paused,
            port,
        } => {
            let controller = build_controller(&config);
            let connected = match port {
                Some(ref p) => controller.connect(p, config.device.baud_rate),
                None => controller.initialize(),
            };
            if !connected {
                anyhow::bail!("No board connection available");
            }
            controller.send_current_song_info(&title, &artist);
            controller.send_playback_state(!paused);
            // Let the UART drain before the port is closed.
            tokio::time::sleep(Duration::from_millis(50)).await;
            controller.disconnect();
        }
        Commands::Init => unreachable!("handled above"),
    }

    Ok(())
}

fn build_controller(config: &Config) -> ProtocolController {
    let link = Arc::new(SerialLink::new(config.poller_settings()));
    ProtocolController::new(link, config.controller_settings(), config.discovery())
}

async fn run(config: Config, port: Option<String>, baud: Option<u32>) -> Result<()> {
    info!("Starting Boardlink v{}", env!("CARGO_PKG_VERSION"));
    let controller = build_controller(&config);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<BoardEvent>();
    let tx = event_tx.clone();
    controller.set_volume_callback(move |volume| {
        let _ = tx.send(BoardEvent::Volume(volume));
    });
    let tx = event_tx;
    controller.set_button_callback(move |button| {
        let _ = tx.send(BoardEvent::Button(button));
    });

    let baud = baud.unwrap_or(config.device.baud_rate);
    let connected = match port {
        Some(ref p) => controller.connect(p, baud),
        None => controller.initialize(),
    };
    if !connected {
        warn!("Board not available yet; will keep retrying in the background");
    }

    let mut playing = false;
    let mut track: u32 = 1;
    let mut was_connected = false;
    let mut tick = tokio::time::interval(Duration::from_millis(500));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                controller.refresh_connection();
                let now_connected = controller.is_connected();
                if now_connected && !was_connected {
                    // Fresh connection: bring the board's display up to date.
                    controller.send_current_song_info(&format!("Track {track}"), "Boardlink");
                    controller.send_playback_state(playing);
                }
                was_connected = now_connected;
            }
            event = event_rx.recv() => {
                match event {
                    Some(BoardEvent::Volume(volume)) => info!("Volume set to {}%", volume),
                    Some(BoardEvent::Button(HardwareButton::TogglePlayPause)) => {
                        playing = !playing;
                        controller.send_playback_state(playing);
                    }
                    Some(BoardEvent::Button(HardwareButton::Next)) => {
                        track = track.saturating_add(1);
                        controller.send_current_song_info(&format!("Track {track}"), "Boardlink");
                    }
                    Some(BoardEvent::Button(HardwareButton::Previous)) => {
                        track = track.saturating_sub(1).max(1);
                        controller.send_current_song_info(&format!("Track {track}"), "Boardlink");
                    }
                    Some(BoardEvent::Button(HardwareButton::Quit)) => {
                        info!("Quit requested from board");
                        break;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    info!("Link statistics: {}", controller.stats());
    controller.disconnect();
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground on a terminal: mirror the file to the console as well
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
