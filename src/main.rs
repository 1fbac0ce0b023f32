//! # GPS Out
//!
//! Writes `$GPRMC` sentences to a serial device from positions supplied by
//! the guidance application.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use gps_out::agio::FrameSource;
use gps_out::bridge::Bridge;
use gps_out::config::Config;
use gps_out::logging::init_logging;
use gps_out::serial::port_trait::TokioSerialDriver;
use gps_out::serial::{LinkSettings, SerialLink};
use gps_out::settings::FileSettingsStore;

/// Capacity of the channel between the UDP listener and the control loop
const FRAME_QUEUE_DEPTH: usize = 32;

/// Number of sentences between status log messages
const STATUS_LOG_INTERVAL: u64 = 300;

/// Main entry point for GPS Out
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or built-in defaults)
///    - Set up console and rolling-file logging
///    - Restore persisted serial settings and auto-connect unless the last
///      session failed to connect (a first run connects)
///    - Start the UDP binary frame listener
///
///    - Speed, heading and the raw position are not fed, so sentences
///      carry `000.0` speed and heading
///
/// 2. **Main Loop**
///    - Route received serial lines
///    - Decode binary frames
///    - Write a sentence on every output tick
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Shutdown**
///    - Stop the receive task and release the port, keeping the persisted
///      connection state for the next start
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.logging).context("initializing logging")?;

    info!("GPS Out v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = FileSettingsStore::open(&config.settings.path)
        .with_context(|| format!("opening settings {}", config.settings.path))?;
    let link = SerialLink::new(
        LinkSettings::from(&config.serial),
        &config.serial.channel,
        Arc::new(TokioSerialDriver),
        Box::new(store),
    );
    let mut bridge = Bridge::new(link);

    match bridge.link_mut().auto_connect() {
        Ok(true) => {}
        Ok(false) => info!("Serial link idle on {}", bridge.link().port_name()),
        Err(e) => warn!("Auto-connect to {} failed: {}", bridge.link().port_name(), e),
    }

    let (frame_tx, mut frame_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    let listener = if config.agio.enabled {
        let source = match FrameSource::bind(&config.agio.listen_addr).await {
            Ok(source) => source,
            Err(e) => {
                error!("Cannot listen on {}: {}", config.agio.listen_addr, e);
                bridge.link_mut().shutdown().await;
                return Err(e).with_context(|| format!("binding {}", config.agio.listen_addr));
            }
        };
        Some(source.spawn(frame_tx.clone()))
    } else {
        None
    };

    let mut ticker = interval(Duration::from_millis(config.output.sentence_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_logged: u64 = 0;

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            Some(event) = bridge.link_mut().next_event(), if bridge.link().is_open() => {
                bridge.handle_event(&event);
            }

            Some(frame) = frame_rx.recv() => {
                bridge.handle_binary(&frame);
            }

            _ = ticker.tick() => {
                if let Err(e) = bridge.send_navigation().await {
                    warn!("Sentence not sent: {}", e);
                }

                let sent = bridge.sentences_sent();
                if sent - last_logged >= STATUS_LOG_INTERVAL {
                    info!("Sent {} sentences", sent);
                    last_logged = sent;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Some(listener) = listener {
        listener.abort();
    }
    drop(frame_tx);
    bridge.link_mut().shutdown().await;

    info!("Total sentences sent: {}", bridge.sentences_sent());

    Ok(())
}
