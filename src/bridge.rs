//! # Bridge
//!
//! Control-loop state tying the serial link to the frame decoders and the
//! outbound sentence builder. Everything here runs on the owning task, so
//! the freshness-gated values are plain fields.
//!
//! Speed, heading and the raw position have no source inside this crate.
//! They are only set through [`Bridge::set_speed_kmh`],
//! [`Bridge::set_heading`] and [`Bridge::set_raw_position`]; a host that
//! never calls them sends `000.0` speed and heading, and gets no raw
//! position fallback once corrected frames go stale.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::error::{FormatError, Result};
use crate::freshness::Freshness;
use crate::nmea::rmc::{build_rmc_at, RmcInputs};
use crate::pgn::decoder::PositionDecoder;
use crate::pgn::protocol::{PositionFrame, PGN_CORRECTED_POSITION};
use crate::pgn::router::{CsvRouter, PgnHandler, RouteOutcome};
use crate::serial::{LinkEvent, SerialLink};

/// Byte holding the PGN in a binary frame
const PGN_INDEX: usize = 3;

/// Owns the link and every decoded input to the outbound sentence
#[derive(Debug)]
pub struct Bridge {
    link: SerialLink,
    router: CsvRouter,
    corrected: PositionDecoder,
    raw: Freshness<PositionFrame>,
    speed_kmh: f64,
    heading: f64,
    sentences_sent: u64,
}

impl Bridge {
    pub fn new(link: SerialLink) -> Self {
        Self {
            link,
            router: CsvRouter::new(),
            corrected: PositionDecoder::new(),
            raw: Freshness::default(),
            speed_kmh: 0.0,
            heading: 0.0,
            sentences_sent: 0,
        }
    }

    pub fn link(&self) -> &SerialLink {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut SerialLink {
        &mut self.link
    }

    /// Register a consumer for CSV frames carrying `pgn`
    pub fn register<H>(&mut self, pgn: u16, handler: H)
    where
        H: PgnHandler + 'static,
    {
        self.router.register(pgn, handler);
    }

    pub fn router_mut(&mut self) -> &mut CsvRouter {
        &mut self.router
    }

    /// Apply one event from the serial receive task
    pub fn handle_event(&mut self, event: &LinkEvent) {
        match event {
            LinkEvent::Line(line) => {
                self.handle_line(line);
            }
            LinkEvent::ReadTimeout(_) => {}
            LinkEvent::Disconnected(reason) => {
                debug!("Link down: {}", reason);
            }
        }
    }

    /// Route one received line; a live report latches the activity flag
    pub fn handle_line(&mut self, line: &str) -> RouteOutcome {
        let outcome = self.router.route(line);
        match &outcome {
            RouteOutcome::NotCsv => trace!("Ignoring non-CSV line ({} bytes)", line.len()),
            RouteOutcome::Rejected(e) => debug!("Dropped CSV frame: {}", e),
            RouteOutcome::Handled { live: true, .. } => self.link.mark_active(),
            RouteOutcome::Unhandled(_) | RouteOutcome::Handled { .. } => {}
        }
        outcome
    }

    /// Decode one binary frame; returns whether any state changed
    pub fn handle_binary(&mut self, frame: &[u8]) -> bool {
        match frame.get(PGN_INDEX) {
            Some(&PGN_CORRECTED_POSITION) => self.corrected.ingest(frame),
            Some(pgn) => {
                trace!("Ignoring binary PGN {}", pgn);
                false
            }
            None => {
                debug!("Dropped truncated binary frame ({} bytes)", frame.len());
                false
            }
        }
    }

    /// Record an uncorrected position fix
    pub fn set_raw_position(&mut self, longitude: f64, latitude: f64) {
        self.raw.update(PositionFrame::new(longitude, latitude));
    }

    /// Ground speed in km/h
    pub fn set_speed_kmh(&mut self, speed_kmh: f64) {
        self.speed_kmh = speed_kmh;
    }

    /// Heading in degrees true
    pub fn set_heading(&mut self, heading: f64) {
        self.heading = heading;
    }

    pub fn corrected(&self) -> &PositionDecoder {
        &self.corrected
    }

    pub fn raw(&self) -> &Freshness<PositionFrame> {
        &self.raw
    }

    pub fn sentences_sent(&self) -> u64 {
        self.sentences_sent
    }

    /// Sentence for the given time without sending it
    pub fn sentence_at(
        &self,
        utc: DateTime<Utc>,
        now: Instant,
    ) -> std::result::Result<String, FormatError> {
        let inputs = RmcInputs {
            corrected: self.corrected.position(),
            raw: &self.raw,
            speed_kmh: self.speed_kmh,
            heading: self.heading,
        };
        build_rmc_at(&inputs, utc, now)
    }

    /// Build the current sentence and write it to the link
    ///
    /// Returns whether a sentence was written; nothing is written while the
    /// link is closed.
    ///
    /// # Errors
    ///
    /// Returns a format error for invalid inputs and a transport error if
    /// the write fails. Neither closes the link.
    pub async fn send_navigation(&mut self) -> Result<bool> {
        let sentence = self.sentence_at(Utc::now(), Instant::now())?;
        let written = self.link.write_line(&sentence).await?;
        if written {
            self.sentences_sent += 1;
            trace!("Sent {}", sentence);
        }
        Ok(written)
    }

    /// Forward raw bytes to the device once it has reported itself live
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<bool> {
        match self.link.write_bytes(bytes).await {
            Ok(written) => Ok(written),
            Err(e) => {
                warn!("Raw write to {} failed: {}", self.link.port_name(), e);
                Err(e.into())
            }
        }
    }
}
