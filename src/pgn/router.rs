//! # Frame Classifier & Router
//!
//! Classifies received text lines and dispatches ASCII-CSV frames to the
//! handler registered for their PGN.
//!
//! An ASCII-CSV frame is any line containing both a comma and a carriage
//! return. The line is cut at the carriage return and split on commas; the
//! first two fields are the PGN's low and high byte in decimal:
//!
//! ```text
//! 100,0,12,34<CR>   -> PGN 100
//! 0,1,5<CR>         -> PGN 256
//! ```
//!
//! The router never interprets payload fields. Handlers are registered by
//! whichever module owns a PGN's semantics, and PGNs nobody registered are
//! ignored without error.
//!
//! ## Usage
//!
//! ```
//! use gps_out::pgn::router::{CsvRouter, RouteOutcome};
//!
//! let mut router = CsvRouter::new();
//! router.register(230, |fields: &[&str]| fields.len() > 2);
//!
//! assert_eq!(router.route("230,0,1\r"), RouteOutcome::Handled { pgn: 230, live: true });
//! assert_eq!(router.route("231,0,1\r"), RouteOutcome::Unhandled(231));
//! ```

use std::collections::HashMap;

use tracing::trace;

use super::protocol::pgn_from_bytes;
use crate::error::FrameError;

/// Consumer of the split fields of one ASCII frame
pub trait PgnHandler: Send {
    /// Handle the full field list (PGN bytes included)
    ///
    /// Returns whether the frame shows the remote device is live.
    fn handle(&mut self, fields: &[&str]) -> bool;
}

impl<F> PgnHandler for F
where
    F: FnMut(&[&str]) -> bool + Send,
{
    fn handle(&mut self, fields: &[&str]) -> bool {
        self(fields)
    }
}

/// Shape of a received line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameShape<'a> {
    /// Comma-separated frame, truncated at its carriage return
    Csv(&'a str),
    /// Anything else; not routed on the line path
    Other,
}

/// What happened to a routed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Line was not an ASCII-CSV frame
    NotCsv,
    /// Frame was abandoned before dispatch
    Rejected(FrameError),
    /// No handler registered for this PGN
    Unhandled(u16),
    /// Handler ran
    Handled { pgn: u16, live: bool },
}

impl RouteOutcome {
    /// Whether a handler reported a live device
    pub fn is_live(&self) -> bool {
        matches!(self, RouteOutcome::Handled { live: true, .. })
    }
}

/// Decide how a received line should be handled
pub fn classify(line: &str) -> FrameShape<'_> {
    match line.find('\r') {
        Some(cr) if line.contains(',') => FrameShape::Csv(&line[..cr]),
        _ => FrameShape::Other,
    }
}

/// Extract the PGN from the first two fields of a CSV frame
///
/// # Errors
///
/// Returns error if fewer than two fields are present or either field is
/// not an unsigned byte.
pub fn parse_pgn(fields: &[&str]) -> Result<u16, FrameError> {
    match fields {
        [low, high, ..] => {
            let low = parse_byte(low)?;
            let high = parse_byte(high)?;
            Ok(pgn_from_bytes(low, high))
        }
        _ => Err(FrameError::FieldParse(format!(
            "expected at least 2 fields, got {}",
            fields.len()
        ))),
    }
}

fn parse_byte(field: &str) -> Result<u8, FrameError> {
    field
        .trim()
        .parse::<u8>()
        .map_err(|e| FrameError::FieldParse(format!("'{}': {}", field, e)))
}

/// Registration table mapping PGNs to their handlers
#[derive(Default)]
pub struct CsvRouter {
    handlers: HashMap<u16, Box<dyn PgnHandler>>,
}

impl std::fmt::Debug for CsvRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pgns: Vec<_> = self.handlers.keys().collect();
        pgns.sort();
        f.debug_struct("CsvRouter").field("pgns", &pgns).finish()
    }
}

impl CsvRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pgn`, replacing any previous handler
    pub fn register<H>(&mut self, pgn: u16, handler: H)
    where
        H: PgnHandler + 'static,
    {
        self.handlers.insert(pgn, Box::new(handler));
    }

    /// Remove the handler for `pgn`; returns whether one was registered
    pub fn unregister(&mut self, pgn: u16) -> bool {
        self.handlers.remove(&pgn).is_some()
    }

    pub fn is_registered(&self, pgn: u16) -> bool {
        self.handlers.contains_key(&pgn)
    }

    /// Classify `line` and dispatch it if it is a CSV frame
    pub fn route(&mut self, line: &str) -> RouteOutcome {
        let FrameShape::Csv(body) = classify(line) else {
            return RouteOutcome::NotCsv;
        };

        let fields: Vec<&str> = body.split(',').collect();
        let pgn = match parse_pgn(&fields) {
            Ok(pgn) => pgn,
            Err(e) => return RouteOutcome::Rejected(e),
        };

        match self.handlers.get_mut(&pgn) {
            Some(handler) => {
                let live = handler.handle(&fields);
                RouteOutcome::Handled { pgn, live }
            }
            None => {
                trace!("No handler for PGN {}", pgn);
                RouteOutcome::Unhandled(pgn)
            }
        }
    }
}
