//! # GPS Out Library
//!
//! Bridges a guidance application to a serial device that expects NMEA
//! position sentences.
//!
//! Corrected positions arrive as binary PGN frames, CSV frames from the
//! device are routed to registered handlers, and a `$GPRMC` sentence built
//! from the freshest position is written back to the device.

pub mod agio;
pub mod bridge;
pub mod config;
pub mod error;
pub mod freshness;
pub mod logging;
pub mod nmea;
pub mod pgn;
pub mod serial;
pub mod settings;
