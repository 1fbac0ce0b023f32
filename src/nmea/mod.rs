//! # NMEA Output Module
//!
//! Outbound NMEA 0183 sentences.
//!
//! This module handles:
//! - `$GPRMC` construction from freshness-gated positions
//! - XOR sentence checksums

pub mod checksum;
pub mod rmc;
