//! # PGN Protocol Module
//!
//! Parameter group numbers shared by the guidance application's binary and
//! ASCII frame encodings.
//!
//! This module handles:
//! - Binary position frame decoding (PGN 100, short and long layouts)
//! - Position frame encoding with the matching integrity code
//! - 8-bit additive integrity checksum
//! - ASCII-CSV line classification and PGN dispatch

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod checksum;
pub mod router;
