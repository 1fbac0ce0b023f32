//! # PGN Protocol Constants and Types
//!
//! Core definitions shared by the binary and ASCII encodings of PGN frames.
//!
//! Binary frame layout:
//!
//! ```text
//! [0] 0x80  header hi
//! [1] 0x81  header lo
//! [2]       source
//! [3]       PGN
//! [4]       payload length
//! [5..]     payload
//! [last]    integrity byte (8-bit sum of bytes 2..last)
//! ```

/// First header byte of every binary frame
pub const PGN_HEADER_HI: u8 = 0x80;

/// Second header byte of every binary frame
pub const PGN_HEADER_LO: u8 = 0x81;

/// Header bytes before the payload: hi + lo + source + PGN + length
pub const PGN_HEADER_COUNT: usize = 5;

/// Offset of the first byte covered by the integrity code
pub const PGN_INTEGRITY_START: usize = 2;

/// Source id used by the guidance application
pub const PGN_SOURCE_AGIO: u8 = 0x7F;

/// Corrected position PGN
pub const PGN_CORRECTED_POSITION: u8 = 100;

/// Short position payload: longitude + latitude
pub const POSITION_PAYLOAD_SHORT: u8 = 16;

/// Long position payload: longitude + latitude + fix-to-fix metric
pub const POSITION_PAYLOAD_LONG: u8 = 24;

/// Fix-to-fix metric before any long frame has been decoded
pub const FIX_TO_FIX_SENTINEL: f64 = 1000.0;

/// Offset of the longitude double
pub const POSITION_LONGITUDE_OFFSET: usize = 5;

/// Offset of the latitude double
pub const POSITION_LATITUDE_OFFSET: usize = 13;

/// Offset of the fix-to-fix double (long layout only)
pub const POSITION_FIX_TO_FIX_OFFSET: usize = 21;

/// Total binary frame size for a payload length
pub const fn frame_size(payload_length: u8) -> usize {
    payload_length as usize + PGN_HEADER_COUNT + 1
}

/// Combines the low and high bytes of an ASCII frame into a PGN
pub const fn pgn_from_bytes(low: u8, high: u8) -> u16 {
    ((high as u16) << 8) | low as u16
}

/// A decoded position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionFrame {
    /// Longitude in decimal degrees, east positive
    pub longitude: f64,

    /// Latitude in decimal degrees, north positive
    pub latitude: f64,

    /// Fix-to-fix precision metric
    pub fix_to_fix: f64,
}

impl PositionFrame {
    /// Create a position without a fix-to-fix metric
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            fix_to_fix: FIX_TO_FIX_SENTINEL,
        }
    }

    /// Set the fix-to-fix metric
    #[must_use]
    pub fn with_fix_to_fix(mut self, fix_to_fix: f64) -> Self {
        self.fix_to_fix = fix_to_fix;
        self
    }
}
