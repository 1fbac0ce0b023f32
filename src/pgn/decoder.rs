//! # PGN Frame Decoder
//!
//! Decodes binary position frames (PGN 100) into a freshness-gated
//! [`PositionFrame`].

use bytes::Buf;
use tracing::debug;

use super::checksum::frame_checksum;
use super::protocol::*;
use crate::error::FrameError;
use crate::freshness::Freshness;

/// Fields carried by one position frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedPosition {
    pub longitude: f64,
    pub latitude: f64,
    /// Present only in the long layout
    pub fix_to_fix: Option<f64>,
}

/// Validate and decode a binary position frame
///
/// # Errors
///
/// Returns error if:
/// - Frame size does not equal `length + 6`
/// - The integrity byte does not match
/// - The header, PGN or payload length is not a position frame
pub fn decode_position_frame(frame: &[u8]) -> Result<DecodedPosition, FrameError> {
    if frame.len() <= PGN_HEADER_COUNT {
        return Err(FrameError::LengthMismatch {
            expected: PGN_HEADER_COUNT + 1,
            actual: frame.len(),
        });
    }

    let payload_length = frame[4];
    let expected = frame_size(payload_length);
    if frame.len() != expected {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: frame.len(),
        });
    }

    let received = frame[frame.len() - 1];
    // Length was checked above, so the covered region exists
    let computed = frame_checksum(frame).unwrap_or(!received);
    if computed != received {
        return Err(FrameError::IntegrityMismatch {
            expected: computed,
            actual: received,
        });
    }

    if frame[0] != PGN_HEADER_HI || frame[1] != PGN_HEADER_LO {
        return Err(FrameError::BadHeader(frame[0], frame[1]));
    }

    if frame[3] != PGN_CORRECTED_POSITION {
        return Err(FrameError::UnknownPgn(frame[3]));
    }

    let mut payload = &frame[POSITION_LONGITUDE_OFFSET..frame.len() - 1];
    match payload_length {
        POSITION_PAYLOAD_SHORT => Ok(DecodedPosition {
            longitude: payload.get_f64_le(),
            latitude: payload.get_f64_le(),
            fix_to_fix: None,
        }),
        POSITION_PAYLOAD_LONG => Ok(DecodedPosition {
            longitude: payload.get_f64_le(),
            latitude: payload.get_f64_le(),
            fix_to_fix: Some(payload.get_f64_le()),
        }),
        other => Err(FrameError::UnsupportedLength(other)),
    }
}

/// Owns the freshness-gated corrected position
#[derive(Debug, Clone)]
pub struct PositionDecoder {
    position: Freshness<PositionFrame>,
}

impl Default for PositionDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionDecoder {
    pub fn new() -> Self {
        Self {
            position: Freshness::new(PositionFrame::new(0.0, 0.0)),
        }
    }

    /// Decode `frame` and refresh the position on success
    ///
    /// Rejected frames are logged and dropped; the previous position stays
    /// visible for the rest of its window.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether the position was updated
    pub fn ingest(&mut self, frame: &[u8]) -> bool {
        match decode_position_frame(frame) {
            Ok(decoded) => {
                // Short frames carry the last known metric forward
                let fix_to_fix = decoded
                    .fix_to_fix
                    .unwrap_or(self.position.last_value().fix_to_fix);
                self.position.update(
                    PositionFrame::new(decoded.longitude, decoded.latitude)
                        .with_fix_to_fix(fix_to_fix),
                );
                true
            }
            Err(e) => {
                debug!("Dropped position frame ({} bytes): {}", frame.len(), e);
                false
            }
        }
    }

    /// The freshness-gated position
    pub fn position(&self) -> &Freshness<PositionFrame> {
        &self.position
    }

    /// Whether a frame was decoded within the freshness window
    pub fn is_connected(&self) -> bool {
        self.position.is_fresh()
    }

    /// Longitude, or 0 when stale
    pub fn longitude(&self) -> f64 {
        self.position.get_or_default().longitude
    }

    /// Latitude, or 0 when stale
    pub fn latitude(&self) -> f64 {
        self.position.get_or_default().latitude
    }

    /// Fix-to-fix metric, or 0 when stale
    pub fn fix_to_fix(&self) -> f64 {
        self.position.get_or_default().fix_to_fix
    }
}
