//! # PGN Frame Encoder
//!
//! Builds binary position frames with the same layout and integrity
//! convention the decoder checks.

use bytes::{BufMut, BytesMut};

use super::checksum::checksum8;
use super::protocol::*;

/// Encode a position into a complete binary frame
///
/// The short layout (22 bytes) carries longitude and latitude; the long
/// layout (30 bytes) also carries the fix-to-fix metric.
///
/// # Examples
///
/// ```
/// use gps_out::pgn::encoder::encode_position_frame;
/// use gps_out::pgn::protocol::{PositionFrame, PGN_SOURCE_AGIO};
///
/// let frame = encode_position_frame(PGN_SOURCE_AGIO, &PositionFrame::new(-122.5, 37.75), false);
/// assert_eq!(frame.len(), 22);
/// assert_eq!(frame[3], 100);
/// ```
pub fn encode_position_frame(source: u8, position: &PositionFrame, long: bool) -> Vec<u8> {
    let payload_length = if long {
        POSITION_PAYLOAD_LONG
    } else {
        POSITION_PAYLOAD_SHORT
    };

    let mut frame = BytesMut::with_capacity(frame_size(payload_length));
    frame.put_u8(PGN_HEADER_HI);
    frame.put_u8(PGN_HEADER_LO);
    frame.put_u8(source);
    frame.put_u8(PGN_CORRECTED_POSITION);
    frame.put_u8(payload_length);
    frame.put_f64_le(position.longitude);
    frame.put_f64_le(position.latitude);
    if long {
        frame.put_f64_le(position.fix_to_fix);
    }

    // Integrity covers source through the end of the payload
    let code = checksum8(&frame[PGN_INTEGRITY_START..]);
    frame.put_u8(code);

    frame.to_vec()
}
