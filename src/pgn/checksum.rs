//! # PGN Integrity Code
//!
//! 8-bit additive checksum used by the guidance application's binary
//! frames: the low byte of the sum of every byte from the source field up
//! to, but not including, the trailing integrity byte.

use super::protocol::PGN_INTEGRITY_START;

/// Sum `data` into a single byte, wrapping on overflow
///
/// # Examples
///
/// ```
/// use gps_out::pgn::checksum::checksum8;
///
/// assert_eq!(checksum8(&[0x7F, 0x64, 0x10]), 0xF3);
/// assert_eq!(checksum8(&[0xFF, 0x02]), 0x01);
/// ```
pub fn checksum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Compute the integrity byte for a complete frame
///
/// Covers `frame[PGN_INTEGRITY_START .. len - 1]`; the last byte is the slot
/// the code is written into. Returns `None` if the frame is too short to
/// carry a covered region and an integrity byte.
pub fn frame_checksum(frame: &[u8]) -> Option<u8> {
    if frame.len() <= PGN_INTEGRITY_START {
        return None;
    }
    Some(checksum8(&frame[PGN_INTEGRITY_START..frame.len() - 1]))
}

/// Whether the trailing byte of `frame` matches its computed integrity code
pub fn has_valid_checksum(frame: &[u8]) -> bool {
    match (frame_checksum(frame), frame.last()) {
        (Some(expected), Some(&actual)) => expected == actual,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum8(&[]), 0x00);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum8(&[0x80, 0x80]), 0x00);
        assert_eq!(checksum8(&[0xFF; 3]), 0xFD);
    }

    #[test]
    fn test_frame_checksum_skips_header() {
        // Header bytes must not contribute
        let a = [0x80, 0x81, 0x01, 0x02, 0x00];
        let b = [0x00, 0x00, 0x01, 0x02, 0x00];
        assert_eq!(frame_checksum(&a), Some(0x03));
        assert_eq!(frame_checksum(&a), frame_checksum(&b));
    }

    #[test]
    fn test_frame_checksum_too_short() {
        assert_eq!(frame_checksum(&[0x80, 0x81]), None);
        assert!(!has_valid_checksum(&[0x80]));
    }

    #[test]
    fn test_has_valid_checksum() {
        let mut frame = vec![0x80, 0x81, 0x7F, 0x64, 0x00, 0x00];
        frame[5] = frame_checksum(&frame).unwrap();
        assert!(has_valid_checksum(&frame));

        frame[5] ^= 0x01;
        assert!(!has_valid_checksum(&frame));
    }

    #[test]
    fn test_checksum_changes_with_data() {
        let data1 = [0x7F, 0x64, 0x10, 0x04];
        let data2 = [0x7F, 0x64, 0x10, 0x05];
        assert_ne!(checksum8(&data1), checksum8(&data2));
    }
}
