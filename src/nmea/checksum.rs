//! # NMEA Sentence Checksum
//!
//! XOR of every byte between the leading `$` and the `*`, written as two
//! uppercase hex digits after the `*`.

/// XOR all bytes of `body`
///
/// # Examples
///
/// ```
/// use gps_out::nmea::checksum::xor_checksum;
///
/// assert_eq!(xor_checksum("GPRMC,"), 0x67);
/// ```
pub fn xor_checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Checksum of a sentence that starts with `$` and contains a `*`
///
/// Returns `None` if either delimiter is missing.
pub fn sentence_checksum(sentence: &str) -> Option<u8> {
    let body = sentence.strip_prefix('$')?;
    let star = body.find('*')?;
    Some(xor_checksum(&body[..star]))
}

/// Whether the hex pair after `*` matches the computed checksum
pub fn verify(sentence: &str) -> bool {
    let sentence = sentence.trim_end();
    let Some(computed) = sentence_checksum(sentence) else {
        return false;
    };
    let Some((_, trailer)) = sentence.rsplit_once('*') else {
        return false;
    };
    trailer.len() == 2 && u8::from_str_radix(trailer, 16).ok() == Some(computed)
}
