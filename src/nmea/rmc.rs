//! # RMC Sentence Builder
//!
//! Builds the `$GPRMC` (recommended minimum) sentence sent to chart
//! plotters and rate controllers:
//!
//! ```text
//! $GPRMC,123519.00,A,4807.0380000,N,01131.0000000,E,022.4,084.4,230394,0.0,W,*HH
//!        time      |  latitude      longitude       knots heading date  magvar
//!                  status (always active)
//! ```
//!
//! All numeric fields are fixed-width and locale-invariant. The checksum
//! covers everything between `$` and `*`, including the comma before `*`.

use std::time::Instant;

use chrono::{DateTime, Utc};

use super::checksum::xor_checksum;
use crate::error::FormatError;
use crate::freshness::Freshness;
use crate::pgn::protocol::PositionFrame;

/// Conversion from km/h to knots
pub const KNOTS_PER_KMH: f64 = 0.5399568;

/// Sentence identifier
pub const RMC_TALKER: &str = "GPRMC";

/// Minutes are written with this many decimal places
const MINUTE_DECIMALS: usize = 7;

/// One minute in units of the last written decimal place
const MINUTE_SCALE: f64 = 10_000_000.0;

/// Inputs for one sentence
#[derive(Debug, Clone, Copy)]
pub struct RmcInputs<'a> {
    /// Corrected position, preferred while fresh
    pub corrected: &'a Freshness<PositionFrame>,

    /// Raw position, used when the corrected one is stale
    pub raw: &'a Freshness<PositionFrame>,

    /// Ground speed in km/h
    pub speed_kmh: f64,

    /// Heading in degrees true
    pub heading: f64,
}

/// Pick the corrected position if fresh, else the raw one, else zeros
pub fn select_position(
    corrected: &Freshness<PositionFrame>,
    raw: &Freshness<PositionFrame>,
    now: Instant,
) -> PositionFrame {
    corrected
        .get_at(now)
        .or_else(|| raw.get_at(now))
        .unwrap_or_default()
}

/// Build a sentence for the current time
///
/// # Errors
///
/// Returns error if an input is not finite or a coordinate is out of range.
pub fn build_rmc(inputs: &RmcInputs<'_>) -> Result<String, FormatError> {
    build_rmc_at(inputs, Utc::now(), Instant::now())
}

/// Build a sentence as seen from `utc` (sentence time) and `now`
/// (freshness reference)
pub fn build_rmc_at(
    inputs: &RmcInputs<'_>,
    utc: DateTime<Utc>,
    now: Instant,
) -> Result<String, FormatError> {
    let position = select_position(inputs.corrected, inputs.raw, now);
    format_rmc(
        position.latitude,
        position.longitude,
        inputs.speed_kmh,
        inputs.heading,
        utc,
    )
}

/// Format a complete sentence including its checksum
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use gps_out::nmea::rmc::format_rmc;
///
/// let utc = Utc.with_ymd_and_hms(2024, 5, 17, 14, 3, 9).unwrap();
/// let sentence = format_rmc(37.75, -122.5, 10.0, 90.0, utc)?;
/// assert!(sentence.starts_with("$GPRMC,140309.00,A,3745.0000000,N,12230.0000000,W,005.4,090.0,170524,0.0,W,*"));
/// # Ok::<(), gps_out::error::FormatError>(())
/// ```
pub fn format_rmc(
    latitude: f64,
    longitude: f64,
    speed_kmh: f64,
    heading: f64,
    utc: DateTime<Utc>,
) -> Result<String, FormatError> {
    let latitude = checked(latitude, "latitude", 90.0)?;
    let longitude = checked(longitude, "longitude", 180.0)?;
    let speed_kmh = finite(speed_kmh, "speed")?;
    let heading = finite(heading, "heading")?;

    let (lat_text, north_south) = format_coordinate(latitude, 2, 'N', 'S');
    let (lon_text, east_west) = format_coordinate(longitude, 3, 'E', 'W');

    // Centiseconds are truncated, not rounded
    let centis = (utc.timestamp_subsec_millis() / 10).min(99);

    let body = format!(
        "{},{}.{:02},A,{},{},{},{},{},{},{},0.0,W,",
        RMC_TALKER,
        utc.format("%H%M%S"),
        centis,
        lat_text,
        north_south,
        lon_text,
        east_west,
        format_tenths(speed_kmh * KNOTS_PER_KMH),
        format_tenths(heading),
        utc.format("%d%m%y"),
    );

    Ok(format!("${}*{:02X}", body, xor_checksum(&body)))
}

fn finite(value: f64, field: &'static str) -> Result<f64, FormatError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormatError::NonFinite(field))
    }
}

fn checked(value: f64, field: &'static str, limit: f64) -> Result<f64, FormatError> {
    let value = finite(value, field)?;
    if value.abs() > limit {
        return Err(FormatError::OutOfRange { field, value });
    }
    Ok(value)
}

/// Degrees and minutes (`DDmm.mmmmmmm` / `DDDmm.mmmmmmm`) plus hemisphere
fn format_coordinate(
    value: f64,
    degree_width: usize,
    positive: char,
    negative: char,
) -> (String, char) {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let magnitude = value.abs();

    let mut degrees = magnitude.trunc() as u32;
    let mut minutes = ((magnitude - magnitude.trunc()) * 60.0 * MINUTE_SCALE).round() as u64;

    // 59.99999999 rounds to 60.0000000; carry it into the degrees
    let full_degree = (60.0 * MINUTE_SCALE) as u64;
    if minutes >= full_degree {
        degrees += 1;
        minutes -= full_degree;
    }

    let scale = MINUTE_SCALE as u64;
    let text = format!(
        "{:0dw$}{:02}.{:0md$}",
        degrees,
        minutes / scale,
        minutes % scale,
        dw = degree_width,
        md = MINUTE_DECIMALS,
    );
    (text, hemisphere)
}

/// `000.0` layout; negative values keep a leading minus
fn format_tenths(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded < 0.0 {
        format!("-{:05.1}", rounded.abs())
    } else {
        format!("{:05.1}", rounded.abs())
    }
}
