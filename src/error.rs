//! # Error Types
//!
//! Custom error types for GPS Out using `thiserror`.
//!
//! Errors are split by where they originate:
//! - [`TransportError`] for the serial link (surfaced to the owning context)
//! - [`FrameError`] for inbound frames (swallowed at the frame boundary)
//! - [`FormatError`] for outbound sentence inputs

use std::time::Duration;
use thiserror::Error;

/// Main error type for GPS Out
#[derive(Debug, Error)]
pub enum GpsOutError {
    /// Serial link errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Inbound frame errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Outbound sentence errors
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Persisted settings errors
    #[error("Settings error: {0}")]
    Settings(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serial link failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The configured port is not in the enumerated port list
    #[error("Serial port not found: {0}")]
    PortNotFound(String),

    /// The driver refused to open the port (permissions, already in use, ...)
    #[error("Failed to open {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// A write did not complete within the write timeout
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// A write failed at the driver level
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// No line terminator arrived within the read timeout
    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// A read failed at the driver level
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// A port setting was rejected (link open, empty name, baud out of range)
    #[error("Invalid port setting: {0}")]
    InvalidSetting(String),
}

/// Inbound frame rejections
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Frame size does not match its length field
    #[error("Frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Trailing integrity byte does not match the computed one
    #[error("Integrity mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    IntegrityMismatch { expected: u8, actual: u8 },

    /// A CSV field could not be parsed
    #[error("Field parse failure: {0}")]
    FieldParse(String),

    /// Header bytes are not 0x80 0x81
    #[error("Invalid header: 0x{0:02X} 0x{1:02X}")]
    BadHeader(u8, u8),

    /// The frame carries a PGN this decoder does not own
    #[error("Unexpected PGN {0}")]
    UnknownPgn(u8),

    /// Payload length is not one of the supported layouts
    #[error("Unsupported payload length {0}")]
    UnsupportedLength(u8),
}

/// Outbound sentence input problems
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// NaN or infinite input
    #[error("{0} is not a finite number")]
    NonFinite(&'static str),

    /// Value outside its valid range
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Result type alias for GPS Out
pub type Result<T> = std::result::Result<T, GpsOutError>;
