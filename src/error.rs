//! Error types shared by the codec, the dispatcher and the connection driver

use thiserror::Error;

/// Errors raised while serving a USB/IP connection
///
/// Everything except [Error::IndexOutOfRange] ends the connection it was
/// raised on. The listener itself never stops because of one of these.
#[derive(Debug, Error)]
pub enum Error {
    /// A buffer handed to the codec does not have the structure's fixed size
    #[error("Length mismatch decoding {structure}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        structure: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A header or command-submit carried a command code we do not serve
    #[error("Unsupported command: {command:#06X}")]
    UnsupportedCommand { command: u32 },

    /// The peer closed the connection in the middle of a frame
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// A command-submit whose direction is neither OUT (0) nor IN (1)
    #[error("Invalid transfer direction: {direction}")]
    InvalidDirection { direction: u32 },

    /// A string descriptor index beyond the device's string table
    #[error("String index {index} out of range (table has {len} entries)")]
    IndexOutOfRange { index: u8, len: usize },

    /// A command-submit addressed an endpoint the device does not have
    #[error("Unsupported endpoint: {ep}")]
    UnsupportedEndpoint { ep: u32 },

    /// A field name that is not part of the structure definition
    #[error("{structure} has no field named {field}")]
    UnknownField {
        structure: &'static str,
        field: String,
    },

    /// A value whose type does not match the field's declared type
    #[error("Type mismatch for field {structure}.{field}")]
    FieldType {
        structure: &'static str,
        field: &'static str,
    },

    /// A byte value longer than its fixed-width field
    #[error("Value for {structure}.{field} is {len} bytes, field holds {max}")]
    FieldOverflow {
        structure: &'static str,
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
