use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the window log store
///
/// End-of-sequence is not an error: readers report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of file while reading the header")]
    MissingHeader,

    #[error("Malformed frame at byte {offset}: {reason}")]
    MalformedFrame { offset: u64, reason: String },

    #[error("Frame of {0} bytes exceeds the 32-bit length prefix")]
    FrameTooLarge(usize),

    #[error("Failed to decode payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("UUID mismatch: expected {expected}, found {found}")]
    UuidMismatch { expected: Uuid, found: Uuid },

    #[error("Window index {0} is out of range")]
    OutOfRange(i64),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
