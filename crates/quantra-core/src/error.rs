//! Error types for codec operations.
//!
//! Every variant except [`Error::Io`] and [`Error::ThreadPool`] reports a
//! caller contract violation. Operations return as soon as one is detected
//! and write nothing further.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Codec error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Region extends past the logical element count of a span.
    #[error("out of bounds: offset {offset} + len {len} exceeds {num} elements")]
    OutOfBounds { offset: usize, len: usize, num: usize },

    /// Sub-region offset is not a multiple of the codec's group granularity.
    #[error("misaligned offset {offset}: must be a multiple of {alignment}")]
    Misaligned { offset: usize, alignment: usize },

    /// Packed storage is shorter than its element count requires.
    #[error("capacity mismatch: need {required} packed units, got {provided}")]
    CapacityMismatch { required: usize, provided: usize },

    /// Output buffer too small (including zero padding).
    #[error("buffer too small: need {required} elements, got {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    /// Worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// I/O error from the blob layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an out-of-bounds error.
    pub fn out_of_bounds(offset: usize, len: usize, num: usize) -> Self {
        Error::OutOfBounds { offset, len, num }
    }

    /// Create a misaligned offset error.
    pub fn misaligned(offset: usize, alignment: usize) -> Self {
        Error::Misaligned { offset, alignment }
    }

    /// Create a capacity mismatch error.
    pub fn capacity_mismatch(required: usize, provided: usize) -> Self {
        Error::CapacityMismatch { required, provided }
    }

    /// Create a buffer too small error.
    pub fn buffer_too_small(required: usize, provided: usize) -> Self {
        Error::BufferTooSmall { required, provided }
    }

    /// Create an I/O error with a custom message.
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io(std::io::Error::other(message.into()))
    }

    /// Check if this error is a caller contract violation.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::ThreadPool(_))
    }

    /// Get error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Error::OutOfBounds { .. } => "out_of_bounds",
            Error::Misaligned { .. } => "misaligned",
            Error::CapacityMismatch { .. } => "capacity_mismatch",
            Error::BufferTooSmall { .. } => "buffer_too_small",
            Error::ThreadPool(_) => "thread_pool",
            Error::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::out_of_bounds(10, 8, 16);
        assert_eq!(
            err.to_string(),
            "out of bounds: offset 10 + len 8 exceeds 16 elements"
        );
        assert_eq!(err.category(), "out_of_bounds");
    }

    #[test]
    fn test_contract_violation() {
        assert!(Error::misaligned(3, 256).is_contract_violation());
        assert!(Error::buffer_too_small(16, 8).is_contract_violation());
        assert!(!Error::io("disk full").is_contract_violation());
    }
}
