//! Bundle decoding error types

use thiserror::Error;

/// Structural errors that stop a bundle from being decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Buffer ended before a required structure
    #[error("truncated {what}: need {needed} bytes, have {actual}")]
    Truncated {
        /// Structure being read
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        actual: usize,
    },

    /// Blocks-info region could not be decompressed
    #[error("blocks info decompression failed: {0}")]
    BlocksInfo(String),

    /// Size arithmetic overflowed
    #[error("size overflow while computing {0}")]
    SizeOverflow(&'static str),

    /// Declared output exceeds the decompression ceiling
    #[error("declared size {size} exceeds limit of {max} bytes")]
    TooLarge {
        /// Declared size
        size: u64,
        /// Allowed maximum
        max: usize,
    },

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for bundle operations
pub type DecodeResult<T> = Result<T, DecodeError>;
