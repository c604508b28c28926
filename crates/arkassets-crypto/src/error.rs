//! Error types for text asset decryption

use thiserror::Error;

/// Errors raised while decrypting a text asset
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// Input is too short to hold the header, IV and one cipher block
    #[error("Text asset too short: need at least {needed} bytes, got {actual}")]
    TooShort {
        /// Minimum number of bytes required
        needed: usize,
        /// Number of bytes available
        actual: usize,
    },

    /// Ciphertext length is not a multiple of the AES block size
    #[error("Ciphertext length {0} is not a multiple of 16")]
    UnalignedCiphertext(usize),

    /// Decrypted data does not end in valid PKCS#7 padding
    #[error("Invalid PKCS#7 padding after decryption")]
    InvalidPadding,

    /// Block cipher rejected the key, IV or buffer
    #[error("Cipher error: {0}")]
    Cipher(String),
}

/// Result type for decryption operations
pub type Result<T> = std::result::Result<T, DecryptionError>;
