//! Text asset decryption for Arknights asset bundles
//!
//! Game tables shipped inside bundles are stored behind a 128-byte signature block and
//! encrypted with AES-128-CBC. The key and IV are derived from a fixed shared mask; the
//! IV additionally mixes in 16 bytes stored in front of the ciphertext.
//!
//! Stage data under `gamedata/levels` is the exception: only the signature block is
//! present and the body is stored in clear. [`classify`] selects the mode from the
//! destination path.
//!
//! # Example
//!
//! ```
//! use arkassets_crypto::{TextKind, classify, decode_text_asset, encrypt_text_asset};
//!
//! let encrypted = encrypt_text_asset(br#"{"ok":true}"#, [7u8; 16]).unwrap();
//! let kind = classify("gamedata/excel/item_table.bytes");
//! assert_eq!(kind, TextKind::StandardText);
//!
//! let plain = decode_text_asset(&encrypted, kind).unwrap();
//! assert_eq!(plain, br#"{"ok":true}"#);
//! ```

#![warn(missing_docs)]

pub mod classify;
pub mod error;
pub mod textasset;

pub use classify::{RSA_HEADER_LEN, TextKind, classify, looks_encrypted};
pub use error::{DecryptionError, Result};
pub use textasset::{CHAT_MASK, decode_text_asset, decrypt_text_asset, encrypt_text_asset};
