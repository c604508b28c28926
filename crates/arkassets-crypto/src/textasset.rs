//! AES-128-CBC text asset codec
//!
//! Encrypted text assets are laid out as:
//! - a 128-byte signature block (ignored)
//! - 16 bytes of IV seed, XORed with the second half of [`CHAT_MASK`] to form the IV
//! - the AES-128-CBC ciphertext, PKCS#7 padded
//!
//! The key is the first half of [`CHAT_MASK`].

use aes::Aes128;
use cipher::block_padding::{NoPadding, Pkcs7};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::classify::{RSA_HEADER_LEN, TextKind};
use crate::error::{DecryptionError, Result};

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// Shared secret used to derive the key and IV ("UITpAi82pHAWwnzqHRMCwPonJLIB3WCl")
pub const CHAT_MASK: [u8; 32] = *b"UITpAi82pHAWwnzqHRMCwPonJLIB3WCl";

const BLOCK: usize = 16;

fn derive_iv(seed: &[u8]) -> [u8; BLOCK] {
    let mut iv = [0u8; BLOCK];
    for (i, byte) in iv.iter_mut().enumerate() {
        *byte = seed[i] ^ CHAT_MASK[BLOCK + i];
    }
    iv
}

/// Decrypt a text asset.
///
/// With `has_rsa` the leading signature block is skipped first. A wrong key or
/// input that is not ciphertext fails the padding check with
/// [`DecryptionError::InvalidPadding`].
pub fn decrypt_text_asset(stream: &[u8], has_rsa: bool) -> Result<Vec<u8>> {
    let data = if has_rsa {
        stream.get(RSA_HEADER_LEN..).unwrap_or_default()
    } else {
        stream
    };

    if data.len() < 2 * BLOCK {
        return Err(DecryptionError::TooShort {
            needed: 2 * BLOCK + if has_rsa { RSA_HEADER_LEN } else { 0 },
            actual: stream.len(),
        });
    }

    let ciphertext_len = data.len() - BLOCK;
    if ciphertext_len % BLOCK != 0 {
        return Err(DecryptionError::UnalignedCiphertext(ciphertext_len));
    }

    let iv = derive_iv(&data[..BLOCK]);
    let decryptor = Aes128CbcDec::new_from_slices(&CHAT_MASK[..BLOCK], &iv)
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;

    let mut payload = data[BLOCK..].to_vec();
    let plain_len = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut payload)
        .map_err(|_| DecryptionError::InvalidPadding)?
        .len();
    payload.truncate(plain_len);
    Ok(payload)
}

/// Encrypt `plaintext` into the on-disk text asset layout.
///
/// The signature block is zero-filled and `iv_seed` is stored in clear ahead of the
/// ciphertext.
pub fn encrypt_text_asset(plaintext: &[u8], iv_seed: [u8; BLOCK]) -> Result<Vec<u8>> {
    let pad = BLOCK - plaintext.len() % BLOCK;
    let mut body = Vec::with_capacity(plaintext.len() + pad);
    body.extend_from_slice(plaintext);
    body.resize(plaintext.len() + pad, pad as u8);

    let iv = derive_iv(&iv_seed);
    let encryptor = Aes128CbcEnc::new_from_slices(&CHAT_MASK[..BLOCK], &iv)
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;
    let body_len = body.len();
    encryptor
        .encrypt_padded_mut::<NoPadding>(&mut body, body_len)
        .map_err(|e| DecryptionError::Cipher(e.to_string()))?;

    let mut out = vec![0u8; RSA_HEADER_LEN];
    out.extend_from_slice(&iv_seed);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a text asset according to its [`TextKind`].
pub fn decode_text_asset(stream: &[u8], kind: TextKind) -> Result<Vec<u8>> {
    match kind {
        TextKind::LevelData => stream
            .get(RSA_HEADER_LEN..)
            .map(<[u8]>::to_vec)
            .ok_or(DecryptionError::TooShort {
                needed: RSA_HEADER_LEN,
                actual: stream.len(),
            }),
        TextKind::StandardText => decrypt_text_asset(stream, true),
    }
}
