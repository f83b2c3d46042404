//! # wM-Bus Security Mode 5 Decryption
//!
//! Security mode 5 encrypts the application payload with AES-128-CBC. The IV is
//! not transmitted: it is rebuilt from the telegram header, so a key is the only
//! secret needed to decrypt.
//!
//! ```text
//! IV = M(2, LE) | A(4, as stored) | V(1) | T(1) | ACC x 8
//! ```
//!
//! The format carries no MAC. A wrong key is detected only by looking at the
//! first decrypted byte: it must be the `0x2F` filler or a DIF whose low nibble
//! is at most `0x0D`. Roughly one in eight wrong keys passes that check, which
//! is a property of the wire format.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wmbus_rs::wmbus::crypto::{decrypt, AesKey};
//! use wmbus_rs::wmbus::frame::parse_frame;
//!
//! # fn demo(raw: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let key = AesKey::from_hex("000102030405060708090A0B0C0D0E0F")?;
//! let mut telegram = parse_frame(raw)?;
//! decrypt(&mut telegram, Some(&key))?;
//! # Ok(())
//! # }
//! ```

use crate::constants::{
    AES_BLOCK_SIZE, AES_KEY_SIZE, MBUS_DIB_DIF_IDLE_FILLER, WMBUS_SECURITY_MODE_AES_CBC_IV,
};
use crate::util::hex;
use crate::wmbus::frame::Telegram;
use cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Errors raised by the security layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encrypted telegram: AES key required (use --key)")]
    KeyRequired,

    #[error("encrypted telegram: AES key rejected (bad plaintext)")]
    KeyRejected,

    #[error("encrypted payload truncated: need {required} bytes, have {available}")]
    Truncated { required: usize, available: usize },

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Invalid key hex: {0}")]
    InvalidKeyHex(String),

    #[error("Decryption failed: {reason}")]
    DecryptionFailed { reason: String },
}

/// AES-128 key. The bytes are wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AesKey {
    key: [u8; AES_KEY_SIZE],
}

impl AesKey {
    /// Create AES key from a 16-byte slice
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != AES_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: AES_KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut key = [0u8; AES_KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Create AES key from 32 hex characters; whitespace is ignored.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex::decode_hex(hex_str).map_err(|e| CryptoError::InvalidKeyHex(e.to_string()))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; AES_KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(<redacted>)")
    }
}

/// Plaintext heuristic on the first byte of a payload.
pub fn looks_like_plaintext(data: &[u8]) -> bool {
    match data.first() {
        Some(&first) => first == MBUS_DIB_DIF_IDLE_FILLER || (first & 0x0F) <= 0x0D,
        None => false,
    }
}

fn starts_with_filler_pair(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == MBUS_DIB_DIF_IDLE_FILLER && data[1] == MBUS_DIB_DIF_IDLE_FILLER
}

/// Whether the payload of `telegram` still has to be decrypted.
pub fn needs_decryption(telegram: &Telegram) -> bool {
    if telegram.payload.is_empty() || starts_with_filler_pair(&telegram.payload) {
        return false;
    }
    match &telegram.tpl {
        Some(tpl) => tpl.security_mode == WMBUS_SECURITY_MODE_AES_CBC_IV,
        None => !looks_like_plaintext(&telegram.payload),
    }
}

/// Number of leading payload bytes covered by the encryption.
pub fn encrypted_prefix_len(telegram: &Telegram) -> usize {
    let available = telegram.payload.len();
    let len = match &telegram.tpl {
        Some(tpl) if tpl.encrypted_blocks > 0 => {
            (tpl.encrypted_blocks as usize * AES_BLOCK_SIZE).min(available)
        }
        _ => available,
    };
    len - len % AES_BLOCK_SIZE
}

/// Rebuild the mode 5 IV from the telegram header.
pub fn build_iv(telegram: &Telegram) -> [u8; AES_BLOCK_SIZE] {
    let mut iv = [0u8; AES_BLOCK_SIZE];
    iv[0..2].copy_from_slice(&telegram.manufacturer.to_le_bytes());
    iv[2..6].copy_from_slice(&telegram.meter_id);
    iv[6] = telegram.version;
    iv[7] = telegram.device_type;
    iv[8..16].fill(telegram.access_number);
    iv
}

fn aes_cbc_decrypt(
    key: &AesKey,
    iv: &[u8; AES_BLOCK_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let decryptor = Aes128CbcDec::new_from_slices(key.as_bytes(), iv).map_err(|e| {
        CryptoError::DecryptionFailed {
            reason: e.to_string(),
        }
    })?;
    decryptor
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed {
            reason: e.to_string(),
        })
}

/// Decrypt the payload of `telegram` in place.
///
/// A no-op when [`needs_decryption`] is false. On success the payload becomes
/// the decrypted prefix followed by the untouched remainder, with a leading
/// `2F 2F` pair stripped.
pub fn decrypt(telegram: &mut Telegram, key: Option<&AesKey>) -> Result<(), CryptoError> {
    if !needs_decryption(telegram) {
        return Ok(());
    }
    let key = key.ok_or(CryptoError::KeyRequired)?;

    let required = encrypted_prefix_len(telegram);
    if required == 0 {
        return Err(CryptoError::KeyRejected);
    }
    let available = telegram.payload.len();
    if required > available {
        return Err(CryptoError::Truncated {
            required,
            available,
        });
    }

    let iv = build_iv(telegram);
    let mut plaintext = aes_cbc_decrypt(key, &iv, &telegram.payload[..required])?;

    if !looks_like_plaintext(&plaintext) {
        log::warn!(
            "meter {}: decrypted payload failed plaintext check",
            telegram.meter_id_string()
        );
        return Err(CryptoError::KeyRejected);
    }

    plaintext.extend_from_slice(&telegram.payload[required..]);
    if starts_with_filler_pair(&plaintext) {
        plaintext.drain(..2);
    }
    log::debug!(
        "meter {}: decrypted {} of {} payload bytes",
        telegram.meter_id_string(),
        required,
        available
    );
    telegram.payload = plaintext;
    Ok(())
}
