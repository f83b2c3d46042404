//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers shared by the CLI, the key configuration and the tests.
//! Telegrams and keys arrive as hex text; decoded fields and summaries
//! render bytes back as upper-case hex.
//!
//! ## Usage
//!
//! ```rust
//! use wmbus_rs::util::hex::{decode_hex, encode_hex_upper};
//!
//! let bytes = decode_hex("4E 44 B4 09").unwrap();
//! assert_eq!(bytes, vec![0x4E, 0x44, 0xB4, 0x09]);
//! assert_eq!(encode_hex_upper(&bytes), "4E44B409");
//! ```

use thiserror::Error;

/// Rejected hex input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// `[0x4E, 0x44]` -> `"4E44"`.
pub fn encode_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decodes hex text of either case, ignoring any whitespace between digits.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }

    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format bytes as "2F 2F 0C 13" for log lines.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fixture helper for tests and benchmarks. Panics on bad hex.
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    decode_hex(hex).expect("fixture hex must be valid")
}
