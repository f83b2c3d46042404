//! # Utility Modules
//!
//! Common helpers used throughout the wmbus-rs crate.

pub mod hex;

pub use hex::{decode_hex, encode_hex_upper, format_hex_compact, hex_to_bytes, HexError};
