//! # Wireless M-Bus (wM-Bus) Module
//!
//! This module provides the link and transport layer handling of wireless
//! M-Bus telegrams: header parsing and security mode 5 decryption.

pub mod crypto;
pub mod frame;

// Re-export the necessary types and functions from the submodules
pub use crypto::{decrypt, needs_decryption, AesKey, CryptoError};
pub use frame::{parse_frame, FrameError, StatusFlags, Telegram, TplInfo};
