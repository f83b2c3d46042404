//! # wM-Bus Error Handling
//!
//! This module defines the WMBusError enum, which wraps the errors of every
//! decoding stage of the wmbus-rs crate.

use crate::payload::{RecordError, ValueError};
use crate::util::hex::HexError;
use crate::vendors::{DriverError, ManufacturerError};
use crate::wmbus::crypto::CryptoError;
use crate::wmbus::frame::FrameError;
use thiserror::Error;

/// Represents the different error types that can occur in the crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WMBusError {
    /// The raw telegram could not be parsed.
    #[error("Error parsing wM-Bus frame: {0}")]
    Frame(#[from] FrameError),

    /// Decryption failed or a key is missing/rejected.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Data record parsing failed.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A record value could not be decoded.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Manufacturer block decoding failed.
    #[error(transparent)]
    Manufacturer(#[from] ManufacturerError),

    /// Driver lookup or processing failed.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The telegram or key text was not valid hex.
    #[error("Invalid hexadecimal string: {0}")]
    Hex(#[from] HexError),
}
