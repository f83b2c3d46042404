//! # wmbus-rs - A Rust Crate for Decoding Wireless M-Bus Telegrams
//!
//! The wmbus-rs crate decodes Wireless M-Bus (EN 13757-4) application
//! telegrams received from utility meters, such as water and heat meters.
//!
//! ## Features
//!
//! - Parse the link-layer header and the short transport header of a telegram
//! - Decrypt security mode 5 payloads (AES-128-CBC with an IV derived from the header)
//! - Parse DIF/VIF data records with storage, tariff and subunit indices
//! - Select a manufacturer driver by manufacturer, CI and device type
//! - Decode BMT hydrodigit water meters and hydrocalm4 heat meters into field maps
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! wmbus-rs = "0.1.0"
//! ```
//!
//! ```rust
//! use wmbus_rs::{analyze, AnalyzeOptions};
//! use wmbus_rs::util::hex::decode_hex;
//!
//! let raw = decode_hex(
//!     "4E44B4098686868613077AF00040052F2F0C1366380000046D27287E2A0F150E00000000C10000D10000E60000FD00000C01002F0100410100540100680100890000A00000B30000002F2F2F2F2F2F",
//! ).unwrap();
//! let analysis = analyze(&raw, &AnalyzeOptions::default()).unwrap();
//! println!("{analysis}");
//! ```

pub mod analyze;
pub mod constants;
pub mod error;
pub mod logging;
pub mod payload;
pub mod util;
pub mod vendors;
pub mod wmbus;

pub use crate::analyze::{Analysis, AnalyzeOptions, Analyzer, UNKNOWN_DRIVER};
pub use crate::error::WMBusError;
pub use crate::logging::{init_logger, log_error, log_info};

// Core wM-Bus types
pub use payload::{parse_records, Record, RecordError};
pub use wmbus::crypto::{AesKey, CryptoError};
pub use wmbus::frame::{parse_frame, FrameError, StatusFlags, Telegram, TplInfo};

// Driver registry
pub use vendors::{
    manufacturer_id_to_string, Detection, Driver, DriverError, DriverRegistry, FieldMap,
    FieldValue,
};

/// Decode one raw telegram with the built-in drivers.
///
/// # Arguments
/// * `raw` - Link-layer-decoded telegram, starting with the L field
/// * `options` - Decoding options, e.g. the AES key
///
/// # Returns
/// * `Ok(Analysis)` - Driver name and decoded fields (driver `"unknown"` if none matched)
/// * `Err(WMBusError)` - Frame, decryption or decode failure
pub fn analyze(raw: &[u8], options: &AnalyzeOptions) -> Result<Analysis, WMBusError> {
    Analyzer::default().analyze(raw, options)
}
