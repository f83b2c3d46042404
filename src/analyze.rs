//! # Telegram Analysis
//!
//! Ties the decoding stages together: frame parsing, driver lookup,
//! decryption and driver processing.
//!
//! A telegram from an unknown meter is not an error: the result carries the
//! driver name [`UNKNOWN_DRIVER`] and no fields. When a driver can report
//! partial fields, a missing key or a failed decode still produces a result
//! with the reason under `encryption` or `error`.
//!
//! ## Usage
//!
//! ```rust
//! use wmbus_rs::{AnalyzeOptions, Analyzer};
//!
//! let analyzer = Analyzer::default();
//! let analysis = analyzer
//!     .analyze_hex(
//!         "4E44B4098686868613077AF00040052F2F0C1366380000046D27287E2A0F150E00000000C10000D10000E60000FD00000C01002F0100410100540100680100890000A00000B30000002F2F2F2F2F2F",
//!         &AnalyzeOptions::default(),
//!     )
//!     .unwrap();
//! assert_eq!(analysis.driver, "hydrodigit");
//! assert_eq!(analysis.fields["total_m3"].as_f64(), Some(3.866));
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::WMBusError;
use crate::util::hex::{decode_hex, encode_hex_upper, format_hex_compact};
use crate::vendors::fields::{put, FieldMap};
use crate::vendors::DriverRegistry;
use crate::wmbus::crypto::{decrypt, AesKey, CryptoError};
use crate::wmbus::frame::{parse_frame, Telegram};

/// Driver name reported when no registered driver matches.
pub const UNKNOWN_DRIVER: &str = "unknown";

/// Per-call decoding options.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub key: Option<AesKey>,
}

impl AnalyzeOptions {
    pub fn with_key(key: AesKey) -> Self {
        Self { key: Some(key) }
    }

    /// Options from a 32 hex digit key; a blank string means no key.
    pub fn from_key_hex(key_hex: &str) -> Result<Self, CryptoError> {
        if key_hex.trim().is_empty() {
            return Ok(Self::default());
        }
        AesKey::from_hex(key_hex).map(Self::with_key)
    }
}

/// Outcome of decoding one telegram.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub driver: String,
    pub telegram: Telegram,
    pub fields: FieldMap,
    pub byte_count: usize,
}

impl Analysis {
    fn new(driver: &str, telegram: Telegram, fields: FieldMap) -> Self {
        Self {
            driver: driver.to_string(),
            byte_count: telegram.raw.len(),
            telegram,
            fields,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.driver == UNKNOWN_DRIVER
    }

    /// JSON summary of the telegram header and the decoded fields.
    pub fn summary(&self) -> Value {
        let mut summary = json!({
            "driver": self.driver,
            "byte_count": self.byte_count,
            "raw_hex": encode_hex_upper(&self.telegram.raw),
            "meter_id": self.telegram.meter_id_string(),
            "manufacturer": format!("0x{:04X}", self.telegram.manufacturer),
            "manufacturer_code": self.telegram.manufacturer_code(),
            "ci": format!("0x{:02X}", self.telegram.ci),
        });
        if !self.fields.is_empty() {
            summary["fields"] = json!(self.fields);
        }
        summary
    }

    /// Summary as single-line JSON.
    pub fn to_compact_string(&self) -> String {
        self.summary().to_string()
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.summary()) {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(
                f,
                "driver: {} bytes:{} (marshal error: {})",
                self.driver, self.byte_count, e
            ),
        }
    }
}

/// Decodes telegrams against a shared driver registry.
#[derive(Clone)]
pub struct Analyzer {
    registry: Arc<DriverRegistry>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Arc::new(DriverRegistry::with_defaults()))
    }
}

impl Analyzer {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Decodes one raw telegram.
    pub fn analyze(&self, raw: &[u8], options: &AnalyzeOptions) -> Result<Analysis, WMBusError> {
        log::trace!("telegram: {}", format_hex_compact(raw));
        let mut telegram = parse_frame(raw)?;

        let driver = match self.registry.lookup(&telegram) {
            Ok(driver) => driver,
            Err(e) => {
                log::debug!("{e}");
                return Ok(Analysis::new(UNKNOWN_DRIVER, telegram, FieldMap::new()));
            }
        };

        if let Err(e) = decrypt(&mut telegram, options.key.as_ref()) {
            if e == CryptoError::KeyRequired {
                if let Some(mut fields) = driver.partial_fields(&telegram) {
                    log::warn!("meter {}: {}", telegram.meter_id_string(), e);
                    put(&mut fields, "encryption", e.to_string());
                    return Ok(Analysis::new(driver.name(), telegram, fields));
                }
            }
            return Err(e.into());
        }

        match driver.process(&telegram) {
            Ok(fields) => Ok(Analysis::new(driver.name(), telegram, fields)),
            Err(e) => match driver.partial_fields(&telegram) {
                Some(mut fields) => {
                    log::warn!(
                        "meter {}: {} decode failed: {}",
                        telegram.meter_id_string(),
                        driver.name(),
                        e
                    );
                    put(&mut fields, "error", e.to_string());
                    Ok(Analysis::new(driver.name(), telegram, fields))
                }
                None => Err(e.into()),
            },
        }
    }

    /// Decodes a telegram given as hex text. Whitespace, `|` and `_`
    /// separators and a leading `0x` are ignored.
    pub fn analyze_hex(
        &self,
        hex_text: &str,
        options: &AnalyzeOptions,
    ) -> Result<Analysis, WMBusError> {
        let cleaned: String = hex_text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '|' && *c != '_')
            .collect();
        let digits = cleaned
            .strip_prefix("0x")
            .or_else(|| cleaned.strip_prefix("0X"))
            .unwrap_or(&cleaned);
        let raw = decode_hex(digits)?;
        self.analyze(&raw, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendors::{Detection, Driver, DriverError};

    const SCENARIO_A: &str = "4E44B4098686868613077AF00040052F2F0C1366380000046D27287E2A0F150E00000000C10000D10000E60000FD00000C01002F0100410100540100680100890000A00000B30000002F2F2F2F2F2F";

    struct Bare;

    impl Driver for Bare {
        fn name(&self) -> &'static str {
            "bare"
        }

        fn process(&self, _telegram: &Telegram) -> Result<FieldMap, DriverError> {
            Err(DriverError::MissingManufacturerData { driver: "bare" })
        }
    }

    #[test]
    fn test_unknown_driver() {
        let analyzer = Analyzer::new(Arc::new(DriverRegistry::new()));
        let analysis = analyzer
            .analyze_hex(SCENARIO_A, &AnalyzeOptions::default())
            .unwrap();
        assert!(analysis.is_unknown());
        assert!(analysis.fields.is_empty());
        assert_eq!(analysis.byte_count, 79);
    }

    #[test]
    fn test_process_error_without_partial_propagates() {
        let registry = DriverRegistry::new();
        registry.register(Detection::new(0x09B4, 0x7A, &[]), Arc::new(Bare));
        let analyzer = Analyzer::new(Arc::new(registry));
        let err = analyzer
            .analyze_hex(SCENARIO_A, &AnalyzeOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            WMBusError::Driver(DriverError::MissingManufacturerData { .. })
        ));
    }

    #[test]
    fn test_key_required_without_partial_propagates() {
        // payload no longer starts with the filler pair, so a key is needed
        let needs_key = SCENARIO_A.replacen("2F2F0C13", "9E3A0C13", 1);
        let registry = DriverRegistry::new();
        registry.register(Detection::new(0x09B4, 0x7A, &[]), Arc::new(Bare));
        let analyzer = Analyzer::new(Arc::new(registry));
        let err = analyzer
            .analyze_hex(&needs_key, &AnalyzeOptions::default())
            .unwrap_err();
        assert_eq!(err, WMBusError::Crypto(CryptoError::KeyRequired));
    }

    #[test]
    fn test_hex_separators() {
        let analyzer = Analyzer::default();
        let spaced = format!("0x{}|{}", &SCENARIO_A[..20], &SCENARIO_A[20..]);
        let analysis = analyzer.analyze_hex(&spaced, &AnalyzeOptions::default()).unwrap();
        assert_eq!(analysis.driver, "hydrodigit");
    }

    #[test]
    fn test_summary() {
        let analysis = Analyzer::default()
            .analyze_hex(SCENARIO_A, &AnalyzeOptions::default())
            .unwrap();
        let summary = analysis.summary();
        assert_eq!(summary["driver"], "hydrodigit");
        assert_eq!(summary["meter_id"], "86868686");
        assert_eq!(summary["manufacturer"], "0x09B4");
        assert_eq!(summary["manufacturer_code"], "BMT");
        assert_eq!(summary["ci"], "0x7A");
        assert_eq!(summary["raw_hex"], SCENARIO_A);
        assert_eq!(summary["fields"]["meter"], "hydrodigit");
        assert!(analysis.to_string().contains("\"byte_count\": 79"));
    }

    #[test]
    fn test_key_options() {
        assert!(AnalyzeOptions::from_key_hex("  ").unwrap().key.is_none());
        assert!(AnalyzeOptions::from_key_hex("000102030405060708090A0B0C0D0E0F")
            .unwrap()
            .key
            .is_some());
        assert!(AnalyzeOptions::from_key_hex("0001").is_err());
    }
}
