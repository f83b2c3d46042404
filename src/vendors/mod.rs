//! Driver Registry for Manufacturer-Specific Telegram Decoding
//!
//! Drivers turn a parsed (and, if needed, decrypted) telegram into a field
//! map. Each driver module supplies its own detection keys through a
//! `register` function; [`DriverRegistry::with_defaults`] calls them in a
//! fixed order, which is also the lookup tie-break order.

pub mod fields;
pub mod hydrocalm4;
pub mod hydrodigit;

use std::sync::{Arc, PoisonError, RwLock};

use crate::payload::{RecordError, ValueError};
use crate::wmbus::frame::Telegram;
use thiserror::Error;

pub use fields::{FieldMap, FieldValue};
pub use hydrodigit::manufacturer::ManufacturerError;

/// Errors raised by driver lookup and processing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("driver not found for manufacturer 0x{manufacturer:04X} CI 0x{ci:02X}")]
    NotFound { manufacturer: u16, ci: u8 },

    #[error("{driver}: telegram appears encrypted (supply meter key)")]
    Encrypted { driver: &'static str },

    #[error("{driver} manufacturer data missing")]
    MissingManufacturerData { driver: &'static str },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Manufacturer(#[from] ManufacturerError),
}

/// Detection key: a driver handles telegrams whose manufacturer and CI
/// match and whose device type is listed (an empty list matches any).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub manufacturer: u16,
    pub ci: u8,
    pub device_types: Vec<u8>,
}

impl Detection {
    pub fn new(manufacturer: u16, ci: u8, device_types: &[u8]) -> Self {
        Self {
            manufacturer,
            ci,
            device_types: device_types.to_vec(),
        }
    }

    pub fn matches(&self, manufacturer: u16, ci: u8, device_type: u8) -> bool {
        self.manufacturer == manufacturer
            && self.ci == ci
            && (self.device_types.is_empty() || self.device_types.contains(&device_type))
    }
}

/// A telegram decoder for one meter family.
pub trait Driver: Send + Sync {
    /// Canonical driver name reported in results
    fn name(&self) -> &'static str;

    /// Decode the telegram payload into fields.
    fn process(&self, telegram: &Telegram) -> Result<FieldMap, DriverError>;

    /// Best-effort metadata when [`Driver::process`] cannot run or fails.
    /// Drivers without partial reporting return `None`.
    fn partial_fields(&self, _telegram: &Telegram) -> Option<FieldMap> {
        None
    }
}

struct Registration {
    detection: Detection,
    driver: Arc<dyn Driver>,
}

/// Ordered, append-only driver registry.
///
/// Registration is expected to finish before concurrent lookups start;
/// lookups only take the read lock.
#[derive(Default)]
pub struct DriverRegistry {
    inner: RwLock<Vec<Registration>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in drivers, hydrodigit first.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        hydrodigit::register(&registry);
        hydrocalm4::register(&registry);
        registry
    }

    /// Append a driver under `detection`.
    pub fn register(&self, detection: Detection, driver: Arc<dyn Driver>) {
        log::debug!(
            "registering driver {} for manufacturer 0x{:04X} CI 0x{:02X}",
            driver.name(),
            detection.manufacturer,
            detection.ci
        );
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.push(Registration { detection, driver });
    }

    /// First driver, in registration order, whose detection key matches.
    pub fn lookup_key(
        &self,
        manufacturer: u16,
        ci: u8,
        device_type: u8,
    ) -> Result<Arc<dyn Driver>, DriverError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .iter()
            .find(|r| r.detection.matches(manufacturer, ci, device_type))
            .map(|r| Arc::clone(&r.driver))
            .ok_or(DriverError::NotFound { manufacturer, ci })
    }

    pub fn lookup(&self, telegram: &Telegram) -> Result<Arc<dyn Driver>, DriverError> {
        self.lookup_key(telegram.manufacturer, telegram.ci, telegram.device_type)
    }

    /// Registered (driver name, detection) pairs in lookup order.
    pub fn registrations(&self) -> Vec<(&'static str, Detection)> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .iter()
            .map(|r| (r.driver.name(), r.detection.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Helper function to convert manufacturer ID to its three-letter code.
/// Ids that do not map to letters are rendered as hex.
pub fn manufacturer_id_to_string(id: u16) -> String {
    let c1 = ((id >> 10) & 0x1F) as u8 + b'A' - 1;
    let c2 = ((id >> 5) & 0x1F) as u8 + b'A' - 1;
    let c3 = (id & 0x1F) as u8 + b'A' - 1;

    if [c1, c2, c3].iter().all(u8::is_ascii_uppercase) {
        String::from_utf8_lossy(&[c1, c2, c3]).into_owned()
    } else {
        format!("{id:04X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Driver for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process(&self, _telegram: &Telegram) -> Result<FieldMap, DriverError> {
            Ok(FieldMap::new())
        }
    }

    #[test]
    fn test_first_match_wins() {
        let registry = DriverRegistry::new();
        registry.register(Detection::new(0x1234, 0x7A, &[]), Arc::new(Named("any")));
        registry.register(Detection::new(0x1234, 0x7A, &[0x07]), Arc::new(Named("water")));
        assert_eq!(registry.lookup_key(0x1234, 0x7A, 0x07).unwrap().name(), "any");
    }

    #[test]
    fn test_device_type_filter() {
        let registry = DriverRegistry::new();
        registry.register(Detection::new(0x1234, 0x7A, &[0x07]), Arc::new(Named("water")));
        registry.register(Detection::new(0x1234, 0x7A, &[]), Arc::new(Named("fallback")));
        assert_eq!(registry.lookup_key(0x1234, 0x7A, 0x07).unwrap().name(), "water");
        assert_eq!(registry.lookup_key(0x1234, 0x7A, 0x04).unwrap().name(), "fallback");
    }

    #[test]
    fn test_not_found() {
        let registry = DriverRegistry::new();
        let err = registry.lookup_key(0x09B4, 0x72, 0x07).err().unwrap();
        assert_eq!(err, DriverError::NotFound { manufacturer: 0x09B4, ci: 0x72 });
        assert_eq!(err.to_string(), "driver not found for manufacturer 0x09B4 CI 0x72");
    }

    #[test]
    fn test_default_registrations_order() {
        let registry = DriverRegistry::with_defaults();
        let names: Vec<_> = registry.registrations().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["hydrodigit", "hydrodigit", "hydrocalm4"]);
        assert_eq!(registry.lookup_key(0x09B4, 0x8C, 0x0D).unwrap().name(), "hydrocalm4");
        assert_eq!(registry.lookup_key(0x09B4, 0x8C, 0x06).unwrap().name(), "hydrodigit");
    }

    #[test]
    fn test_manufacturer_code() {
        assert_eq!(manufacturer_id_to_string(0x09B4), "BMT");
        assert_eq!(manufacturer_id_to_string(0x0000), "0000");
    }
}
