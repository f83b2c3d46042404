//! # BMT Hydrocalm4 Heat Meter Driver
//!
//! Standard data records only. Values are routed by VIF range and by the
//! tariff and subunit of the record:
//!
//! | VIF          | Field                                              |
//! |--------------|----------------------------------------------------|
//! | `0x6D`       | `device_datetime`                                  |
//! | `0x00..0x0F` | `total_heating_kwh`, tariff 1 `total_cooling_kwh`  |
//! | `0x10..0x17` | subunit 1/2 `c1/c2_volume_m3`, tariff 1 cooling, else heating |
//! | `0x28..0x37` | `power_kw`                                         |
//! | `0x38..0x4F` | `volume_flow_m3h`                                  |
//! | `0x58..0x5B` | `supply_temperature_c`                             |
//! | `0x5C..0x5F` | `return_temperature_c`                             |

use std::sync::Arc;

use crate::constants::{MBUS_VIF_DATE_TIME, WMBUS_CI_ELL_SHORT};
use crate::payload::data_encoding::{decode_bcd_le, decode_type_f_datetime};
use crate::payload::record::{parse_records, Record};
use crate::payload::vif_maps::scale_value;
use crate::payload::ValueError;
use crate::vendors::fields::{put, FieldMap};
use crate::vendors::hydrodigit::{DATE_TIME_FORMAT, DEFAULT_TIMESTAMP, MANUFACTURER_BMT};
use crate::vendors::{Detection, Driver, DriverError, DriverRegistry};
use crate::wmbus::frame::Telegram;

pub const DEVICE_TYPE_HEAT: u8 = 0x0D;

const DRIVER_NAME: &str = "hydrocalm4";
const MEDIA: &str = "heat/cooling load";

/// Application records start at the meter date/time record.
const APPLICATION_START: [u8; 2] = [0x04, MBUS_VIF_DATE_TIME];

pub fn register(registry: &DriverRegistry) {
    registry.register(
        Detection::new(MANUFACTURER_BMT, WMBUS_CI_ELL_SHORT, &[DEVICE_TYPE_HEAT]),
        Arc::new(Hydrocalm4Driver),
    );
}

/// Aggregated readings; each is set by the last matching record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeatReadings {
    pub device_datetime: Option<String>,
    pub total_heating_kwh: Option<f64>,
    pub total_cooling_kwh: Option<f64>,
    pub total_heating_m3: Option<f64>,
    pub total_cooling_m3: Option<f64>,
    pub c1_volume_m3: Option<f64>,
    pub c2_volume_m3: Option<f64>,
    pub supply_temperature_c: Option<f64>,
    pub return_temperature_c: Option<f64>,
    pub volume_flow_m3h: Option<f64>,
    pub power_kw: Option<f64>,
}

impl HeatReadings {
    /// Field names and values in output order.
    fn values(&self) -> [(&'static str, Option<f64>); 10] {
        [
            ("total_heating_kwh", self.total_heating_kwh),
            ("total_cooling_kwh", self.total_cooling_kwh),
            ("total_heating_m3", self.total_heating_m3),
            ("total_cooling_m3", self.total_cooling_m3),
            ("c1_volume_m3", self.c1_volume_m3),
            ("c2_volume_m3", self.c2_volume_m3),
            ("supply_temperature_c", self.supply_temperature_c),
            ("return_temperature_c", self.return_temperature_c),
            ("volume_flow_m3h", self.volume_flow_m3h),
            ("power_kw", self.power_kw),
        ]
    }
}

/// Drops anything before the first `04 6D` pair.
pub fn trim_to_application(payload: &[u8]) -> &[u8] {
    payload
        .windows(2)
        .position(|w| w == APPLICATION_START)
        .map_or(payload, |start| &payload[start..])
}

fn decode_value(record: &Record) -> Result<f64, ValueError> {
    scale_value(record.vif, decode_bcd_le(&record.data)?)
}

/// Routes records into [`HeatReadings`]. Records without data are ignored.
pub fn aggregate(records: &[Record]) -> Result<HeatReadings, ValueError> {
    let mut out = HeatReadings::default();
    for record in records.iter().filter(|r| !r.data.is_empty()) {
        match record.vif {
            MBUS_VIF_DATE_TIME => {
                let dt = decode_type_f_datetime(&record.data)?;
                out.device_datetime = Some(dt.format(DATE_TIME_FORMAT).to_string());
            }
            0x00..=0x0F => {
                let value = Some(decode_value(record)?);
                if record.tariff == 1 {
                    out.total_cooling_kwh = value;
                } else {
                    out.total_heating_kwh = value;
                }
            }
            0x10..=0x17 => {
                let value = Some(decode_value(record)?);
                match (record.subunit, record.tariff) {
                    (1, _) => out.c1_volume_m3 = value,
                    (2, _) => out.c2_volume_m3 = value,
                    (_, 1) => out.total_cooling_m3 = value,
                    _ => out.total_heating_m3 = value,
                }
            }
            0x38..=0x4F => out.volume_flow_m3h = Some(decode_value(record)?),
            0x28..=0x37 => out.power_kw = Some(decode_value(record)?),
            0x58..=0x5B => out.supply_temperature_c = Some(decode_value(record)?),
            0x5C..=0x5F => out.return_temperature_c = Some(decode_value(record)?),
            _ => {}
        }
    }
    Ok(out)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Hydrocalm4Driver;

impl Hydrocalm4Driver {
    fn base_fields(&self, telegram: &Telegram) -> FieldMap {
        let mut fields = FieldMap::new();
        put(&mut fields, "_", "telegram");
        put(&mut fields, "id", telegram.meter_id_string());
        put(&mut fields, "meter", DRIVER_NAME);
        put(&mut fields, "media", MEDIA);
        put(&mut fields, "status", "OK");
        fields
    }
}

impl Driver for Hydrocalm4Driver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn process(&self, telegram: &Telegram) -> Result<FieldMap, DriverError> {
        let records = parse_records(trim_to_application(&telegram.payload))?;
        let readings = aggregate(&records)?;

        let mut fields = self.base_fields(telegram);
        put(&mut fields, "timestamp", DEFAULT_TIMESTAMP);
        if let Some(dt) = readings.device_datetime.clone() {
            put(&mut fields, "device_datetime", dt);
        }
        for (name, value) in readings.values() {
            if let Some(value) = value {
                put(&mut fields, name, value);
            }
        }
        Ok(fields)
    }

    fn partial_fields(&self, telegram: &Telegram) -> Option<FieldMap> {
        Some(self.base_fields(telegram))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(dif: u8, vif: u8, data: &[u8], tariff: u32, subunit: u32) -> Record {
        Record {
            dif,
            vif,
            data: data.to_vec(),
            tariff,
            subunit,
            ..Record::default()
        }
    }

    #[test]
    fn test_trim_to_application() {
        let payload = [0x2F, 0x2F, 0x04, 0x6D, 0x01];
        assert_eq!(trim_to_application(&payload), &payload[2..]);
        let payload = [0x0C, 0x06, 0x04];
        assert_eq!(trim_to_application(&payload), &payload[..]);
    }

    #[test]
    fn test_energy_routing_by_tariff() {
        let records = [
            record(0x0C, 0x06, &[0x45, 0x23, 0x01, 0x00], 0, 0),
            record(0x8C, 0x06, &[0x00, 0x01, 0x00, 0x00], 1, 0),
        ];
        let r = aggregate(&records).unwrap();
        assert_eq!(r.total_heating_kwh, Some(12345.0));
        assert_eq!(r.total_cooling_kwh, Some(100.0));
    }

    #[test]
    fn test_volume_routing() {
        let records = [
            record(0x0C, 0x14, &[0x00, 0x01, 0x00, 0x00], 0, 1),
            record(0x0C, 0x14, &[0x00, 0x02, 0x00, 0x00], 1, 2),
            record(0x0C, 0x14, &[0x00, 0x03, 0x00, 0x00], 1, 0),
            record(0x0C, 0x14, &[0x00, 0x04, 0x00, 0x00], 0, 0),
        ];
        let r = aggregate(&records).unwrap();
        assert_eq!(r.c1_volume_m3, Some(1.0));
        assert_eq!(r.c2_volume_m3, Some(2.0));
        assert_eq!(r.total_cooling_m3, Some(3.0));
        assert_eq!(r.total_heating_m3, Some(4.0));
    }

    #[test]
    fn test_mj_energy_converted() {
        let records = [record(0x0C, 0x0B, &[0x00, 0x36, 0x00, 0x00], 0, 0)];
        let r = aggregate(&records).unwrap();
        assert!((r.total_heating_kwh.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsupported_vif_in_range_fails() {
        let records = [record(0x0C, 0x11, &[0x01, 0x00, 0x00, 0x00], 0, 0)];
        assert_eq!(aggregate(&records), Err(ValueError::UnsupportedVif(0x11)));
    }

    #[test]
    fn test_empty_records_ignored() {
        let records = [record(0x00, 0x06, &[], 0, 0), record(0x0A, 0x59, &[0x50, 0x21], 0, 0)];
        let r = aggregate(&records).unwrap();
        assert_eq!(r.total_heating_kwh, None);
        assert_eq!(r.supply_temperature_c, Some(21.5));
    }
}
