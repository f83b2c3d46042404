//! # BMT Hydrodigit Water Meter Driver
//!
//! Hydrodigit meters send a short standard record section (volume and meter
//! date/time) followed by a manufacturer block after DIF `0x0F`, decoded in
//! [`manufacturer`].

pub mod manufacturer;

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::constants::*;
use crate::payload::data_encoding::{decode_bcd_le, decode_type_f_datetime};
use crate::payload::record::{dif_data_length, RecordError};
use crate::payload::vif_maps::volume_scale;
use crate::vendors::fields::{put, FieldMap};
use crate::vendors::{Detection, Driver, DriverError, DriverRegistry};
use crate::wmbus::frame::{StatusFlags, Telegram};

use manufacturer::{parse_manufacturer_block, ManufacturerBlock, MONTHS};

pub const MANUFACTURER_BMT: u16 = 0x09B4;
pub const DEVICE_TYPE_WATER: u8 = 0x07;
pub const DEVICE_TYPE_WARM_WATER: u8 = 0x06;

const DRIVER_NAME: &str = "hydrodigit";
pub(crate) const DEFAULT_TIMESTAMP: &str = "1111-11-11T11:11:11Z";
pub(crate) const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Registers hydrodigit for both CI codes it transmits with.
pub fn register(registry: &DriverRegistry) {
    let driver = Arc::new(HydrodigitDriver);
    for ci in [WMBUS_CI_EXTENDED_LINK_LAYER, WMBUS_CI_ELL_SHORT] {
        registry.register(
            Detection::new(
                MANUFACTURER_BMT,
                ci,
                &[DEVICE_TYPE_WATER, DEVICE_TYPE_WARM_WATER],
            ),
            driver.clone(),
        );
    }
}

/// Readings taken from the standard record section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardReadings {
    pub total_m3: f64,
    pub volume_scale: f64,
    pub meter_datetime: Option<NaiveDateTime>,
}

/// Walks the standard records, skipping DIFE and VIFE chains. Only the
/// first 4-digit BCD volume and the first Type F date/time are kept.
/// Returns the readings and the manufacturer block (from the `0x0F` marker).
pub fn parse_standard_readings(
    payload: &[u8],
) -> Result<(StandardReadings, Option<&[u8]>), DriverError> {
    let mut readings = StandardReadings::default();
    let mut i = 0;

    while i < payload.len() {
        let start = i;
        let dif = payload[i];
        i += 1;
        if dif == MBUS_DIB_DIF_IDLE_FILLER {
            continue;
        }
        if dif == MBUS_DIB_DIF_MANUFACTURER_SPECIFIC {
            return Ok((readings, Some(&payload[i - 1..])));
        }

        let mut ext = dif;
        while ext & MBUS_DIB_DIF_EXTENSION_BIT != 0 {
            ext = *payload.get(i).ok_or(RecordError::Truncated {
                offset: i,
                what: "DIFE",
            })?;
            i += 1;
        }

        let mut vif = *payload.get(i).ok_or(RecordError::Truncated {
            offset: i,
            what: "VIF",
        })?;
        i += 1;
        while vif & MBUS_DIB_VIF_EXTENSION_BIT != 0 {
            vif = *payload.get(i).ok_or(RecordError::Truncated {
                offset: i,
                what: "VIFE",
            })?;
            i += 1;
        }

        let len = dif_data_length(dif).ok_or(RecordError::VariableLength {
            dif,
            offset: start,
        })?;
        let data = payload.get(i..i + len).ok_or(RecordError::Truncated {
            offset: i,
            what: "data",
        })?;
        i += len;

        match dif & MBUS_DATA_RECORD_DIF_MASK_DATA {
            0x0C if readings.total_m3 == 0.0 => {
                let digits = decode_bcd_le(data)?;
                if let Some(scale) = volume_scale(vif) {
                    readings.total_m3 = round_to(digits as f64 * scale, 3);
                    readings.volume_scale = scale;
                }
            }
            0x04 if vif == MBUS_VIF_DATE_TIME && readings.meter_datetime.is_none() => {
                readings.meter_datetime = Some(decode_type_f_datetime(data)?);
            }
            _ => {}
        }
    }

    Ok((readings, None))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let pow = 10f64.powi(decimals);
    (value * pow).round() / pow
}

fn media(device_type: u8) -> &'static str {
    match device_type {
        DEVICE_TYPE_WATER => "water",
        DEVICE_TYPE_WARM_WATER => "warm water",
        _ => "unknown",
    }
}

fn put_status_flags(fields: &mut FieldMap, flags: StatusFlags) {
    for name in flags.field_names() {
        put(fields, name, true);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HydrodigitDriver;

impl HydrodigitDriver {
    fn base_fields(&self, telegram: &Telegram) -> FieldMap {
        let mut fields = FieldMap::new();
        put(&mut fields, "_", "telegram");
        put(&mut fields, "id", telegram.meter_id_string());
        put(&mut fields, "meter", DRIVER_NAME);
        put(&mut fields, "media", media(telegram.device_type));
        fields
    }
}

impl Driver for HydrodigitDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn process(&self, telegram: &Telegram) -> Result<FieldMap, DriverError> {
        let (readings, block) = parse_standard_readings(&telegram.payload)?;
        if readings.total_m3 == 0.0 && readings.meter_datetime.is_none() {
            return Err(DriverError::Encrypted {
                driver: DRIVER_NAME,
            });
        }
        let block = block.ok_or(DriverError::MissingManufacturerData {
            driver: DRIVER_NAME,
        })?;
        let mfct = parse_manufacturer_block(block, readings.volume_scale)?;

        let mut fields = self.base_fields(telegram);
        put(&mut fields, "timestamp", DEFAULT_TIMESTAMP);
        if readings.total_m3 > 0.0 {
            put(&mut fields, "total_m3", readings.total_m3);
        }
        if let Some(dt) = readings.meter_datetime {
            put(&mut fields, "meter_datetime", dt.format(DATE_TIME_FORMAT).to_string());
        }

        match &mfct {
            ManufacturerBlock::Legacy(legacy) => {
                put(&mut fields, "contents", legacy.contents);
                if legacy.voltage > 0.0 {
                    put(&mut fields, "voltage_v", legacy.voltage);
                }
                if legacy.backflow_m3 > 0.0 {
                    put(&mut fields, "backflow_m3", legacy.backflow_m3);
                }
                if let Some(date) = &legacy.leak_date {
                    put(&mut fields, "leak_date", date.clone());
                }
                for (month, value) in MONTHS.iter().zip(legacy.monthly_totals) {
                    if value != 0.0 {
                        put(&mut fields, &format!("{month}_total_m3"), value);
                    }
                }
            }
            ManufacturerBlock::Extended(ext) => {
                put(&mut fields, "battery_percent_raw", ext.battery_raw as f64);
                put(&mut fields, "battery_percent_pct", ext.battery_pct as f64);
                put(&mut fields, "error_bits_hex", format!("0x{:06X}", ext.error_bits));
                put(&mut fields, "msb_flags_hex", format!("0x{:02X}", ext.flags));
                if let Some(m3) = ext.reverse_flow_m3() {
                    put(&mut fields, "reverse_flow_m3", m3);
                }
                if let Some(date) = ext.empty_pipe_date() {
                    put(&mut fields, "empty_pipe_date", date);
                }
                if let Some(date) = ext.leak_event_date() {
                    put(&mut fields, "leak_event_date", date);
                }
                if let Some(date) = ext.freeze_event_date() {
                    put(&mut fields, "freeze_event_date", date);
                }
            }
        }

        put_status_flags(&mut fields, telegram.status_flags);
        if telegram.status_flags.contains(StatusFlags::PERM_ALARM) {
            put(&mut fields, "alarm_tamper", true);
        }

        log::debug!(
            "hydrodigit {}: {} layout, {} fields",
            telegram.meter_id_string(),
            mfct.variant_name(),
            fields.len()
        );
        Ok(fields)
    }

    fn partial_fields(&self, telegram: &Telegram) -> Option<FieldMap> {
        let mut fields = self.base_fields(telegram);
        put_status_flags(&mut fields, telegram.status_flags);
        Some(fields)
    }
}
