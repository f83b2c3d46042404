//! Data record parsing for the application payload.
//!
//! A payload is a sequence of data information blocks (DIF + DIFE chain),
//! one VIF and the record data, optionally followed by a manufacturer
//! specific block introduced by DIF `0x0F`.

use crate::constants::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("unsupported VIF 0x{vif:02X} at offset {offset}")]
    UnsupportedVif { vif: u8, offset: usize },

    #[error("variable length data field (DIF 0x{dif:02X}) at offset {offset}")]
    VariableLength { dif: u8, offset: usize },

    #[error("record truncated at offset {offset}: {what}")]
    Truncated { offset: usize, what: &'static str },
}

/// One decoded data record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub dif: u8,
    pub dife: Vec<u8>,
    pub vif: u8,
    pub data: Vec<u8>,
    pub storage: u32,
    pub tariff: u32,
    pub subunit: u32,
}

impl Record {
    /// Low nibble of the DIF: data field coding.
    pub fn data_field(&self) -> u8 {
        self.dif & MBUS_DATA_RECORD_DIF_MASK_DATA
    }

    /// True for the BCD codings (nibbles 9 to E).
    pub fn is_bcd(&self) -> bool {
        matches!(self.data_field(), 0x9..=0xE)
    }
}

/// Looks up the data length from the low nibble of a DIF.
/// Returns `None` for variable length data (nibble 8).
pub fn dif_data_length(dif: u8) -> Option<usize> {
    match dif & MBUS_DATA_RECORD_DIF_MASK_DATA {
        0x0 => Some(0),
        0x1 => Some(1),
        0x2 => Some(2),
        0x3 => Some(3),
        0x4 => Some(4),
        0x5 => Some(4),
        0x6 => Some(6),
        0x7 => Some(8),
        0x8 => None,
        0x9 => Some(1),
        0xA => Some(2),
        0xB => Some(3),
        0xC => Some(4),
        0xD => Some(5),
        0xE => Some(6),
        _ => Some(0),
    }
}

fn is_unsupported_vif(vif: u8) -> bool {
    MBUS_DIB_VIF_EXTENSION_TABLES.contains(&vif) || vif & MBUS_DIB_VIF_EXTENSION_BIT != 0
}

fn shifted(bits: u8, shift: usize) -> u32 {
    (bits as u32).checked_shl(shift as u32).unwrap_or(0)
}

/// Parses the records of `payload`. Parsing stops successfully at the
/// manufacturer specific marker or at the end of the buffer.
pub fn parse_records(payload: &[u8]) -> Result<Vec<Record>, RecordError> {
    parse_records_with_tail(payload).map(|(records, _)| records)
}

/// Like [`parse_records`], also returning the manufacturer specific block
/// (starting at the `0x0F` marker) when one is present.
pub fn parse_records_with_tail(payload: &[u8]) -> Result<(Vec<Record>, Option<&[u8]>), RecordError> {
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < payload.len() {
        let dif = payload[pos];
        if dif == MBUS_DIB_DIF_IDLE_FILLER || dif == 0x00 {
            pos += 1;
            continue;
        }
        if dif == MBUS_DIB_DIF_MANUFACTURER_SPECIFIC {
            log::debug!("manufacturer block at offset {} ({} bytes)", pos, payload.len() - pos);
            return Ok((records, Some(&payload[pos..])));
        }

        let start = pos;
        pos += 1;

        let mut record = Record {
            dif,
            storage: ((dif & MBUS_DATA_RECORD_DIF_MASK_STORAGE_NO) >> 6) as u32,
            ..Record::default()
        };

        let mut ext = dif;
        while ext & MBUS_DIB_DIF_EXTENSION_BIT != 0 {
            let dife = *payload.get(pos).ok_or(RecordError::Truncated {
                offset: pos,
                what: "DIFE",
            })?;
            let n = record.dife.len();
            record.subunit |= shifted((dife & MBUS_DATA_RECORD_DIFE_MASK_DEVICE) >> 6, n);
            record.tariff |= shifted((dife & MBUS_DATA_RECORD_DIFE_MASK_TARIFF) >> 4, 2 * n);
            record.storage |= shifted(dife & MBUS_DATA_RECORD_DIFE_MASK_STORAGE_NO, 1 + 4 * n);
            record.dife.push(dife);
            ext = dife;
            pos += 1;
        }

        let vif = *payload.get(pos).ok_or(RecordError::Truncated {
            offset: pos,
            what: "VIF",
        })?;
        if is_unsupported_vif(vif) {
            return Err(RecordError::UnsupportedVif { vif, offset: pos });
        }
        record.vif = vif;
        pos += 1;

        let len = dif_data_length(dif).ok_or(RecordError::VariableLength { dif, offset: start })?;
        let data = payload.get(pos..pos + len).ok_or(RecordError::Truncated {
            offset: pos,
            what: "data",
        })?;
        record.data = data.to_vec();
        pos += len;

        records.push(record);
    }

    Ok((records, None))
}
