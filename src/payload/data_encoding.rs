//! Value decoding helpers for data record contents: BCD, little-endian
//! binary integers and the packed Type F date/time.

use chrono::{Days, NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("invalid BCD digit in byte 0x{0:02X}")]
    InvalidBcd(u8),

    #[error("unsupported VIF 0x{0:02X}")]
    UnsupportedVif(u8),

    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),
}

/// Decodes a little-endian BCD value: the first byte holds the two least
/// significant digits, low nibble first.
pub fn decode_bcd_le(input: &[u8]) -> Result<u64, ValueError> {
    let mut value = 0u64;
    for &byte in input.iter().rev() {
        let hi = byte >> 4;
        let lo = byte & 0x0F;
        if hi > 9 || lo > 9 {
            return Err(ValueError::InvalidBcd(byte));
        }
        value = value * 100 + (hi as u64) * 10 + lo as u64;
    }
    Ok(value)
}

/// Decodes an unsigned little-endian integer of up to 8 bytes.
pub fn decode_le_uint(input: &[u8]) -> u64 {
    input
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Decodes a Type F (4 byte) date/time point.
///
/// ```text
/// b0: minute (bits 0-5)
/// b1: hour (bits 0-4)
/// b2: day (bits 0-4), year low bits (5-7)
/// b3: month (bits 0-3), year high bits (4-7)
/// ```
pub fn decode_type_f_datetime(input: &[u8]) -> Result<NaiveDateTime, ValueError> {
    if input.len() < 4 {
        return Err(ValueError::InvalidDateTime(format!(
            "need 4 bytes, got {}",
            input.len()
        )));
    }
    let minute = (input[0] & 0x3F) as u32;
    let hour = (input[1] & 0x1F) as u32;
    let day = (input[2] & 0x1F) as u32;
    let month = (input[3] & 0x0F) as u32;
    let year = 2000 + ((((input[3] >> 4) as i32) << 3) | (input[2] >> 5) as i32);

    if minute > 59 || hour > 23 || !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return Err(ValueError::InvalidDateTime(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}",
            year, month, day, hour, minute
        )));
    }

    // days past the end of the month roll over into the next one (Feb 31 -> Mar 3)
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.checked_add_days(Days::new(u64::from(day - 1))))
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| {
            ValueError::InvalidDateTime(format!("{:04}-{:02}-{:02}", year, month, day))
        })
}

/// Decodes a three byte BCD date stored as year, month, day into `20YY-MM-DD`.
pub fn decode_bcd_date(input: &[u8]) -> Result<String, ValueError> {
    if input.len() < 3 {
        return Err(ValueError::InvalidDateTime(format!(
            "need 3 bytes, got {}",
            input.len()
        )));
    }
    let year = decode_bcd_le(&input[0..1])?;
    let month = decode_bcd_le(&input[1..2])?;
    let day = decode_bcd_le(&input[2..3])?;
    Ok(format!("20{:02}-{:02}-{:02}", year, month, day))
}
