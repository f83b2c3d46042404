//! # wM-Bus Telegram Header Parsing
//!
//! This module parses an already link-layer-decoded wireless M-Bus application
//! frame into a [`Telegram`]: the fixed header (L, C, M, A, V, T, CI), the
//! access/status bytes, an optional short transport header (TPL) and the
//! remaining payload. It leverages the `nom` crate for the fixed-width fields.
//!
//! ## Layout
//!
//! ```text
//! offset  0   1   2..4   4..8   8   9   10   11    12    13..
//!         L   C   M(LE)  A      V   T   CI   ACC   STS   payload
//! ```
//!
//! When CI is the extended link layer marker (`0x7A`) the four bytes after CI
//! form a short TPL (ACC, STS, CFG LE) unless they start with the `0x2F 0x2F`
//! "no data" filler.

use crate::constants::*;
use crate::vendors::manufacturer_id_to_string;
use bitflags::bitflags;
use nom::{
    bytes::complete::take,
    number::complete::{be_u8, le_u16},
    IResult,
};
use thiserror::Error;

/// Errors raised while parsing the telegram header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("telegram too short: {0} bytes")]
    TooShort(usize),

    #[error("declared length {declared} does not match actual length {actual}")]
    LengthMismatch { declared: u8, actual: usize },

    #[error("payload offset {offset} exceeds telegram length {length}")]
    PayloadOffset { offset: usize, length: usize },

    #[error("malformed header: {0}")]
    Header(String),
}

bitflags! {
    /// Meter status flags carried in the status byte of the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u8 {
        const EMPTY_PIPE = 0x80;
        const REVERSE_FLOW = 0x40;
        const FREEZING = 0x20;
        const TEMP_ALARM = 0x10;
        const PERM_ALARM = 0x08;
        const BATTERY_ALARM = 0x04;
        const HW_ALARM = 0x02;
    }
}

const STATUS_FLAG_FIELDS: [(StatusFlags, &str); 7] = [
    (StatusFlags::EMPTY_PIPE, "status_empty_pipe"),
    (StatusFlags::REVERSE_FLOW, "status_reverse_flow"),
    (StatusFlags::FREEZING, "status_freezing"),
    (StatusFlags::TEMP_ALARM, "status_temp_alarm"),
    (StatusFlags::PERM_ALARM, "status_perm_alarm"),
    (StatusFlags::BATTERY_ALARM, "status_battery_alarm"),
    (StatusFlags::HW_ALARM, "status_hw_alarm"),
];

impl StatusFlags {
    /// Decode the status byte. Bit 0 carries no flag and is dropped.
    pub fn from_status(status: u8) -> Self {
        Self::from_bits_truncate(status)
    }

    /// Field names of the flags that are set, in bit order (MSB first).
    pub fn field_names(self) -> impl Iterator<Item = &'static str> {
        STATUS_FLAG_FIELDS
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }
}

/// Short transport layer header found behind the extended link layer CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TplInfo {
    pub access_field: u8,
    pub status_field: u8,
    /// Configuration word (little-endian on the wire)
    pub config: u16,
    /// Security mode, bits 8-12 of the configuration word
    pub security_mode: u8,
    /// Number of encrypted 16-byte blocks, only set for security mode 5
    pub encrypted_blocks: u8,
}

impl TplInfo {
    fn from_config(access_field: u8, status_field: u8, config: u16) -> Self {
        let security_mode = ((config >> 8) & 0x1F) as u8;
        let encrypted_blocks = if security_mode == WMBUS_SECURITY_MODE_AES_CBC_IV {
            ((config >> 4) & 0x0F) as u8
        } else {
            0
        };
        Self {
            access_field,
            status_field,
            config,
            security_mode,
            encrypted_blocks,
        }
    }
}

/// A decoded wM-Bus application frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    pub raw: Vec<u8>,
    pub length: u8,
    pub control: u8,
    pub manufacturer: u16,
    /// Meter id as stored on the wire (least significant byte first)
    pub meter_id: [u8; 4],
    pub version: u8,
    pub device_type: u8,
    pub ci: u8,
    pub access_number: u8,
    pub status: u8,
    pub status_flags: StatusFlags,
    pub tpl: Option<TplInfo>,
    /// Offset of the payload within `raw`
    pub payload_offset: usize,
    /// Application payload; replaced by the plaintext after decryption
    pub payload: Vec<u8>,
}

impl Telegram {
    /// EN 13757 display form of the meter id (MSB first).
    pub fn meter_id_string(&self) -> String {
        format!(
            "{:02X}{:02X}{:02X}{:02X}",
            self.meter_id[3], self.meter_id[2], self.meter_id[1], self.meter_id[0]
        )
    }

    /// Three-letter FLAG manufacturer code, e.g. `BMT` for `0x09B4`.
    pub fn manufacturer_code(&self) -> String {
        manufacturer_id_to_string(self.manufacturer)
    }

    /// Registry lookup key: (manufacturer, CI, device type).
    pub fn detection(&self) -> (u16, u8, u8) {
        (self.manufacturer, self.ci, self.device_type)
    }

    pub fn has_tpl(&self) -> bool {
        self.tpl.is_some()
    }
}

struct Header {
    length: u8,
    control: u8,
    manufacturer: u16,
    meter_id: [u8; 4],
    version: u8,
    device_type: u8,
    ci: u8,
    access_number: u8,
    status: u8,
}

fn parse_header(input: &[u8]) -> IResult<&[u8], Header> {
    let (i, length) = be_u8(input)?;
    let (i, control) = be_u8(i)?;
    let (i, manufacturer) = le_u16(i)?;
    let (i, id) = take(4usize)(i)?;
    let (i, version) = be_u8(i)?;
    let (i, device_type) = be_u8(i)?;
    let (i, ci) = be_u8(i)?;
    let (i, access_number) = be_u8(i)?;
    let (i, status) = be_u8(i)?;

    let mut meter_id = [0u8; 4];
    meter_id.copy_from_slice(id);

    Ok((
        i,
        Header {
            length,
            control,
            manufacturer,
            meter_id,
            version,
            device_type,
            ci,
            access_number,
            status,
        },
    ))
}

fn parse_short_tpl(input: &[u8]) -> IResult<&[u8], TplInfo> {
    let (i, access_field) = be_u8(input)?;
    let (i, status_field) = be_u8(i)?;
    let (i, config) = le_u16(i)?;
    Ok((i, TplInfo::from_config(access_field, status_field, config)))
}

/// A short TPL follows the CI unless the bytes are missing or start with the
/// `0x2F 0x2F` filler.
fn short_tpl_present(raw: &[u8], offset: usize) -> bool {
    match raw.get(offset..offset + WMBUS_SHORT_TPL_LENGTH) {
        Some(tpl) => !(tpl[0] == MBUS_DIB_DIF_IDLE_FILLER && tpl[1] == MBUS_DIB_DIF_IDLE_FILLER),
        None => false,
    }
}

/// Parses a raw, link-layer-decoded telegram.
pub fn parse_frame(raw: &[u8]) -> Result<Telegram, FrameError> {
    if raw.len() < WMBUS_HEADER_LENGTH {
        return Err(FrameError::TooShort(raw.len()));
    }
    let declared = raw[0];
    if declared as usize + 1 != raw.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: raw.len(),
        });
    }

    let (_, header) = parse_header(raw).map_err(|e| FrameError::Header(e.to_string()))?;

    let mut access_number = header.access_number;
    let mut status = header.status;
    let mut tpl = None;
    let mut cursor = WMBUS_HEADER_LENGTH;

    if header.ci == WMBUS_CI_EXTENDED_LINK_LAYER {
        let tpl_offset = WMBUS_CI_OFFSET + 1;
        if short_tpl_present(raw, tpl_offset) {
            let (_, info) = parse_short_tpl(&raw[tpl_offset..])
                .map_err(|e| FrameError::Header(e.to_string()))?;
            log::debug!(
                "short TPL: acc=0x{:02X} cfg=0x{:04X} mode={} blocks={}",
                info.access_field,
                info.config,
                info.security_mode,
                info.encrypted_blocks
            );
            tpl = Some(info);
            cursor = tpl_offset + WMBUS_SHORT_TPL_LENGTH;
        } else {
            access_number = 0;
            status = 0;
            cursor = tpl_offset;
        }
    }

    if cursor > raw.len() {
        return Err(FrameError::PayloadOffset {
            offset: cursor,
            length: raw.len(),
        });
    }

    Ok(Telegram {
        raw: raw.to_vec(),
        length: header.length,
        control: header.control,
        manufacturer: header.manufacturer,
        meter_id: header.meter_id,
        version: header.version,
        device_type: header.device_type,
        ci: header.ci,
        access_number,
        status,
        status_flags: StatusFlags::from_status(status),
        tpl,
        payload_offset: cursor,
        payload: raw[cursor..].to_vec(),
    })
}
