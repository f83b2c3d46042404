//! # BMT Hydrodigit Manufacturer Block
//!
//! The block after DIF `0x0F` comes in two layouts and carries no explicit
//! tag, so the layout is picked by content through [`VARIANTS`], tried in
//! order:
//!
//! | Variant  | Predicate                                   |
//! |----------|---------------------------------------------|
//! | legacy   | at least 42 bytes, first byte `0x15`/`0x95` |
//! | extended | at least 5 bytes                            |
//!
//! ## Legacy layout
//!
//! ```text
//! frame id | voltage | [leak date YY MM DD, 0x95 only] | backflow u32 LE | 12 x month u24 LE
//! ```
//!
//! ## Extended layout
//!
//! ```text
//! battery % | error bits u24 BE | flags | optional sections...
//! ```
//!
//! Each set bit of the flags byte adds one section, decoded in bit order
//! through [`SECTION_DECODERS`].

use crate::constants::MBUS_DIB_DIF_MANUFACTURER_SPECIFIC;
use crate::payload::data_encoding::{decode_bcd_date, decode_le_uint};
use crate::util::hex::encode_hex_upper;
use thiserror::Error;

const MIN_LEGACY_BYTES: usize = 1 + 1 + 4 + 12 * 3;
const MIN_EXTENDED_BYTES: usize = 1 + 3 + 1;

const FRAME_ID_LEGACY: u8 = 0x15;
const FRAME_ID_LEGACY_LEAK_DATE: u8 = 0x95;

/// Decoded monthly values at or above this are "no data" sentinels.
const MONTHLY_SENTINEL: f64 = 100_000.0;

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManufacturerError {
    #[error("empty manufacturer payload")]
    Empty,

    #[error("manufacturer payload missing content")]
    MissingContent,

    #[error("{0} truncated")]
    Truncated(&'static str),

    #[error("unsupported manufacturer block: {0}")]
    Unsupported(String),
}

/// Legacy block, frame identifier `0x15` or `0x95`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyBlock {
    pub frame_id: u8,
    pub contents: &'static str,
    pub voltage: f64,
    /// `DD.MM.20YY`, only for frame identifier `0x95`
    pub leak_date: Option<String>,
    pub backflow_m3: f64,
    /// January to December
    pub monthly_totals: [f64; 12],
}

/// Optional section of the extended block, one per flag bit.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Instantaneous([u8; 7]),
    ReverseFlow(f64),
    EmptyPipeDate(String),
    LeakDate(String),
    FreezeDate(String),
    MemoDay1([u8; 5]),
    MemoDay2([u8; 5]),
    MonthlyHistory([f64; 12]),
}

/// Extended (Hydrolink) block.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedBlock {
    pub battery_raw: u8,
    /// Battery percentage clamped to 100
    pub battery_pct: u8,
    pub error_bits: u32,
    pub flags: u8,
    pub sections: Vec<Section>,
}

impl ExtendedBlock {
    pub fn reverse_flow_m3(&self) -> Option<f64> {
        self.sections.iter().find_map(|s| match s {
            Section::ReverseFlow(v) => Some(*v),
            _ => None,
        })
    }

    pub fn empty_pipe_date(&self) -> Option<&str> {
        self.sections.iter().find_map(|s| match s {
            Section::EmptyPipeDate(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn leak_event_date(&self) -> Option<&str> {
        self.sections.iter().find_map(|s| match s {
            Section::LeakDate(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn freeze_event_date(&self) -> Option<&str> {
        self.sections.iter().find_map(|s| match s {
            Section::FreezeDate(d) => Some(d.as_str()),
            _ => None,
        })
    }

    pub fn monthly_history(&self) -> Option<&[f64; 12]> {
        self.sections.iter().find_map(|s| match s {
            Section::MonthlyHistory(v) => Some(v),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManufacturerBlock {
    Legacy(LegacyBlock),
    Extended(ExtendedBlock),
}

impl ManufacturerBlock {
    pub fn variant_name(&self) -> &'static str {
        match self {
            ManufacturerBlock::Legacy(_) => "legacy",
            ManufacturerBlock::Extended(_) => "extended",
        }
    }
}

/// A block layout: selection predicate plus decoder.
pub struct Variant {
    pub name: &'static str,
    pub matches: fn(&[u8]) -> bool,
    pub decode: fn(&[u8], f64) -> Result<ManufacturerBlock, ManufacturerError>,
}

/// Layouts in priority order; the first matching predicate wins.
pub const VARIANTS: [Variant; 2] = [
    Variant {
        name: "legacy",
        matches: is_legacy,
        decode: decode_legacy,
    },
    Variant {
        name: "extended",
        matches: is_extended,
        decode: decode_extended,
    },
];

fn is_legacy(block: &[u8]) -> bool {
    block.len() >= MIN_LEGACY_BYTES
        && (block[0] == FRAME_ID_LEGACY || block[0] == FRAME_ID_LEGACY_LEAK_DATE)
}

fn is_extended(block: &[u8]) -> bool {
    block.len() >= MIN_EXTENDED_BYTES
}

/// Decodes a manufacturer block. `raw` may start at the `0x0F` marker or
/// right after it; `volume_scale` is the scale of the primary volume record.
pub fn parse_manufacturer_block(
    raw: &[u8],
    volume_scale: f64,
) -> Result<ManufacturerBlock, ManufacturerError> {
    let block = match raw.split_first() {
        None => return Err(ManufacturerError::Empty),
        Some((&MBUS_DIB_DIF_MANUFACTURER_SPECIFIC, [])) => {
            return Err(ManufacturerError::MissingContent)
        }
        Some((&MBUS_DIB_DIF_MANUFACTURER_SPECIFIC, rest)) => rest,
        Some(_) => raw,
    };

    let variant = VARIANTS
        .iter()
        .find(|v| (v.matches)(block))
        .ok_or_else(|| ManufacturerError::Unsupported(encode_hex_upper(block)))?;
    log::debug!("manufacturer block: {} layout, {} bytes", variant.name, block.len());
    (variant.decode)(block, volume_scale)
}

fn monthly_scale(volume_scale: f64) -> f64 {
    if volume_scale <= 0.0 {
        0.01
    } else {
        volume_scale * 10.0
    }
}

fn decode_monthly(bytes: &[u8], scale: f64) -> f64 {
    let value = decode_le_uint(bytes) as f64 * scale;
    if value >= MONTHLY_SENTINEL {
        0.0
    } else {
        value
    }
}

fn decode_months(
    block: &[u8],
    offset: usize,
    scale: f64,
    what: &'static str,
) -> Result<[f64; 12], ManufacturerError> {
    let bytes = block
        .get(offset..offset + 36)
        .ok_or(ManufacturerError::Truncated(what))?;
    let mut months = [0.0; 12];
    for (month, chunk) in months.iter_mut().zip(bytes.chunks_exact(3)) {
        *month = decode_monthly(chunk, scale);
    }
    Ok(months)
}

fn legacy_contents(frame_id: u8) -> &'static str {
    match frame_id {
        FRAME_ID_LEGACY => "Backflow, alarms and monthly data",
        FRAME_ID_LEGACY_LEAK_DATE => "Backflow, leak date, alarms and monthly data",
        _ => "unknown, please open issue with this telegram for driver improvement",
    }
}

fn decode_voltage(nibble: u8) -> f64 {
    match nibble {
        0x01 => 1.9,
        0x02 => 2.1,
        0x03 => 2.2,
        0x04 => 2.3,
        0x05 => 2.4,
        0x06 => 2.5,
        0x07 => 2.65,
        0x08 => 2.8,
        0x09 => 2.9,
        0x0A => 3.05,
        0x0B => 3.2,
        0x0C => 3.35,
        0x0D => 3.5,
        _ => 3.7,
    }
}

fn decode_legacy(block: &[u8], volume_scale: f64) -> Result<ManufacturerBlock, ManufacturerError> {
    let frame_id = block[0];
    let voltage = block
        .get(1)
        .map(|b| decode_voltage(b & 0x0F))
        .ok_or(ManufacturerError::Truncated("legacy voltage"))?;
    let mut offset = 2;

    let mut leak_date = None;
    if frame_id == FRAME_ID_LEGACY_LEAK_DATE {
        let date = block
            .get(offset..offset + 3)
            .ok_or(ManufacturerError::Truncated("legacy leak date"))?;
        // stored year, month, day; printed as hex digits
        leak_date = Some(format!("{:02X}.{:02X}.20{:02X}", date[2], date[1], date[0]));
        offset += 3;
    }

    let backflow = block
        .get(offset..offset + 4)
        .ok_or(ManufacturerError::Truncated("legacy backflow"))?;
    let backflow_m3 = decode_le_uint(backflow) as f64 / 1000.0;
    offset += 4;

    let monthly_totals = decode_months(
        block,
        offset,
        monthly_scale(volume_scale),
        "legacy monthly history",
    )?;

    Ok(ManufacturerBlock::Legacy(LegacyBlock {
        frame_id,
        contents: legacy_contents(frame_id),
        voltage,
        leak_date,
        backflow_m3,
        monthly_totals,
    }))
}

/// Decodes one optional section from `rest`, returning the section (if any)
/// and the number of bytes consumed.
pub type SectionDecoder = fn(&[u8], f64) -> Result<(Option<Section>, usize), ManufacturerError>;

/// Section decoders indexed by flag bit.
pub const SECTION_DECODERS: [SectionDecoder; 8] = [
    section_instantaneous,
    section_reverse_flow,
    section_empty_pipe,
    section_leak_date,
    section_freeze_date,
    section_memo_day1,
    section_memo_day2,
    section_monthly_history,
];

fn fixed<const N: usize>(rest: &[u8], what: &'static str) -> Result<[u8; N], ManufacturerError> {
    let mut out = [0u8; N];
    out.copy_from_slice(rest.get(..N).ok_or(ManufacturerError::Truncated(what))?);
    Ok(out)
}

fn section_instantaneous(rest: &[u8], _: f64) -> Result<(Option<Section>, usize), ManufacturerError> {
    let raw = fixed::<7>(rest, "instantaneous block")?;
    Ok((Some(Section::Instantaneous(raw)), 7))
}

fn section_reverse_flow(rest: &[u8], _: f64) -> Result<(Option<Section>, usize), ManufacturerError> {
    let raw = fixed::<3>(rest, "reverse-flow block")?;
    let m3 = decode_le_uint(&raw) as f64 / 1000.0;
    Ok((Some(Section::ReverseFlow(m3)), 3))
}

/// Event dates never fail: a short buffer consumes nothing and bad BCD
/// consumes the three bytes without producing a date.
fn event_date(rest: &[u8], wrap: fn(String) -> Section) -> (Option<Section>, usize) {
    match rest.get(..3) {
        None => (None, 0),
        Some(bytes) => (decode_bcd_date(bytes).ok().map(wrap), 3),
    }
}

fn section_empty_pipe(rest: &[u8], _: f64) -> Result<(Option<Section>, usize), ManufacturerError> {
    Ok(event_date(rest, Section::EmptyPipeDate))
}

fn section_leak_date(rest: &[u8], _: f64) -> Result<(Option<Section>, usize), ManufacturerError> {
    Ok(event_date(rest, Section::LeakDate))
}

fn section_freeze_date(rest: &[u8], _: f64) -> Result<(Option<Section>, usize), ManufacturerError> {
    Ok(event_date(rest, Section::FreezeDate))
}

fn section_memo_day1(rest: &[u8], _: f64) -> Result<(Option<Section>, usize), ManufacturerError> {
    Ok((Some(Section::MemoDay1(fixed::<5>(rest, "memo day 1")?)), 5))
}

fn section_memo_day2(rest: &[u8], _: f64) -> Result<(Option<Section>, usize), ManufacturerError> {
    Ok((Some(Section::MemoDay2(fixed::<5>(rest, "memo day 2")?)), 5))
}

fn section_monthly_history(
    rest: &[u8],
    volume_scale: f64,
) -> Result<(Option<Section>, usize), ManufacturerError> {
    let months = decode_months(rest, 0, monthly_scale(volume_scale), "monthly history")?;
    Ok((Some(Section::MonthlyHistory(months)), 36))
}

fn decode_extended(
    block: &[u8],
    volume_scale: f64,
) -> Result<ManufacturerBlock, ManufacturerError> {
    if block.len() < MIN_EXTENDED_BYTES {
        return Err(ManufacturerError::Truncated("extended block"));
    }
    let battery_raw = block[0];
    let error_bits = (block[1] as u32) << 16 | (block[2] as u32) << 8 | block[3] as u32;
    let flags = block[4];
    let mut offset = MIN_EXTENDED_BYTES;

    let mut sections = Vec::new();
    for (bit, decoder) in SECTION_DECODERS.iter().enumerate() {
        if flags & (1 << bit) == 0 {
            continue;
        }
        let (section, consumed) = decoder(&block[offset..], volume_scale)?;
        if let Some(section) = section {
            sections.push(section);
        }
        offset += consumed;
    }

    Ok(ManufacturerBlock::Extended(ExtendedBlock {
        battery_raw,
        battery_pct: battery_raw.min(100),
        error_bits,
        flags,
        sections,
    }))
}
