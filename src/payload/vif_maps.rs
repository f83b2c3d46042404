//! VIF Scale Tables
//!
//! Maps primary VIF codes to the divisor that turns a raw BCD reading into
//! the engineering unit reported by the drivers, as defined in EN 13757-3.
//! Energy in MJ and power in MJ/h are converted to kWh and kW.

use crate::payload::data_encoding::ValueError;

/// Unit a scaled VIF value is expressed in before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VifUnit {
    KWh,
    MJ,
    M3,
    M3h,
    MJh,
    KW,
    Celsius,
}

/// Heat meter VIF codes: (vif, divisor, unit).
///
/// The flow entries 0x40 and 0x48 and the MJ/h power entries follow
/// observed meter output rather than EN 13757-3 and are unverified.
pub const HEAT_METER_VIF_SCALES: &[(u8, f64, VifUnit)] = &[
    (0x00, 1_000_000.0, VifUnit::KWh),
    (0x01, 100_000.0, VifUnit::KWh),
    (0x02, 10_000.0, VifUnit::KWh),
    (0x03, 1_000.0, VifUnit::KWh),
    (0x04, 100.0, VifUnit::KWh),
    (0x05, 10.0, VifUnit::KWh),
    (0x06, 1.0, VifUnit::KWh),
    (0x07, 0.1, VifUnit::KWh),
    (0x08, 1_000_000.0, VifUnit::MJ),
    (0x09, 100_000.0, VifUnit::MJ),
    (0x0A, 10_000.0, VifUnit::MJ),
    (0x0B, 1_000.0, VifUnit::MJ),
    (0x10, 1_000_000.0, VifUnit::M3),
    (0x13, 1_000.0, VifUnit::M3),
    (0x14, 100.0, VifUnit::M3),
    (0x15, 10.0, VifUnit::M3),
    (0x16, 1.0, VifUnit::M3),
    (0x17, 0.1, VifUnit::M3),
    (0x28, 1_000_000.0, VifUnit::KW),
    (0x29, 100_000.0, VifUnit::KW),
    (0x2A, 10_000.0, VifUnit::KW),
    (0x2B, 1_000.0, VifUnit::KW),
    (0x2C, 100.0, VifUnit::KW),
    (0x2D, 10.0, VifUnit::KW),
    (0x2E, 1.0, VifUnit::KW),
    (0x2F, 0.1, VifUnit::KW),
    (0x30, 1_000_000.0, VifUnit::MJh),
    (0x31, 100_000.0, VifUnit::MJh),
    (0x32, 10_000.0, VifUnit::MJh),
    (0x3B, 1_000.0, VifUnit::M3h),
    (0x3C, 100.0, VifUnit::M3h),
    (0x3D, 10.0, VifUnit::M3h),
    (0x3E, 1.0, VifUnit::M3h),
    (0x40, 600_000_000.0, VifUnit::M3h),
    (0x48, 3_600_000_000_000.0, VifUnit::M3h),
    (0x59, 100.0, VifUnit::Celsius),
    (0x5D, 100.0, VifUnit::Celsius),
];

/// Looks up the divisor and unit for a heat meter VIF.
pub fn lookup_vif_scale(vif: u8) -> Option<(f64, VifUnit)> {
    HEAT_METER_VIF_SCALES
        .iter()
        .find(|(code, _, _)| *code == vif)
        .map(|(_, divisor, unit)| (*divisor, *unit))
}

/// Scales a raw reading and converts MJ to kWh and MJ/h to kW.
pub fn scale_value(vif: u8, raw: u64) -> Result<f64, ValueError> {
    let (divisor, unit) = lookup_vif_scale(vif).ok_or(ValueError::UnsupportedVif(vif))?;
    let value = raw as f64 / divisor;
    Ok(match unit {
        VifUnit::MJ => value / 3.6,
        VifUnit::MJh => value * (1000.0 / 3.6),
        VifUnit::KWh | VifUnit::M3 | VifUnit::M3h | VifUnit::KW | VifUnit::Celsius => value,
    })
}

/// Multiplier for volume VIFs 0x10..=0x17 (extension bit ignored),
/// from 10^-6 m^3 up to 10 m^3 per digit.
pub fn volume_scale(vif: u8) -> Option<f64> {
    match vif & 0x7F {
        0x10 => Some(1e-6),
        0x11 => Some(1e-5),
        0x12 => Some(1e-4),
        0x13 => Some(1e-3),
        0x14 => Some(1e-2),
        0x15 => Some(1e-1),
        0x16 => Some(1.0),
        0x17 => Some(10.0),
        _ => None,
    }
}
