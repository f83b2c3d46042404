//! wM-Bus Protocol Constants
//!
//! This module defines constants used by the telegram decoder,
//! based on the EN 13757-3/-4 standards and the OMS security profile.

/// DIF (Data Information Field) mask for data length
pub const MBUS_DATA_RECORD_DIF_MASK_DATA: u8 = 0x0F;

/// DIF mask for storage number
pub const MBUS_DATA_RECORD_DIF_MASK_STORAGE_NO: u8 = 0x40;

/// DIFE (Data Information Field Extension) mask for storage number
pub const MBUS_DATA_RECORD_DIFE_MASK_STORAGE_NO: u8 = 0x0F;

/// DIFE mask for tariff
pub const MBUS_DATA_RECORD_DIFE_MASK_TARIFF: u8 = 0x30;

/// DIFE mask for device (subunit)
pub const MBUS_DATA_RECORD_DIFE_MASK_DEVICE: u8 = 0x40;

/// DIF idle filler, also the "no data" marker at the start of a payload
pub const MBUS_DIB_DIF_IDLE_FILLER: u8 = 0x2F;

/// DIF manufacturer specific
pub const MBUS_DIB_DIF_MANUFACTURER_SPECIFIC: u8 = 0x0F;

/// DIF extension bit
pub const MBUS_DIB_DIF_EXTENSION_BIT: u8 = 0x80;

/// VIF extension bit
pub const MBUS_DIB_VIF_EXTENSION_BIT: u8 = 0x80;

/// VIF codes that introduce a multi-byte extension table
pub const MBUS_DIB_VIF_EXTENSION_TABLES: [u8; 4] = [0xFB, 0xFD, 0xEF, 0xFF];

/// VIF for a Type F date and time point
pub const MBUS_VIF_DATE_TIME: u8 = 0x6D;

// ----------------------------------------------------------------------------
// Link layer / transport layer constants
// ----------------------------------------------------------------------------

/// Size of the fixed link-layer header (L, C, M, A, V, T, CI, ACC, STS)
pub const WMBUS_HEADER_LENGTH: usize = 13;

/// Offset of the CI field in the raw telegram
pub const WMBUS_CI_OFFSET: usize = 10;

/// Extended link layer marker carrying a short transport header
pub const WMBUS_CI_EXTENDED_LINK_LAYER: u8 = 0x7A;

/// Extended link layer with two-byte ELL header (CC, ACC)
pub const WMBUS_CI_ELL_SHORT: u8 = 0x8C;

/// Size of the short transport header (ACC, STS, CFG LSB, CFG MSB)
pub const WMBUS_SHORT_TPL_LENGTH: usize = 4;

/// Security mode 5: AES-128-CBC with IV derived from the telegram header
pub const WMBUS_SECURITY_MODE_AES_CBC_IV: u8 = 5;

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-128 key size in bytes
pub const AES_KEY_SIZE: usize = 16;
