//! The payload module contains the components responsible for decoding the
//! application payload of a wM-Bus telegram: data records, value encodings
//! and VIF scale tables.

pub mod data_encoding;
pub mod record;
pub mod vif_maps;

pub use data_encoding::{
    decode_bcd_date, decode_bcd_le, decode_le_uint, decode_type_f_datetime, ValueError,
};
pub use record::{dif_data_length, parse_records, parse_records_with_tail, Record, RecordError};
pub use vif_maps::{lookup_vif_scale, scale_value, volume_scale, VifUnit};
