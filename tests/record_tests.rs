//! Data record parsing tests.

use wmbus_rs::payload::data_encoding::decode_bcd_le;
use wmbus_rs::payload::{parse_records, parse_records_with_tail, ValueError};
use wmbus_rs::RecordError;

#[test]
fn test_heat_meter_records() {
    let payload = [
        0x04, 0x6D, 0x27, 0x28, 0x7E, 0x2A, // date/time
        0x0C, 0x06, 0x45, 0x23, 0x01, 0x00, // energy kWh
        0x8C, 0x10, 0x06, 0x00, 0x01, 0x00, 0x00, // energy kWh, tariff 1
        0x0C, 0x14, 0x78, 0x56, 0x34, 0x00, // volume
        0x8C, 0x40, 0x14, 0x00, 0x02, 0x00, 0x00, // volume, subunit 1
    ];
    let records = parse_records(&payload).unwrap();
    assert_eq!(records.len(), 5);

    assert_eq!(records[1].tariff, 0);
    assert_eq!(records[2].dife, vec![0x10]);
    assert_eq!(records[2].tariff, 1);
    assert_eq!(records[2].subunit, 0);
    assert_eq!(records[4].subunit, 1);
    assert_eq!(records[4].tariff, 0);
    assert!(records[3].is_bcd());
    assert!(!records[0].is_bcd());
}

#[test]
fn test_dife_chain_interleaves_bits() {
    // two DIFEs: tariff bits 1 then 1, subunit bit 0 then 1, storage 1 then 2
    let payload = [0x84, 0x91, 0x52, 0x13, 0x01, 0x00, 0x00, 0x00];
    let records = parse_records(&payload).unwrap();
    let record = &records[0];
    assert_eq!(record.dife, vec![0x91, 0x52]);
    assert_eq!(record.tariff, 0b0101);
    assert_eq!(record.subunit, 0b10);
    assert_eq!(record.storage, 1 << 1 | 2 << 5);
}

#[test]
fn test_manufacturer_tail() {
    let payload = [0x2F, 0x2F, 0x02, 0x13, 0x01, 0x00, 0x0F, 0xAA, 0xBB];
    let (records, tail) = parse_records_with_tail(&payload).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(tail, Some(&payload[6..]));
}

#[test]
fn test_zero_length_record_kept() {
    let records = parse_records(&[0x10, 0x13, 0x02, 0x13, 0x05, 0x00]).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].data.is_empty());
    assert_eq!(records[0].storage, 0);
}

#[test]
fn test_record_errors() {
    assert_eq!(
        parse_records(&[0x08, 0x13, 0x01]),
        Err(RecordError::VariableLength {
            dif: 0x08,
            offset: 0
        })
    );
    assert!(matches!(
        parse_records(&[0x04, 0xFD, 0x17, 0x00]),
        Err(RecordError::UnsupportedVif { vif: 0xFD, offset: 1 })
    ));
    assert!(matches!(
        parse_records(&[0x84]),
        Err(RecordError::Truncated { what: "DIFE", .. })
    ));
    assert!(matches!(
        parse_records(&[0x04, 0x13, 0x01]),
        Err(RecordError::Truncated { what: "data", .. })
    ));
}

#[test]
fn test_bcd_digit_validation() {
    assert_eq!(decode_bcd_le(&[0x66, 0x38, 0x00, 0x00]), Ok(3866));
    assert_eq!(decode_bcd_le(&[0x1F]), Err(ValueError::InvalidBcd(0x1F)));
}

mod prop_tests {
    use proptest::prelude::*;
    use wmbus_rs::payload::data_encoding::decode_bcd_le;
    use wmbus_rs::payload::parse_records;

    fn to_bcd_le(mut value: u64, len: usize) -> Vec<u8> {
        (0..len)
            .map(|_| {
                let lo = (value % 10) as u8;
                value /= 10;
                let hi = (value % 10) as u8;
                value /= 10;
                hi << 4 | lo
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_bcd_decodes_digits(value in 0u64..100_000_000) {
            prop_assert_eq!(decode_bcd_le(&to_bcd_le(value, 4)), Ok(value));
        }

        #[test]
        fn prop_bcd_rejects_high_nibble(digit in 0x0Au8..=0x0F, low in 0u8..=9) {
            prop_assert!(decode_bcd_le(&[digit << 4 | low]).is_err());
        }

        #[test]
        fn prop_parse_never_panics(payload in proptest::collection::vec(any::<u8>(), 0..128)) {
            let _ = parse_records(&payload);
        }
    }
}
