#![no_main]

use libfuzzer_sys::fuzz_target;
use wmbus_rs::payload::{decode_bcd_le, decode_type_f_datetime, parse_records_with_tail};
use wmbus_rs::vendors::hydrocalm4::aggregate;
use wmbus_rs::vendors::hydrodigit::parse_standard_readings;

fuzz_target!(|data: &[u8]| {
    if let Ok((records, _tail)) = parse_records_with_tail(data) {
        for record in &records {
            let _ = decode_bcd_le(&record.data);
            let _ = decode_type_f_datetime(&record.data);
        }
        let _ = aggregate(&records);
    }

    let _ = parse_standard_readings(data);
});
