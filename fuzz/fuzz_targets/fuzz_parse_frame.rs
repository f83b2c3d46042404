#![no_main]

use libfuzzer_sys::fuzz_target;
use wmbus_rs::parse_frame;

fuzz_target!(|data: &[u8]| {
    let _ = parse_frame(data);

    // Force a consistent L field so the header and TPL paths are reached
    if data.len() >= 13 && data.len() <= 256 {
        let mut fixed = data.to_vec();
        fixed[0] = (data.len() - 1) as u8;
        if let Ok(telegram) = parse_frame(&fixed) {
            assert_eq!(telegram.payload_offset + telegram.payload.len(), fixed.len());
            let _ = telegram.meter_id_string();
            let _ = telegram.manufacturer_code();
        }
    }
});
