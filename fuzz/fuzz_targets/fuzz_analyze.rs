#![no_main]

use libfuzzer_sys::fuzz_target;
use wmbus_rs::{AesKey, AnalyzeOptions, Analyzer};

fuzz_target!(|data: &[u8]| {
    if data.len() < 13 || data.len() > 256 {
        return;
    }
    let mut raw = data.to_vec();
    raw[0] = (raw.len() - 1) as u8;

    let analyzer = Analyzer::default();
    let _ = analyzer.analyze(&raw, &AnalyzeOptions::default());

    if let Ok(key) = AesKey::from_bytes(&[0x5A; 16]) {
        let _ = analyzer.analyze(&raw, &AnalyzeOptions::with_key(key));
    }
});
