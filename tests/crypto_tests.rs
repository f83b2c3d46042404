//! Mode 5 decryption tests with a telegram encrypted under a known key.

use wmbus_rs::util::hex::hex_to_bytes;
use wmbus_rs::wmbus::crypto::{build_iv, decrypt, encrypted_prefix_len, needs_decryption};
use wmbus_rs::{parse_frame, AesKey, CryptoError};

const PLAIN_HEX: &str = "4E44B4098686868613077AF00040052F2F0C1366380000046D27287E2A0F150E00000000C10000D10000E60000FD00000C01002F0100410100540100680100890000A00000B30000002F2F2F2F2F2F";
const ENCRYPTED_HEX: &str = "4E44B4098686868613077AF0004005CC108AA1945E8D7DD4102C98429B6FC63C74D91CDDBF5B9A23C73A4352A3A6B93755BBB0DA1F67A221D82EF1BCF332677A153D10EF972129067683CFBD0E9A90";
const KEY_HEX: &str = "000102030405060708090A0B0C0D0E0F";

// CI 0x8C, no TPL: one encrypted block, IV access number 0x2B taken from the header
const NO_TPL_ENCRYPTED_HEX: &str = "1C44B4097856341213078C2B001EA626A99C3ED2FCFFB88CF7BBEF2E35";
// same plaintext and key with access number 0x20; ciphertext starts with 0xF3
const NO_TPL_CIPHERTEXT_LOOKS_PLAIN_HEX: &str = "1C44B4097856341213078C2000F338186F7B21C154C8C46BE1B19E448C";

fn key() -> AesKey {
    AesKey::from_hex(KEY_HEX).unwrap()
}

#[test]
fn test_iv_from_header() {
    let telegram = parse_frame(&hex_to_bytes(ENCRYPTED_HEX)).unwrap();
    let iv = build_iv(&telegram);
    assert_eq!(
        iv,
        [0xB4, 0x09, 0x86, 0x86, 0x86, 0x86, 0x13, 0x07, 0xF0, 0xF0, 0xF0, 0xF0, 0xF0, 0xF0, 0xF0, 0xF0]
    );
}

#[test]
fn test_decrypt_matches_plaintext_capture() {
    let plain = parse_frame(&hex_to_bytes(PLAIN_HEX)).unwrap();
    let mut telegram = parse_frame(&hex_to_bytes(ENCRYPTED_HEX)).unwrap();

    assert!(needs_decryption(&telegram));
    assert_eq!(encrypted_prefix_len(&telegram), 64);

    decrypt(&mut telegram, Some(&key())).unwrap();
    assert_eq!(telegram.payload, plain.payload[2..].to_vec());
    assert_eq!(&telegram.payload[..2], &[0x0C, 0x13]);
}

#[test]
fn test_decrypt_is_deterministic() {
    let raw = hex_to_bytes(ENCRYPTED_HEX);
    let mut first = parse_frame(&raw).unwrap();
    let mut second = parse_frame(&raw).unwrap();
    decrypt(&mut first, Some(&key())).unwrap();
    decrypt(&mut second, Some(&key())).unwrap();
    assert_eq!(first.payload, second.payload);
}

#[test]
fn test_plaintext_capture_left_untouched() {
    let mut telegram = parse_frame(&hex_to_bytes(PLAIN_HEX)).unwrap();
    let before = telegram.payload.clone();
    assert!(!needs_decryption(&telegram));
    decrypt(&mut telegram, None).unwrap();
    assert_eq!(telegram.payload, before);
}

#[test]
fn test_missing_and_wrong_key() {
    let raw = hex_to_bytes(ENCRYPTED_HEX);

    let mut telegram = parse_frame(&raw).unwrap();
    assert_eq!(decrypt(&mut telegram, None), Err(CryptoError::KeyRequired));

    let wrong = AesKey::from_bytes(&[0x08; 16]).unwrap();
    let mut telegram = parse_frame(&raw).unwrap();
    assert_eq!(
        decrypt(&mut telegram, Some(&wrong)),
        Err(CryptoError::KeyRejected)
    );
}

#[test]
fn test_no_tpl_decided_by_first_byte() {
    let mut telegram = parse_frame(&hex_to_bytes(NO_TPL_ENCRYPTED_HEX)).unwrap();
    assert!(telegram.tpl.is_none());
    assert_eq!(telegram.payload[0], 0x1E);
    assert!(needs_decryption(&telegram));
    assert_eq!(encrypted_prefix_len(&telegram), 16);
    assert_eq!(&build_iv(&telegram)[8..], &[0x2B; 8]);

    decrypt(&mut telegram, Some(&key())).unwrap();
    assert_eq!(
        telegram.payload,
        vec![0x0C, 0x13, 0x66, 0x38, 0x00, 0x00, 0x04, 0x6D, 0x27, 0x28, 0x7E, 0x2A, 0x2F, 0x2F]
    );
}

#[test]
fn test_no_tpl_ciphertext_passing_plaintext_check_is_kept() {
    let mut telegram = parse_frame(&hex_to_bytes(NO_TPL_CIPHERTEXT_LOOKS_PLAIN_HEX)).unwrap();
    let before = telegram.payload.clone();
    assert!(!needs_decryption(&telegram));
    assert_eq!(decrypt(&mut telegram, Some(&key())), Ok(()));
    assert_eq!(telegram.payload, before);
}

#[test]
fn test_no_tpl_key_required() {
    let mut telegram = parse_frame(&hex_to_bytes(NO_TPL_ENCRYPTED_HEX)).unwrap();
    assert_eq!(decrypt(&mut telegram, None), Err(CryptoError::KeyRequired));
}

#[test]
fn test_tpl_without_mode_5_is_plaintext() {
    // CI 0x7A, TPL config 0x0000, payload without the filler pair
    let mut raw = hex_to_bytes("0044B4097856341213077A2A000000");
    raw.extend_from_slice(&[0x0E; 16]);
    raw[0] = (raw.len() - 1) as u8;

    let mut telegram = parse_frame(&raw).unwrap();
    assert_eq!(telegram.tpl.as_ref().map(|tpl| tpl.security_mode), Some(0));
    assert!(!needs_decryption(&telegram));
    assert_eq!(decrypt(&mut telegram, None), Ok(()));
    assert_eq!(telegram.payload, vec![0x0E; 16]);
}

#[test]
fn test_key_parsing_errors() {
    assert_eq!(
        AesKey::from_hex("0001020304"),
        Err(CryptoError::InvalidKeyLength {
            expected: 16,
            actual: 5
        })
    );
    assert!(matches!(
        AesKey::from_hex("zz0102030405060708090A0B0C0D0E0F"),
        Err(CryptoError::InvalidKeyHex(_))
    ));
    assert_eq!(format!("{:?}", key()), "AesKey(<redacted>)");
}

mod prop_tests {
    use proptest::prelude::*;
    use wmbus_rs::wmbus::crypto::looks_like_plaintext;

    proptest! {
        #[test]
        fn prop_plaintext_heuristic_uses_low_nibble(first in any::<u8>(), rest in proptest::collection::vec(any::<u8>(), 0..16)) {
            let mut data = vec![first];
            data.extend(rest);
            let expected = first == 0x2F || (first & 0x0F) <= 0x0D;
            prop_assert_eq!(looks_like_plaintext(&data), expected);
        }
    }
}
