#![no_main]

//! Fuzz target for webhook signature verification.
//!
//! Splits the input into a signature header and a body and checks that
//! verification never panics and only accepts the digest it computes itself.

use libfuzzer_sys::fuzz_target;
use pulse_api::crypto::{sign, verify_signature};

const SECRET: &str = "fuzz_secret";

fuzz_target!(|data: &[u8]| {
    let split = data.iter().position(|b| *b == b'\n').unwrap_or(data.len());
    let (header, body) = data.split_at(split);

    if let Ok(header) = std::str::from_utf8(header) {
        let result = verify_signature(body, Some(header), SECRET);
        if result.is_ok() {
            let expected = sign(body, SECRET).expect("non-empty secret");
            assert!(expected.eq_ignore_ascii_case(header.trim()));
        }
    }

    let signed = sign(data, SECRET).expect("non-empty secret");
    assert!(verify_signature(data, Some(&signed), SECRET).is_ok());
});
