#![no_main]

use libfuzzer_sys::fuzz_target;
use legacy_guard_core::keys::{is_canonical, normalize_pubkey};

fuzz_target!(|data: &[u8]| {
    // normalize_pubkey must never panic, and anything it accepts is canonical
    // and a fixed point.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(key) = normalize_pubkey(s) {
            assert!(is_canonical(&key));
            assert_eq!(normalize_pubkey(&key).ok().as_deref(), Some(key.as_str()));
        }
    }
});
