#![no_main]

use libfuzzer_sys::fuzz_target;
use legacy_guard_core::timeout::parse_timeout;

fuzz_target!(|data: &[u8]| {
    // Arbitrary selectors parse to some duration (possibly zero), never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_timeout(s);
    }
});
