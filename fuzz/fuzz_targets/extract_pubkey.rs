#![no_main]

use libfuzzer_sys::fuzz_target;
use legacy_guard_core::extract::{extract_pubkey, hex_runs, HistoryInput};
use legacy_guard_core::keys::is_canonical;

fuzz_target!(|data: &[u8]| {
    // Feed the same text to every view of an input; extraction must never
    // panic and only ever yield canonical keys.
    if let Ok(s) = std::str::from_utf8(data) {
        for run in hex_runs(s) {
            assert!(run.bytes().all(|b| b.is_ascii_hexdigit()));
        }

        let input = HistoryInput {
            witness: Some(s.split(' ').map(str::to_string).collect()),
            inner_witness_script_asm: Some(s.to_string()),
            script_sig_asm: Some(s.to_string()),
        };
        if let Some(found) = extract_pubkey(&input) {
            assert!(is_canonical(&found.pubkey));
        }
    }
});
