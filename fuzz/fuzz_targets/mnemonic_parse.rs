#![no_main]

use libfuzzer_sys::fuzz_target;
use segwallet_core::{parse_mnemonic, WalletSecret};

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must be accepted or rejected, never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let parsed = parse_mnemonic(s).is_ok();
        assert_eq!(parsed, WalletSecret::from_phrase(s).is_ok());
    }
});
