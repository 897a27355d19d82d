#![no_main]

use libfuzzer_sys::fuzz_target;
use segwallet_core::{parse_account_key, reencode, KeyVersion};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_account_key(s);

        // A successful zpub -> xpub conversion must convert back unchanged
        if let Ok(xpub) = reencode(s, KeyVersion::ZPUB, KeyVersion::XPUB) {
            let back = reencode(&xpub, KeyVersion::XPUB, KeyVersion::ZPUB)
                .expect("re-encoded key must decode");
            assert_eq!(back, s);
        }
    }
});
