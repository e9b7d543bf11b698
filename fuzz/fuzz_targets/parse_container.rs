#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Err(e) = cryptui_envelope::Container::parse(data) {
        assert!(e.is_malformed());
    }
});
