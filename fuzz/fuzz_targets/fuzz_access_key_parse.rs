#![no_main]

use libfuzzer_sys::fuzz_target;
use sri_factura::core::AccessKey;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Any key that parses must decompose and rebuild to itself.
        if let Ok(key) = AccessKey::parse(s) {
            if let Ok(components) = key.components() {
                let rebuilt = components.to_access_key().expect("rebuild parsed key");
                assert_eq!(rebuilt, key);
            }
        }
    }
});
