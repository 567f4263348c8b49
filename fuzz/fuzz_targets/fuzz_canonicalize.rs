#![no_main]

use libfuzzer_sys::fuzz_target;
use sri_factura::xml::canonicalize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Canonical form is a fixed point.
        if let Ok(once) = canonicalize(s) {
            let twice = canonicalize(&once).expect("canonical output re-parses");
            assert_eq!(once, twice);
        }
    }
});
