#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(resp) = sri_factura::gateway::soap::parse_authorization_response(s) {
            let _ = resp.status();
            let _ = resp.decisive();
        }
    }
});
