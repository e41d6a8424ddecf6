#![no_main]

use edge_gateway::core::codec::strip_prefix;
use edge_gateway::{Request, Response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Frame decoding must fail cleanly on any input
    let _ = Request::unmarshal(data);
    if let Ok(resp) = Response::unmarshal(data) {
        let _ = resp.error_code();
        let _ = resp.error_record();
    }
    if let Ok(inner) = strip_prefix(data) {
        let _ = Request::unmarshal(inner);
    }
});
