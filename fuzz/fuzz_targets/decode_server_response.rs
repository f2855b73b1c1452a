#![no_main]

use libfuzzer_sys::fuzz_target;
use timke::{ServerResponse, WireMessage};

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = ServerResponse::decode(data) {
        let encoded = response.encode().expect("decoded fields fit the length prefix");
        assert_eq!(&encoded[..], data);
    }
});
