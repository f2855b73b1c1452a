#![no_main]

use libfuzzer_sys::fuzz_target;
use timke::{ClientHello, WireMessage};

fuzz_target!(|data: &[u8]| {
    if let Ok(hello) = ClientHello::decode(data) {
        // Anything that decodes must re-encode to the same bytes.
        let encoded = hello.encode().expect("decoded fields fit the length prefix");
        assert_eq!(&encoded[..], data);
    }
});
