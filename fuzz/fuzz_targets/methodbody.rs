#![no_main]

use libfuzzer_sys::fuzz_target;
use pinpatch::{
    disassembler::{decode_stream, encode_instructions},
    metadata::method::MethodBody,
};

fuzz_target!(|data: &[u8]| {
    let Ok(body) = MethodBody::from(data) else {
        return;
    };
    let Ok(code) = body.code(data) else {
        return;
    };
    if let Ok(instructions) = decode_stream(code) {
        let _ = encode_instructions(&instructions);
    }
});
