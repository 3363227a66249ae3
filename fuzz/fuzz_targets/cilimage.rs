#![no_main]

use libfuzzer_sys::fuzz_target;
use pinpatch::metadata::cilimage::CilImage;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = CilImage::from_mem(data.to_vec()) {
        if let Ok(Some(method)) = image.find_method("", "GMC", "IsMSC") {
            let _ = image.method_body(&method);
        }
    }
});
