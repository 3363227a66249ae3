#![no_main]

use libfuzzer_sys::fuzz_target;
use pinpatch::il2cpp::GlobalMetadata;

fuzz_target!(|data: &[u8]| {
    if let Ok(metadata) = GlobalMetadata::from_mem(data.to_vec()) {
        let _ = metadata.find_method("GMC", "IsMSC");
    }
});
