#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: Pfs0Image::parse with arbitrary bytes.
//
// Catches bugs in:
// - Magic and header validation
// - Entry count and string table limits
// - Name offsets running off the string table
// - Entry ranges outside the image
fuzz_target!(|data: &[u8]| {
    if let Ok(image) = tin_container::Pfs0Image::parse(data) {
        for name in image.files().keys() {
            assert!(image.get(name).is_some());
        }
    }
});
