#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: PackagedContentMeta::parse with arbitrary bytes.
//
// Catches bugs in:
// - Header enum validation
// - Extended header and content table bounds
// - Patch extended data size taken from the extended header
fuzz_target!(|data: &[u8]| {
    let _ = tin_wire::PackagedContentMeta::parse(data);
});
