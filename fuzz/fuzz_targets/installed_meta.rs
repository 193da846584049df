#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: InstalledContentMeta::parse with arbitrary bytes.
fuzz_target!(|data: &[u8]| {
    let _ = tin_wire::InstalledContentMeta::parse(data);
});
