#![no_main]

use libfuzzer_sys::fuzz_target;
use tin_wire::ContentStorageRecord;

// Fuzz target: ContentStorageRecord read->write->read roundtrip.
//
// Padding bytes are not preserved, so the comparison is on the decoded
// value and on the bytes of a second encode.
fuzz_target!(|data: &[u8]| {
    let Ok(record) = ContentStorageRecord::read_from(data) else {
        return;
    };
    let bytes = record.to_bytes();
    let again = ContentStorageRecord::read_from(&bytes).unwrap();
    assert_eq!(again, record);
    assert_eq!(again.to_bytes(), bytes);
});
