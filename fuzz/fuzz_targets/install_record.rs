#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tin_wire::{
    build_install_record, ContentId, ContentType, InstalledContentMeta, MetaContent, StorageId,
};

#[derive(Debug, Arbitrary)]
struct Input {
    meta_id: [u8; 16],
    meta_size: u64,
    packaged: Vec<u8>,
}

// Fuzz target: build_install_record on arbitrary packaged meta.
//
// Whenever a record is produced it must parse back, start with the
// meta blob, and carry no delta fragments.
fuzz_target!(|input: Input| {
    let meta = MetaContent {
        content_id: ContentId::from_bytes(input.meta_id),
        size: input.meta_size,
    };
    let Ok(record) = build_install_record(&input.packaged, &meta, StorageId::SdCard) else {
        return;
    };

    let installed = InstalledContentMeta::parse(&record.data).unwrap();
    assert_eq!(
        usize::from(installed.header.content_count),
        record.contents.len() + 1
    );
    assert_eq!(installed.contents[0].content_id, meta.content_id);
    assert_eq!(installed.contents[0].content_type, ContentType::Meta);
    assert!(installed
        .contents
        .iter()
        .all(|c| c.content_type != ContentType::DeltaFragment));
});
