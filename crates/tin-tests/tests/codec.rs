//! Meta codec properties checked over generated titles.

use std::fmt::Write;

use insta::assert_snapshot;
use tin_sim::{CnmtBuilder, content_id};
use tin_tests::{AOC_1, APP_ID};
use tin_wire::{
    ContentMetaType, ContentType, InstalledContentMeta, MetaContent, StorageId, base_title_id,
    build_install_record,
};

fn meta(seed: u32) -> MetaContent {
    MetaContent {
        content_id: content_id(seed),
        size: 0x200,
    }
}

fn hex_lines(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in bytes.chunks(16).enumerate() {
        let halves: Vec<String> = line
            .chunks(8)
            .map(|half| half.iter().map(|b| format!("{b:02x}")).collect())
            .collect();
        writeln!(out, "{:04x}  {}", i * 16, halves.join(" ")).unwrap();
    }
    out
}

#[test]
fn every_related_title_maps_to_its_application() {
    for app in (1..=64u64).map(|n| 0x0100_0000_0000_0000 | (n << 16)) {
        assert_eq!(base_title_id(app, ContentMetaType::Application), app);
        assert_eq!(base_title_id(app | 0x800, ContentMetaType::Patch), app);
        for index in [1u64, 2, 0x7F, 0x7FF, 0xFFF] {
            let aoc = app + 0x1000 + index;
            assert_eq!(
                base_title_id(aoc, ContentMetaType::AddOnContent),
                app,
                "add-on {aoc:016x}"
            );
        }
    }
}

#[test]
fn installed_count_is_kept_entries_plus_meta() {
    let types = [
        ContentType::Program,
        ContentType::DeltaFragment,
        ContentType::Control,
        ContentType::LegalInformation,
        ContentType::DeltaFragment,
        ContentType::HtmlDocument,
    ];
    for listed in 0..=types.len() {
        let cnmt = types[..listed]
            .iter()
            .zip(1u32..)
            .fold(CnmtBuilder::patch(APP_ID | 0x800), |cnmt, (ty, seed)| {
                cnmt.content(content_id(seed), u64::from(seed) * 0x100, *ty)
            });
        let kept = types[..listed]
            .iter()
            .filter(|ty| **ty != ContentType::DeltaFragment)
            .count();

        let record =
            build_install_record(&cnmt.build().unwrap(), &meta(0xF0), StorageId::SdCard).unwrap();
        let installed = InstalledContentMeta::parse(&record.data).unwrap();

        assert_eq!(usize::from(installed.header.content_count), kept + 1);
        assert_eq!(record.contents.len(), kept);
        assert_eq!(installed.contents[0].content_id, content_id(0xF0));
        assert_eq!(&installed.contents[1..], &record.contents[..]);
    }
}

#[test]
fn add_on_record_layout() {
    let cnmt = CnmtBuilder::add_on_content(AOC_1).content(content_id(0xC1), 900, ContentType::Data);
    let record =
        build_install_record(&cnmt.build().unwrap(), &meta(0xC0), StorageId::SdCard).unwrap();

    assert_eq!(record.base_title_id, APP_ID);
    assert_snapshot!(hex_lines(&record.data), @r"
    0000  1000020000000005 0000010000000001
    0010  0000000000000000 000000c011111111
    0020  1111111111111111 0002000000000000
    0030  000000c111111111 1111111111111111
    0040  8403000000000200
    ");
}
