#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tin_container::{Pfs0Builder, Pfs0Image};

#[derive(Debug, Arbitrary)]
struct File {
    name: String,
    data: Vec<u8>,
}

// Fuzz target: Pfs0Builder -> Pfs0Image roundtrip.
//
// Names must be unique and free of NUL bytes to form a valid image.
fuzz_target!(|files: Vec<File>| {
    let mut seen = std::collections::HashSet::new();
    let files: Vec<File> = files
        .into_iter()
        .filter(|f| !f.name.is_empty() && !f.name.contains('\0') && seen.insert(f.name.clone()))
        .take(64)
        .collect();

    let image = files
        .iter()
        .fold(Pfs0Builder::new(), |b, f| b.add(f.name.clone(), f.data.clone()))
        .build();
    let parsed = Pfs0Image::parse(&image).unwrap();

    assert_eq!(parsed.files().len(), files.len());
    for f in &files {
        assert_eq!(parsed.get(&f.name), Some(&f.data[..]));
    }
});
