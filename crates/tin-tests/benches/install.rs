use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tin_container::{Pfs0Builder, Pfs0Image};
use tin_sim::{CnmtBuilder, SimConsole, content_id};
use tin_tests::{APP_ID, Title, install, nsp, payload};
use tin_wire::{ContentType, MetaContent, StorageId, build_install_record};

fn bench_install_record(c: &mut Criterion) {
    let meta = MetaContent {
        content_id: content_id(0xF0),
        size: 0x400,
    };
    let mut group = c.benchmark_group("install_record");

    for contents in [2u32, 32, 512] {
        let packaged = (1..=contents)
            .fold(CnmtBuilder::application(APP_ID), |cnmt, seed| {
                cnmt.content(content_id(seed), u64::from(seed) * 0x1000, ContentType::Data)
            })
            .build()
            .unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(contents),
            &packaged,
            |b, packaged| {
                b.iter(|| build_install_record(packaged, &meta, StorageId::SdCard).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_pfs0_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("pfs0_parse");

    for entries in [4usize, 64, 1024] {
        let image = (0..entries)
            .fold(Pfs0Builder::new(), |builder, i| {
                builder.add(format!("{i:032x}.nca"), vec![0u8; 16])
            })
            .build();

        group.bench_with_input(BenchmarkId::from_parameter(entries), &image, |b, image| {
            b.iter(|| Pfs0Image::parse(image).unwrap());
        });
    }

    group.finish();
}

fn bench_install_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("install_throughput");

    for size_kb in [16usize, 256, 1024] {
        let title = Title::new(content_id(0xE0), CnmtBuilder::application(APP_ID))
            .content(content_id(0xE1), ContentType::Program, payload(9, size_kb * 1024));
        let image = nsp(&[&title]).build();

        group.throughput(Throughput::Bytes((size_kb * 1024) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size_kb), &image, |b, image| {
            b.iter(|| {
                let console = SimConsole::new();
                rt.block_on(install(&console, image.clone())).1.unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_install_record,
    bench_pfs0_parse,
    bench_install_throughput
);
criterion_main!(benches);
