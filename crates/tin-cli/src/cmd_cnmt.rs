/// Implementation of `tin cnmt`.
///
/// Decodes the packaged form, prints its header and content table, then
/// builds the installed record exactly as an install would and prints
/// that too.
use std::fmt::Write as _;
use std::fs;

use anyhow::{Context, Result};
use tin_wire::{
    ContentId, InstalledContentMeta, MetaContent, PackagedContentMeta, base_title_id,
    build_install_record,
};

use crate::CnmtArgs;

/// # Errors
///
/// Returns an error if the file cannot be read, `--meta-id` is not 32 hex
/// characters, or the meta file is malformed.
pub fn run(args: &CnmtArgs) -> Result<()> {
    let bytes =
        fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;
    let meta_id: ContentId = match &args.meta_id {
        Some(hex) => hex.parse().context("invalid --meta-id")?,
        None => ContentId::default(),
    };

    let packaged = PackagedContentMeta::parse(&bytes)
        .with_context(|| format!("failed to decode {}", args.file.display()))?;
    let header = &packaged.header;
    println!(
        "{} {:016x} v{} (base {:016x})",
        header.meta_type,
        header.title_id,
        header.version,
        base_title_id(header.title_id, header.meta_type)
    );
    println!(
        "  extended header {} bytes, {} contents, {} bytes extended data",
        packaged.extended_header.len(),
        packaged.contents.len(),
        packaged.extended_data.len()
    );
    for content in &packaged.contents {
        let info = &content.info;
        println!(
            "  {:<16} {}  0x{:010x}",
            info.content_type.name(),
            info.content_id,
            info.size
        );
    }

    let meta = MetaContent {
        content_id: meta_id,
        size: args.meta_size,
    };
    let record = build_install_record(&bytes, &meta, args.storage.into())?;
    let installed = InstalledContentMeta::parse(&record.data)?;
    println!(
        "installed record: {} bytes, {} content infos, storage {}",
        record.data.len(),
        installed.header.content_count,
        installed.header.storage_id
    );
    for info in &installed.contents {
        println!("  {:<16} {}", info.content_type.name(), info.content_id);
    }

    if args.hex {
        print!("{}", hex_dump(&record.data));
    }
    Ok(())
}

fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let _ = writeln!(out, "  {:04x}  {}", i * 16, hex.join(" "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_lines() {
        let dump = hex_dump(&(0u8..18).collect::<Vec<_>>());
        assert_eq!(
            dump,
            "  0000  00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f\n  0010  10 11\n"
        );
    }
}
