/// Implementation of `tin inspect`.
///
/// # Output format
///
/// ```text
/// PFS0: 4 entries
/// meta        0x00001000  0123456789abcdef0123456789abcdef.cnmt.nca
/// content     0x00400000  fedcba9876543210fedcba9876543210.nca
/// ticket      0x000002c0  01000000000100000000000000000000.tik
/// cert        0x00000700  01000000000100000000000000000000.cert
/// ```
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tin_container::{Container, FileBlob};
use tin_wire::ContentId;
use tracing::debug;

use crate::{InspectArgs, entry_kind, runtime};

#[derive(Serialize)]
struct EntryRow {
    name: String,
    kind: &'static str,
    offset: u64,
    size: u64,
    content_id: Option<String>,
}

/// # Errors
///
/// Returns an error if the file cannot be opened or its directory is
/// malformed.
pub fn run(args: &InspectArgs) -> Result<()> {
    let blob = FileBlob::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    let container = runtime()?
        .block_on(Container::parse(Arc::new(blob)))
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    debug!(file = %args.file.display(), entries = container.len(), "container parsed");

    let rows: Vec<EntryRow> = container
        .files()
        .values()
        .map(|entry| {
            let kind = entry_kind(entry.name());
            let content_id = matches!(kind, "meta" | "content")
                .then(|| ContentId::from_file_name(entry.name()).ok())
                .flatten()
                .map(|id| id.to_string());
            EntryRow {
                name: entry.name().to_string(),
                kind,
                offset: entry.offset(),
                size: entry.size(),
                content_id,
            }
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "PFS0: {} entr{}",
        rows.len(),
        if rows.len() == 1 { "y" } else { "ies" }
    );
    for row in &rows {
        println!("{:<10}  0x{:08x}  {}", row.kind, row.size, row.name);
    }
    Ok(())
}
