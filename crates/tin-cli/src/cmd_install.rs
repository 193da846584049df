/// Implementation of `tin install`.
///
/// Runs the full pipeline against a fresh [`SimConsole`], printing each
/// step as it arrives, then the registry entries the run produced.
///
/// ```text
/// ▸ install
/// ▸ read container
/// ✓ read container (0 ms)
/// ▸ meta 0123456789abcdef0123456789abcdef
///   meta 0123456789abcdef0123456789abcdef 100% (4096/4096)
/// ...
/// ✓ install (12 ms)
/// registry 0100000000010000: 1 record
///   Application 0100000000010000 v0 on SdCard
/// ```
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tin_container::{Blob, FileBlob};
use tin_engine::{InstallConfig, InstallReport, Installer, Step};
use tin_sim::SimConsole;
use tracing::{debug, info};

use crate::{InstallArgs, runtime};

#[derive(Serialize)]
struct ReportJson {
    titles: Vec<TitleJson>,
    tickets: usize,
    contents_written: usize,
    bytes_written: u64,
    registry: Vec<RegistryJson>,
}

#[derive(Serialize)]
struct TitleJson {
    title_id: String,
    version: u32,
    meta_type: String,
    base_title_id: String,
    meta_content_id: String,
    content_ids: Vec<String>,
}

#[derive(Serialize)]
struct RegistryJson {
    base_title_id: String,
    records: Vec<RecordJson>,
}

#[derive(Serialize)]
struct RecordJson {
    title_id: String,
    version: u32,
    meta_type: String,
    storage: String,
}

/// # Errors
///
/// Returns an error if the package cannot be opened or the install fails.
pub fn run(args: &InstallArgs) -> Result<()> {
    let blob = FileBlob::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let console = SimConsole::new();
    let config = InstallConfig {
        storage_id: args.storage.into(),
        write_chunk_size: args.chunk_size,
        ..InstallConfig::default()
    };
    debug!(
        file = %args.file.display(),
        size = blob.size(),
        storage = %config.storage_id,
        chunk_size = config.write_chunk_size,
        "starting simulated install"
    );
    let installer = Installer::new(console.platform(), config);

    let quiet = args.json;
    let report = runtime()?
        .block_on(async {
            installer
                .install(Arc::new(blob))
                .finish_with(|step| {
                    if !quiet && let Some(line) = render_step(&step) {
                        println!("{line}");
                    }
                })
                .await
        })
        .with_context(|| format!("install of {} failed", args.file.display()))?;
    info!(
        file = %args.file.display(),
        titles = report.titles.len(),
        contents = report.contents_written,
        bytes = report.bytes_written,
        "simulated install finished"
    );

    let registry = registry_json(&console, &report);
    if args.json {
        let json = ReportJson {
            titles: report
                .titles
                .iter()
                .map(|t| TitleJson {
                    title_id: format!("{:016x}", t.key.title_id),
                    version: t.key.version,
                    meta_type: t.key.meta_type.to_string(),
                    base_title_id: format!("{:016x}", t.base_title_id),
                    meta_content_id: t.meta_content_id.to_string(),
                    content_ids: t.content_ids.iter().map(ToString::to_string).collect(),
                })
                .collect(),
            tickets: report.tickets,
            contents_written: report.contents_written,
            bytes_written: report.bytes_written,
            registry,
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    for entry in &registry {
        println!(
            "registry {}: {} record{}",
            entry.base_title_id,
            entry.records.len(),
            if entry.records.len() == 1 { "" } else { "s" }
        );
        for record in &entry.records {
            println!(
                "  {} {} v{} on {}",
                record.meta_type, record.title_id, record.version, record.storage
            );
        }
    }
    Ok(())
}

fn registry_json(console: &SimConsole, report: &InstallReport) -> Vec<RegistryJson> {
    report
        .registry
        .iter()
        .map(|(base_title_id, _)| RegistryJson {
            base_title_id: format!("{base_title_id:016x}"),
            records: console
                .application_record(*base_title_id)
                .map(|entry| entry.records())
                .unwrap_or_default()
                .iter()
                .map(|r| RecordJson {
                    title_id: format!("{:016x}", r.key.title_id),
                    version: r.key.version,
                    meta_type: r.key.meta_type.to_string(),
                    storage: r.storage_id.to_string(),
                })
                .collect(),
        })
        .collect()
}

/// One progress line per step. The opening `Progress` of each write
/// (0 bytes) is skipped.
fn render_step(step: &Step) -> Option<String> {
    match step {
        Step::Start { name, .. } => Some(format!("▸ {name}")),
        Step::Progress {
            name,
            processed,
            total,
        } => {
            if *processed == 0 {
                return None;
            }
            let percent = processed.saturating_mul(100) / (*total).max(1);
            Some(format!("  {name} {percent:>3}% ({processed}/{total})"))
        }
        Step::End {
            name,
            start,
            end,
            error: None,
        } => Some(format!(
            "✓ {name} ({} ms)",
            end.duration_since(*start).as_millis()
        )),
        Step::End {
            name,
            error: Some(e),
            ..
        } => Some(format!("✗ {name}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn renders_progress_as_percent() {
        let step = Step::Progress {
            name: "content abc".into(),
            processed: 512,
            total: 2048,
        };
        assert_eq!(render_step(&step).unwrap(), "  content abc  25% (512/2048)");
    }

    #[test]
    fn skips_empty_progress() {
        let step = Step::Progress {
            name: "content abc".into(),
            processed: 0,
            total: 2048,
        };
        assert!(render_step(&step).is_none());
    }

    #[test]
    fn failed_end_shows_error() {
        let now = Instant::now();
        let step = Step::End {
            name: "install".into(),
            start: now,
            end: now,
            error: Some(Arc::new(tin_engine::InstallError::MissingFile {
                name: "x.cert".into(),
            })),
        };
        assert_eq!(
            render_step(&step).unwrap(),
            "✗ install: missing file \"x.cert\" in package"
        );
    }
}
