//! Shared scenario helpers for the integration tests and benches.

use std::sync::Arc;

use tin_container::MemoryBlob;
use tin_engine::{InstallConfig, InstallError, InstallReport, Installer, Step};
use tin_sim::{CnmtBuilder, NspBuilder, SimConsole, content_id};
use tin_wire::{ContentId, ContentType};

pub const APP_ID: u64 = 0x0100_0000_0001_0000;
pub const PATCH_ID: u64 = APP_ID | 0x800;
pub const AOC_1: u64 = 0x0100_0000_0001_1001;
pub const AOC_2: u64 = 0x0100_0000_0001_1002;

pub const RIGHTS_ID: &str = "01000000000100000000000000000001";

/// Deterministic payload of `len` bytes.
pub fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add(u8::try_from(i % 251).unwrap_or(0)))
        .collect()
}

/// A title: its meta builder plus the payload of every non-fragment
/// content it lists.
pub struct Title {
    pub meta_id: ContentId,
    pub cnmt: CnmtBuilder,
    pub payloads: Vec<(ContentId, Vec<u8>)>,
}

impl Title {
    pub fn new(meta_id: ContentId, cnmt: CnmtBuilder) -> Self {
        Self {
            meta_id,
            cnmt,
            payloads: Vec::new(),
        }
    }

    /// List a content in the meta and ship its bytes in the package.
    #[must_use]
    pub fn content(mut self, id: ContentId, content_type: ContentType, data: Vec<u8>) -> Self {
        self.cnmt = self.cnmt.content(id, data.len() as u64, content_type);
        self.payloads.push((id, data));
        self
    }

    /// List a content in the meta without shipping it.
    #[must_use]
    pub fn listed_only(mut self, id: ContentId, content_type: ContentType, size: u64) -> Self {
        self.cnmt = self.cnmt.content(id, size, content_type);
        self
    }

    pub fn add_to(&self, nsp: NspBuilder) -> NspBuilder {
        let meta = self
            .cnmt
            .meta_content()
            .unwrap_or_else(|e| panic!("meta content for {:016x}: {e}", self.cnmt.title_id()));
        let nsp = nsp.meta(self.meta_id, meta);
        self.payloads
            .iter()
            .fold(nsp, |nsp, (id, data)| nsp.content(*id, data.clone()))
    }

    pub fn meta_size(&self) -> u64 {
        self.cnmt.meta_content().map_or(0, |m| m.len() as u64)
    }
}

/// Base application with a program and control content.
pub fn application() -> Title {
    Title::new(content_id(0xA0), CnmtBuilder::application(APP_ID).version(0))
        .content(content_id(0xA1), ContentType::Program, payload(1, 3000))
        .content(content_id(0xA2), ContentType::Control, payload(2, 700))
}

/// Patch whose meta lists a delta fragment that is not shipped.
pub fn patch_with_fragment() -> Title {
    Title::new(
        content_id(0xB0),
        CnmtBuilder::patch(PATCH_ID)
            .version(0x10000)
            .required_system_version(0x0C00_0000)
            .extended_data(vec![0xEE; 24]),
    )
    .content(content_id(0xB1), ContentType::Program, payload(3, 1500))
    .listed_only(content_id(0xB2), ContentType::DeltaFragment, 4096)
    .content(content_id(0xB3), ContentType::Control, payload(4, 200))
}

pub fn add_on(title_id: u64, seed: u32) -> Title {
    Title::new(content_id(seed), CnmtBuilder::add_on_content(title_id))
        .content(content_id(seed + 1), ContentType::Data, payload(5, 900))
}

pub fn nsp(titles: &[&Title]) -> NspBuilder {
    titles
        .iter()
        .fold(NspBuilder::new(), |nsp, title| title.add_to(nsp))
}

/// Small chunks so every content takes several writes.
pub fn config() -> InstallConfig {
    InstallConfig {
        write_chunk_size: 1024,
        record_page_capacity: 2,
        ..InstallConfig::default()
    }
}

/// Install `image` on `console` and collect every step.
pub async fn install(
    console: &SimConsole,
    image: Vec<u8>,
) -> (Vec<Step>, Result<InstallReport, Arc<InstallError>>) {
    install_with(console, image, config()).await
}

pub async fn install_with(
    console: &SimConsole,
    image: Vec<u8>,
    config: InstallConfig,
) -> (Vec<Step>, Result<InstallReport, Arc<InstallError>>) {
    let installer = Installer::new(console.platform(), config);
    let mut steps = Vec::new();
    let result = installer
        .install(Arc::new(MemoryBlob::new(image)))
        .finish_with(|step| steps.push(step))
        .await;
    (steps, result)
}

/// `Start`/`End` lines of a step stream, one per line, for snapshots.
pub fn outline(steps: &[Step]) -> String {
    steps
        .iter()
        .filter_map(|step| match step {
            Step::Start { name, .. } => Some(format!("start {name}")),
            Step::End { name, error, .. } => Some(match error {
                None => format!("end   {name}"),
                Some(e) => format!("end   {name} ! {e}"),
            }),
            Step::Progress { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
