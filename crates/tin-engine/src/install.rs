use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tin_container::{Blob, Container, Entry};
use tin_wire::{
    ContentId, ContentMetaKey, ContentStorageRecord, InstallRecord, MetaContent,
    build_install_record,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::InstallConfig;
use crate::error::InstallError;
use crate::ncm::{ContentManager, ContentMetaDatabase, ContentStorage};
use crate::platform::Platform;
use crate::records::{ApplicationManager, MergeOutcome, merge_application_records};
use crate::step::{Stage, Step, StepSink};
use crate::store::install_content;
use crate::ticket::{TicketService, ticket_pairs};

/// Suffix of meta content entries.
pub const META_SUFFIX: &str = ".cnmt.nca";

/// Suffix of the meta file inside a mounted meta content.
pub const CNMT_SUFFIX: &str = ".cnmt";

/// One meta record written by a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledTitle {
    pub key: ContentMetaKey,
    pub base_title_id: u64,
    pub meta_content_id: ContentId,
    /// Content written for this title, excluding the meta content.
    pub content_ids: Vec<ContentId>,
}

/// Summary of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub titles: Vec<InstalledTitle>,
    pub tickets: usize,
    pub contents_written: usize,
    pub bytes_written: u64,
    /// Registry merges, one per base title id, in ascending id order.
    pub registry: Vec<(u64, MergeOutcome)>,
}

/// Drives an install on a platform.
///
/// ```text
///   read container ─▶ pair tickets ─▶ ┬─ per *.cnmt.nca ───────────────┐
///                                     │  store meta content            │
///                                     │  mount, read *.cnmt            │
///                                     │  build record, set + commit    │
///                                     └────────────────────────────────┘
///   import tickets ─▶ store remaining content ─▶ merge registry per base id
/// ```
///
/// Everything runs sequentially on one task; see [`Step`] for the
/// events it emits.
#[derive(Clone, Debug)]
pub struct Installer {
    platform: Platform,
    config: InstallConfig,
}

impl Installer {
    pub fn new(platform: Platform, config: InstallConfig) -> Self {
        Self { platform, config }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Spawn the install task on the current tokio runtime.
    ///
    /// The returned [`Install`] must be drained: the task waits whenever
    /// the step queue is full.
    pub fn install(&self, blob: Arc<dyn Blob>) -> Install {
        let (sink, steps) = StepSink::channel(self.config.step_queue_depth);
        let installer = self.clone();
        let task = tokio::spawn(async move { installer.run_staged(blob, sink).await });
        Install { steps, task }
    }

    /// Run the pipeline wrapped in the outer `install` stage. Its `End`
    /// step carries the terminal error, if any.
    ///
    /// # Errors
    ///
    /// The error that aborted the run, shared with the final step.
    pub async fn run_staged(
        &self,
        blob: Arc<dyn Blob>,
        steps: StepSink,
    ) -> Result<InstallReport, Arc<InstallError>> {
        let stage = steps.start("install").await.map_err(Arc::new)?;
        let result = self.run(blob, &steps).await.map_err(Arc::new);

        let error = result.as_ref().err().cloned();
        if let Some(e) = &error {
            error!(error = %e, "install failed");
        }
        if steps.end(stage, error).await.is_err() {
            debug!("step receiver dropped before the final step");
        }
        result
    }

    /// Run the pipeline, emitting the inner stages on `steps`.
    ///
    /// # Errors
    ///
    /// Any [`InstallError`]; the run stops at the first one.
    pub async fn run(
        &self,
        blob: Arc<dyn Blob>,
        steps: &StepSink,
    ) -> Result<InstallReport, InstallError> {
        let stage = steps.start("read container").await?;
        let container = Container::parse(blob).await?;
        let tickets = ticket_pairs(&container)?;
        let metas: Vec<Entry> = container.with_suffix(META_SUFFIX).cloned().collect();
        if metas.is_empty() {
            return Err(InstallError::MissingFile {
                name: format!("*{META_SUFFIX}"),
            });
        }
        debug!(
            entries = container.len(),
            metas = metas.len(),
            tickets = tickets.len(),
            "container read"
        );
        steps.end(stage, None).await?;

        let services = self.platform.services.as_ref();
        let ncm = ContentManager::open(services)?;
        let storage = ncm.open_content_storage(self.config.storage_id)?;
        let meta_db = ncm.open_content_meta_database(self.config.storage_id)?;

        let mut report = InstallReport::default();
        let mut records = Vec::with_capacity(metas.len());
        for entry in &metas {
            let (meta_content_id, record) = self
                .install_meta(&storage, &meta_db, entry, steps, &mut report)
                .await?;
            records.push((meta_content_id, record));
        }

        if !tickets.is_empty() {
            let es = TicketService::open(services)?;
            for pair in &tickets {
                let stage = steps.start(format!("ticket {}", pair.ticket.name())).await?;
                let ticket = pair.ticket.read_all().await?;
                let cert = pair.cert.read_all().await?;
                es.import(&ticket, &cert)?;
                report.tickets += 1;
                steps.end(stage, None).await?;
            }
        }

        let mut written: HashSet<ContentId> = records.iter().map(|(id, _)| *id).collect();
        for (_, record) in &records {
            for content_id in record.content_ids() {
                if !written.insert(content_id) {
                    continue;
                }
                let name = format!("{content_id}.nca");
                let entry = container
                    .get(&name)
                    .ok_or(InstallError::MissingFile { name })?;
                let stage = steps.start(format!("content {content_id}")).await?;
                self.write_content(&storage, content_id, entry, steps, &stage, &mut report)
                    .await?;
                steps.end(stage, None).await?;
            }
        }

        let ns = ApplicationManager::open(services)?;
        let mut groups: BTreeMap<u64, Vec<ContentStorageRecord>> = BTreeMap::new();
        for (_, record) in &records {
            groups
                .entry(record.base_title_id)
                .or_default()
                .push(record.storage_record(self.config.storage_id));
        }
        for (base_title_id, new) in groups {
            let stage = steps.start(format!("records {base_title_id:016x}")).await?;
            let outcome = merge_application_records(
                &ns,
                base_title_id,
                &new,
                self.config.record_page_capacity,
            )?;
            report.registry.push((base_title_id, outcome));
            steps.end(stage, None).await?;
        }

        report.titles = records
            .into_iter()
            .map(|(meta_content_id, record)| InstalledTitle {
                key: record.key,
                base_title_id: record.base_title_id,
                meta_content_id,
                content_ids: record.content_ids().collect(),
            })
            .collect();

        info!(
            titles = report.titles.len(),
            contents = report.contents_written,
            bytes = report.bytes_written,
            "install complete"
        );
        Ok(report)
    }

    /// Store one meta content, read its `.cnmt` back through the mount,
    /// and commit the installed record.
    async fn install_meta(
        &self,
        storage: &ContentStorage,
        meta_db: &ContentMetaDatabase,
        entry: &Entry,
        steps: &StepSink,
        report: &mut InstallReport,
    ) -> Result<(ContentId, InstallRecord), InstallError> {
        let content_id = ContentId::from_file_name(entry.name())?;
        let stage = steps.start(format!("meta {content_id}")).await?;
        self.write_content(storage, content_id, entry, steps, &stage, report)
            .await?;

        let packaged = {
            let path = storage.get_path(content_id)?;
            let mount = self.platform.mounter.mount(&path)?;
            let name = mount
                .list()?
                .into_iter()
                .find(|n| n.ends_with(CNMT_SUFFIX))
                .ok_or(InstallError::MissingMetaFile { content_id })?;
            mount.read(&name)?
        };

        let meta = MetaContent {
            content_id,
            size: entry.size(),
        };
        let record = build_install_record(&packaged, &meta, self.config.storage_id)?;
        meta_db.set(&record.key, &record.data)?;
        meta_db.commit()?;
        info!(
            title_id = format_args!("{:016x}", record.key.title_id),
            version = record.key.version,
            meta_type = %record.key.meta_type,
            contents = record.contents.len(),
            "meta record committed"
        );

        steps.end(stage, None).await?;
        Ok((content_id, record))
    }

    async fn write_content(
        &self,
        storage: &ContentStorage,
        content_id: ContentId,
        entry: &Entry,
        steps: &StepSink,
        stage: &Stage,
        report: &mut InstallReport,
    ) -> Result<(), InstallError> {
        let written = install_content(
            storage,
            content_id,
            entry.open()?,
            entry.size(),
            self.config.write_chunk_size,
            steps,
            stage,
        )
        .await?;

        if !storage.has(content_id)? {
            return Err(InstallError::ContentMissing { content_id });
        }
        report.contents_written += 1;
        report.bytes_written += written;
        Ok(())
    }
}

/// A running install: the step stream plus the task producing it.
#[derive(Debug)]
pub struct Install {
    steps: mpsc::Receiver<Step>,
    task: JoinHandle<Result<InstallReport, Arc<InstallError>>>,
}

impl Install {
    /// Next step, or `None` once the task has finished.
    pub async fn next_step(&mut self) -> Option<Step> {
        self.steps.recv().await
    }

    /// Drain the remaining steps into `on_step` and return the result.
    ///
    /// # Errors
    ///
    /// The error that aborted the run.
    pub async fn finish_with(
        mut self,
        mut on_step: impl FnMut(Step),
    ) -> Result<InstallReport, Arc<InstallError>> {
        while let Some(step) = self.steps.recv().await {
            on_step(step);
        }
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Arc::new(InstallError::Cancelled)),
        }
    }

    /// Drain and discard the remaining steps.
    ///
    /// # Errors
    ///
    /// The error that aborted the run.
    pub async fn finish(self) -> Result<InstallReport, Arc<InstallError>> {
        self.finish_with(|_| {}).await
    }
}
