//! Application records in the title registry (`ns:am`).

use bytes::BufMut;
use tin_ipc::{BufferAttr, IpcError, Request, ResultCode, ResultExt, Service, ServiceManager};
use tin_wire::{ApplicationEvent, ContentStorageRecord};
use tracing::{debug, info};

use crate::error::InstallError;

/// Result module of the title registry.
pub const MODULE: u32 = 16;

pub const RESULT_APPLICATION_RECORD_NOT_FOUND: ResultCode = ResultCode::new(MODULE, 2);

/// One registry record exactly as the service stores it.
pub type RawRecord = [u8; ContentStorageRecord::SIZE];

/// Command ids.
pub mod cmd {
    pub const PUSH_APPLICATION_RECORD: u32 = 16;
    pub const LIST_APPLICATION_RECORD_CONTENT_META: u32 = 17;
    pub const DELETE_APPLICATION_RECORD: u32 = 27;
    pub const INVALIDATE_APPLICATION_CONTROL_CACHE: u32 = 404;
}

/// The application manager service.
#[derive(Clone, Debug)]
pub struct ApplicationManager {
    service: Service,
}

impl ApplicationManager {
    /// # Errors
    ///
    /// [`IpcError::ServiceUnavailable`] when `ns:am` cannot be opened.
    pub fn open(services: &dyn ServiceManager) -> Result<Self, IpcError> {
        let session = services.get_service("ns:am")?;
        Ok(Self {
            service: Service::new("ns:am", session),
        })
    }

    /// Push `records` verbatim as the whole entry for `title_id`. Callers
    /// delete the old entry first.
    ///
    /// # Errors
    ///
    /// Any IPC failure.
    pub fn push_application_record(
        &self,
        title_id: u64,
        event: ApplicationEvent,
        records: &[RawRecord],
    ) -> Result<(), IpcError> {
        let mut input = Vec::with_capacity(16);
        input.put_u8(event.to_wire_byte());
        input.put_bytes(0, 7);
        input.put_u64_le(title_id);

        let buf = records.concat();
        self.service
            .call(
                Request::new(cmd::PUSH_APPLICATION_RECORD)
                    .input(input)
                    .in_buffer(&buf, BufferAttr::MAP_ALIAS),
            )
            .map(|_| ())
    }

    /// Fetch up to `out.len() / 0x18` records starting at `offset`.
    /// Returns how many were written.
    ///
    /// # Errors
    ///
    /// Any IPC failure, including `ApplicationRecordNotFound`.
    pub fn list_application_record_content_meta(
        &self,
        offset: u64,
        title_id: u64,
        out: &mut [u8],
    ) -> Result<usize, IpcError> {
        let mut input = Vec::with_capacity(16);
        input.put_u64_le(offset);
        input.put_u64_le(title_id);
        let response = self.service.call(
            Request::new(cmd::LIST_APPLICATION_RECORD_CONTENT_META)
                .input(input)
                .output_size(4)
                .out_buffer(out, BufferAttr::MAP_ALIAS),
        )?;
        let count = response.output();
        let count = i32::from_le_bytes([count[0], count[1], count[2], count[3]]);
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// # Errors
    ///
    /// Any IPC failure, including `ApplicationRecordNotFound`.
    pub fn delete_application_record(&self, title_id: u64) -> Result<(), IpcError> {
        self.service.dispatch_in(
            cmd::DELETE_APPLICATION_RECORD,
            title_id.to_le_bytes().to_vec(),
        )
    }

    /// # Errors
    ///
    /// Any IPC failure.
    pub fn invalidate_application_control_cache(&self, title_id: u64) -> Result<(), IpcError> {
        self.service.dispatch_in(
            cmd::INVALIDATE_APPLICATION_CONTROL_CACHE,
            title_id.to_le_bytes().to_vec(),
        )
    }

    /// Every record currently stored for `title_id`, in registry order,
    /// undecoded.
    ///
    /// Reads pages of `page_capacity` records until a short page. A
    /// title with no entry yields an empty list.
    ///
    /// # Errors
    ///
    /// Any IPC failure other than `ApplicationRecordNotFound`.
    pub fn existing_records(
        &self,
        title_id: u64,
        page_capacity: usize,
    ) -> Result<Vec<RawRecord>, IpcError> {
        let page_capacity = page_capacity.max(1);
        let mut page = vec![0u8; page_capacity * ContentStorageRecord::SIZE];
        let mut records = Vec::new();

        loop {
            let Some(count) = self
                .list_application_record_content_meta(records.len() as u64, title_id, &mut page)
                .allow(RESULT_APPLICATION_RECORD_NOT_FOUND)?
            else {
                break;
            };

            let count = count.min(page_capacity);
            for chunk in page.chunks_exact(ContentStorageRecord::SIZE).take(count) {
                let mut raw = [0u8; ContentStorageRecord::SIZE];
                raw.copy_from_slice(chunk);
                records.push(raw);
            }
            if count < page_capacity {
                break;
            }
        }

        Ok(records)
    }
}

/// What a merge did to one registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub existing: usize,
    pub added: usize,
}

/// Merge `new` into the registry entry for `base_title_id`.
///
/// ```text
///   existing ← List…ContentMeta (paged, not-found = [])
///   merged   ← existing ++ (new − already present)
///   DeleteApplicationRecord          (not-found allowed)
///   PushApplicationRecord  Installed, merged
///   InvalidateApplicationControlCache   if existing ≠ []
/// ```
///
/// The existing records are pushed back byte for byte, in order, without
/// being decoded. A new record is skipped when a record with the same
/// key on the same volume is already present; the same key on another
/// volume is appended. Between the delete and the push the title has no
/// entry; a crash there loses it until the next install.
///
/// # Errors
///
/// Any IPC failure outside the allowed not-found codes.
pub fn merge_application_records(
    ns: &ApplicationManager,
    base_title_id: u64,
    new: &[ContentStorageRecord],
    page_capacity: usize,
) -> Result<MergeOutcome, InstallError> {
    let existing = ns.existing_records(base_title_id, page_capacity)?;
    let existing_count = existing.len();

    let mut merged = existing;
    merged.reserve(new.len());
    for record in new {
        if !merged.iter().any(|raw| record.matches_raw(raw)) {
            merged.push(record.to_bytes());
        }
    }
    let added = merged.len() - existing_count;
    debug!(
        base_title_id = format_args!("{base_title_id:016x}"),
        existing = existing_count,
        added,
        "merging application records"
    );

    ns.delete_application_record(base_title_id)
        .allow(RESULT_APPLICATION_RECORD_NOT_FOUND)?;
    ns.push_application_record(base_title_id, ApplicationEvent::Installed, &merged)?;

    if existing_count > 0 {
        ns.invalidate_application_control_cache(base_title_id)?;
    }

    info!(
        base_title_id = format_args!("{base_title_id:016x}"),
        records = merged.len(),
        "application record updated"
    );
    Ok(MergeOutcome {
        existing: existing_count,
        added,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tin_ipc::{Response, ServiceSession};
    use tin_wire::{ContentInstallType, ContentMetaKey, ContentMetaType, StorageId};

    use super::*;

    const TITLE: u64 = 0x0100_0000_0001_0000;

    /// Single-title registry holding the raw pushed bytes.
    #[derive(Default)]
    struct FakeRegistry {
        entry: Mutex<Option<Vec<u8>>>,
        calls: Mutex<Vec<u32>>,
    }

    impl ServiceSession for FakeRegistry {
        fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
            self.calls.lock().unwrap().push(request.command());
            let mut entry = self.entry.lock().unwrap();
            match request.command() {
                cmd::LIST_APPLICATION_RECORD_CONTENT_META => {
                    let stored = entry.as_ref().ok_or(RESULT_APPLICATION_RECORD_NOT_FOUND)?;
                    let offset =
                        u64::from_le_bytes(request.input_bytes()[0..8].try_into().unwrap());
                    let start = (offset as usize * ContentStorageRecord::SIZE).min(stored.len());
                    let out = request.out_buffer_at(0).unwrap();
                    let n = (stored.len() - start).min(out.len()) / ContentStorageRecord::SIZE;
                    let len = n * ContentStorageRecord::SIZE;
                    out[..len].copy_from_slice(&stored[start..start + len]);
                    Ok(Response::new().with_output((n as i32).to_le_bytes().to_vec()))
                }
                cmd::DELETE_APPLICATION_RECORD => entry
                    .take()
                    .map(|_| Response::new())
                    .ok_or(RESULT_APPLICATION_RECORD_NOT_FOUND),
                cmd::PUSH_APPLICATION_RECORD => {
                    *entry = Some(request.in_buffer_at(0).unwrap().to_vec());
                    Ok(Response::new())
                }
                cmd::INVALIDATE_APPLICATION_CONTROL_CACHE => Ok(Response::new()),
                _ => Err(ResultCode::new(MODULE, 0x7F)),
            }
        }
    }

    fn record(version: u32) -> ContentStorageRecord {
        ContentStorageRecord {
            key: ContentMetaKey {
                title_id: TITLE,
                version,
                meta_type: ContentMetaType::Application,
                install_type: ContentInstallType::Full,
            },
            storage_id: StorageId::SdCard,
        }
    }

    fn registry() -> (Arc<FakeRegistry>, ApplicationManager) {
        let fake = Arc::new(FakeRegistry::default());
        let ns = ApplicationManager {
            service: Service::new("ns:am", fake.clone()),
        };
        (fake, ns)
    }

    #[test]
    fn merge_into_missing_entry() {
        let (fake, ns) = registry();
        let outcome = merge_application_records(&ns, TITLE, &[record(0)], 4).unwrap();

        assert_eq!(outcome, MergeOutcome { existing: 0, added: 1 });
        assert_eq!(
            *fake.calls.lock().unwrap(),
            vec![
                cmd::LIST_APPLICATION_RECORD_CONTENT_META,
                cmd::DELETE_APPLICATION_RECORD,
                cmd::PUSH_APPLICATION_RECORD,
            ]
        );
        assert_eq!(ns.existing_records(TITLE, 4).unwrap(), vec![record(0).to_bytes()]);
    }

    #[test]
    fn merge_appends_after_existing_across_pages() {
        let (fake, ns) = registry();
        let existing: Vec<_> = (1..=3).map(record).collect();
        merge_application_records(&ns, TITLE, &existing, 2).unwrap();
        let before = fake.entry.lock().unwrap().clone().unwrap();
        fake.calls.lock().unwrap().clear();

        let outcome = merge_application_records(&ns, TITLE, &[record(10), record(11)], 2).unwrap();

        assert_eq!(outcome, MergeOutcome { existing: 3, added: 2 });
        let after = fake.entry.lock().unwrap().clone().unwrap();
        assert_eq!(after.len(), 5 * ContentStorageRecord::SIZE);
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(
            fake.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|&&c| c == cmd::LIST_APPLICATION_RECORD_CONTENT_META)
                .count(),
            2
        );
        assert!(
            fake.calls
                .lock()
                .unwrap()
                .contains(&cmd::INVALIDATE_APPLICATION_CONTROL_CACHE)
        );
    }

    #[test]
    fn remerging_same_keys_adds_nothing() {
        let (_, ns) = registry();
        merge_application_records(&ns, TITLE, &[record(0), record(1)], 8).unwrap();
        let outcome = merge_application_records(&ns, TITLE, &[record(1), record(0)], 8).unwrap();

        assert_eq!(outcome, MergeOutcome { existing: 2, added: 0 });
        assert_eq!(
            ns.existing_records(TITLE, 8).unwrap(),
            vec![record(0).to_bytes(), record(1).to_bytes()]
        );
    }

    #[test]
    fn existing_bytes_survive_merge_undecoded() {
        let (fake, ns) = registry();
        let mut padded = record(0).to_bytes();
        padded[0x0F] = 0x5A;
        padded[0x11] = 0xAB;
        let mut unknown_storage = record(1).to_bytes();
        unknown_storage[0x10] = 0x07;
        let seeded = [padded, unknown_storage].concat();
        *fake.entry.lock().unwrap() = Some(seeded.clone());

        let outcome = merge_application_records(&ns, TITLE, &[record(0), record(2)], 4).unwrap();

        assert_eq!(outcome, MergeOutcome { existing: 2, added: 1 });
        let after = fake.entry.lock().unwrap().clone().unwrap();
        assert_eq!(after.len(), 3 * ContentStorageRecord::SIZE);
        assert_eq!(&after[..seeded.len()], &seeded[..]);
        assert_eq!(&after[seeded.len()..], &record(2).to_bytes()[..]);
    }

    #[test]
    fn same_key_on_another_volume_is_appended() {
        let (_, ns) = registry();
        merge_application_records(&ns, TITLE, &[record(0)], 4).unwrap();
        let moved = ContentStorageRecord {
            storage_id: StorageId::BuiltInUser,
            ..record(0)
        };

        let outcome = merge_application_records(&ns, TITLE, &[moved], 4).unwrap();

        assert_eq!(outcome, MergeOutcome { existing: 1, added: 1 });
        assert_eq!(
            ns.existing_records(TITLE, 4).unwrap(),
            vec![record(0).to_bytes(), moved.to_bytes()]
        );
    }
}
