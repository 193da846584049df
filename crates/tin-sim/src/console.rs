use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tin_engine::Platform;
use tin_ipc::{IpcError, ResultCode, ServiceManager, Session};
use tin_wire::{
    ApplicationEvent, ContentId, ContentMetaKey, ContentStorageRecord, PlaceholderId, StorageId,
};
use tracing::debug;

use crate::mount::SimMounter;
use crate::services::{EsSession, NcmSession, NsSession};

/// Result code for requests the simulator cannot decode.
pub const RESULT_BAD_REQUEST: ResultCode = ResultCode::new(0x1FF, 1);

/// Result code returned when opening a service nobody registered.
pub const RESULT_SERVICE_NOT_REGISTERED: ResultCode = ResultCode::new(21, 7);

/// One dispatched command, in order of arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Call {
    pub service: &'static str,
    pub command: u32,
}

/// Make the `skip + 1`-th matching call fail with `code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fault {
    pub service: &'static str,
    pub command: u32,
    pub skip: usize,
    pub code: ResultCode,
}

/// Content and placeholders of one volume.
#[derive(Clone, Debug, Default)]
pub struct StorageVolume {
    pub contents: BTreeMap<ContentId, Vec<u8>>,
    pub placeholders: BTreeMap<PlaceholderId, Placeholder>,
}

#[derive(Clone, Debug)]
pub struct Placeholder {
    pub content_id: ContentId,
    pub size: u64,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct MetaDatabase {
    pub staged: HashMap<ContentMetaKey, Vec<u8>>,
    pub committed: HashMap<ContentMetaKey, Vec<u8>>,
}

/// A registry entry: raw content storage records plus the last event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub event: ApplicationEvent,
    pub raw: Vec<u8>,
}

impl ApplicationRecord {
    /// Decoded records. Malformed trailing bytes are ignored.
    pub fn records(&self) -> Vec<ContentStorageRecord> {
        self.raw
            .chunks_exact(ContentStorageRecord::SIZE)
            .filter_map(|raw| ContentStorageRecord::read_from(raw).ok())
            .collect()
    }
}

/// Everything the simulated console remembers.
#[derive(Debug, Default)]
pub struct ConsoleState {
    pub volumes: HashMap<StorageId, StorageVolume>,
    pub meta_databases: HashMap<StorageId, MetaDatabase>,
    pub registry: BTreeMap<u64, ApplicationRecord>,
    pub tickets: Vec<(Vec<u8>, Vec<u8>)>,
    pub invalidated: Vec<u64>,
    pub opened: Vec<String>,
    pub calls: Vec<Call>,
    pub(crate) placeholder_ids: VecDeque<PlaceholderId>,
    pub(crate) faults: Vec<Fault>,
}

impl ConsoleState {
    /// Log `call` and consume a matching fault, if one is due.
    pub(crate) fn record(&mut self, call: Call) -> Result<(), ResultCode> {
        self.calls.push(call);
        let due = self
            .faults
            .iter_mut()
            .position(|f| f.service == call.service && f.command == call.command)
            .and_then(|i| {
                let fault = &mut self.faults[i];
                if fault.skip == 0 {
                    Some(i)
                } else {
                    fault.skip -= 1;
                    None
                }
            });
        match due {
            Some(i) => {
                let fault = self.faults.remove(i);
                debug!(service = call.service, command = call.command, code = %fault.code, "injected fault");
                Err(fault.code)
            }
            None => Ok(()),
        }
    }

    pub(crate) fn next_placeholder_id(&mut self) -> PlaceholderId {
        self.placeholder_ids
            .pop_front()
            .unwrap_or_else(|| PlaceholderId::from_bytes(uuid::Uuid::new_v4().into_bytes()))
    }

    pub fn volume(&mut self, storage_id: StorageId) -> &mut StorageVolume {
        self.volumes.entry(storage_id).or_default()
    }

    pub fn meta_database(&mut self, storage_id: StorageId) -> &mut MetaDatabase {
        self.meta_databases.entry(storage_id).or_default()
    }
}

/// Handle to a simulated console. Clones share the same state.
///
/// ```text
///   SimConsole ──get_service──▶ "ncm"   ─▶ IContentStorage / IContentMetaDatabase
///              │               "ns:am"
///              │               "es"
///              └──platform()──▶ Platform { services, mounter }
/// ```
#[derive(Clone, Debug, Default)]
pub struct SimConsole {
    state: Arc<Mutex<ConsoleState>>,
}

impl SimConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform bound to this console.
    pub fn platform(&self) -> Platform {
        Platform::new(
            Arc::new(self.clone()),
            Arc::new(SimMounter::new(self.clone())),
        )
    }

    /// Lock the state. Sessions and tests go through here.
    pub fn state(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out these ids, in order, before falling back to random ones.
    pub fn queue_placeholder_ids(&self, ids: impl IntoIterator<Item = PlaceholderId>) {
        self.state().placeholder_ids.extend(ids);
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Forget the call and service-open logs.
    pub fn clear_log(&self) {
        let mut state = self.state();
        state.calls.clear();
        state.opened.clear();
    }

    pub fn content(&self, storage_id: StorageId, content_id: ContentId) -> Option<Vec<u8>> {
        self.state()
            .volumes
            .get(&storage_id)
            .and_then(|v| v.contents.get(&content_id).cloned())
    }

    pub fn placeholder_count(&self, storage_id: StorageId) -> usize {
        self.state()
            .volumes
            .get(&storage_id)
            .map_or(0, |v| v.placeholders.len())
    }

    pub fn committed_meta(&self, storage_id: StorageId, key: &ContentMetaKey) -> Option<Vec<u8>> {
        self.state()
            .meta_databases
            .get(&storage_id)
            .and_then(|db| db.committed.get(key).cloned())
    }

    pub fn application_record(&self, title_id: u64) -> Option<ApplicationRecord> {
        self.state().registry.get(&title_id).cloned()
    }

    /// Put an entry into the registry directly, bypassing `ns:am`.
    pub fn seed_application_record(&self, title_id: u64, records: &[ContentStorageRecord]) {
        let raw = records.iter().flat_map(ContentStorageRecord::to_bytes).collect();
        self.state().registry.insert(
            title_id,
            ApplicationRecord {
                event: ApplicationEvent::Installed,
                raw,
            },
        );
    }
}

impl ServiceManager for SimConsole {
    fn get_service(&self, name: &str) -> Result<Session, IpcError> {
        self.state().opened.push(name.to_string());
        let console = self.clone();
        match name {
            "ncm" => Ok(Arc::new(NcmSession::new(console))),
            "ns:am" => Ok(Arc::new(NsSession::new(console))),
            "es" => Ok(Arc::new(EsSession::new(console))),
            _ => Err(IpcError::ServiceUnavailable {
                name: name.to_string(),
                code: RESULT_SERVICE_NOT_REGISTERED,
            }),
        }
    }
}
