use std::sync::Arc;

use tin_engine::ncm::{
    RESULT_CONTENT_ALREADY_EXISTS, RESULT_CONTENT_NOT_FOUND, RESULT_PLACEHOLDER_ALREADY_EXISTS,
    RESULT_PLACEHOLDER_NOT_FOUND,
};
use tin_engine::records::RESULT_APPLICATION_RECORD_NOT_FOUND;
use tin_engine::{ncm, records, ticket};
use tin_ipc::{Request, Response, ResultCode, ServiceSession};
use tin_wire::{
    ApplicationEvent, ContentId, ContentMetaKey, ContentStorageRecord, PlaceholderId, StorageId,
};
use tracing::debug;

use crate::console::{ApplicationRecord, Call, Placeholder, RESULT_BAD_REQUEST, SimConsole};
use crate::mount::content_path;

// ── Input decoding ────────────────────────────────────────────────────

fn bytes_at<const N: usize>(input: &[u8], at: usize) -> Result<[u8; N], ResultCode> {
    input
        .get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(RESULT_BAD_REQUEST)
}

fn u64_at(input: &[u8], at: usize) -> Result<u64, ResultCode> {
    bytes_at(input, at).map(u64::from_le_bytes)
}

fn content_id_at(input: &[u8], at: usize) -> Result<ContentId, ResultCode> {
    bytes_at(input, at).map(ContentId::from_bytes)
}

fn placeholder_id_at(input: &[u8], at: usize) -> Result<PlaceholderId, ResultCode> {
    bytes_at(input, at).map(PlaceholderId::from_bytes)
}

// ── ncm ───────────────────────────────────────────────────────────────

pub(crate) struct NcmSession {
    console: SimConsole,
}

impl NcmSession {
    pub(crate) fn new(console: SimConsole) -> Self {
        Self { console }
    }
}

impl ServiceSession for NcmSession {
    fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
        let command = request.command();
        self.console.state().record(Call {
            service: "ncm",
            command,
        })?;

        let storage_id = request
            .input_bytes()
            .first()
            .and_then(|&b| StorageId::from_wire_byte(b).ok())
            .ok_or(RESULT_BAD_REQUEST)?;
        let console = self.console.clone();

        match command {
            ncm::cmd::OPEN_CONTENT_STORAGE => Ok(Response::new()
                .with_object(Arc::new(StorageSession { console, storage_id }))),
            ncm::cmd::OPEN_CONTENT_META_DATABASE => Ok(Response::new()
                .with_object(Arc::new(MetaDatabaseSession { console, storage_id }))),
            _ => Err(RESULT_BAD_REQUEST),
        }
    }
}

struct StorageSession {
    console: SimConsole,
    storage_id: StorageId,
}

impl ServiceSession for StorageSession {
    fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
        let command = request.command();
        let mut state = self.console.state();
        state.record(Call {
            service: "IContentStorage",
            command,
        })?;

        let input = request.input_bytes().to_vec();
        if command == ncm::cmd::GENERATE_PLACEHOLDER_ID {
            let id = state.next_placeholder_id();
            return Ok(Response::new().with_output(id.as_bytes().to_vec()));
        }

        let volume = state.volume(self.storage_id);
        match command {
            ncm::cmd::CREATE_PLACEHOLDER => {
                let content_id = content_id_at(&input, 0)?;
                let placeholder_id = placeholder_id_at(&input, 16)?;
                let size = u64::try_from(i64::from_le_bytes(bytes_at(&input, 32)?))
                    .map_err(|_| RESULT_BAD_REQUEST)?;
                if volume.placeholders.contains_key(&placeholder_id) {
                    return Err(RESULT_PLACEHOLDER_ALREADY_EXISTS);
                }
                volume.placeholders.insert(
                    placeholder_id,
                    Placeholder {
                        content_id,
                        size,
                        data: Vec::new(),
                    },
                );
                Ok(Response::new())
            }
            ncm::cmd::DELETE_PLACEHOLDER => {
                let placeholder_id = placeholder_id_at(&input, 0)?;
                volume
                    .placeholders
                    .remove(&placeholder_id)
                    .map(|_| Response::new())
                    .ok_or(RESULT_PLACEHOLDER_NOT_FOUND)
            }
            ncm::cmd::WRITE_PLACEHOLDER => {
                let placeholder_id = placeholder_id_at(&input, 0)?;
                let offset = u64_at(&input, 16)?;
                let data = request.in_buffer_at(0).ok_or(RESULT_BAD_REQUEST)?;
                let placeholder = volume
                    .placeholders
                    .get_mut(&placeholder_id)
                    .ok_or(RESULT_PLACEHOLDER_NOT_FOUND)?;

                let end = offset
                    .checked_add(data.len() as u64)
                    .filter(|&end| end <= placeholder.size)
                    .ok_or(RESULT_BAD_REQUEST)?;
                let (start, end) = (
                    usize::try_from(offset).map_err(|_| RESULT_BAD_REQUEST)?,
                    usize::try_from(end).map_err(|_| RESULT_BAD_REQUEST)?,
                );
                if placeholder.data.len() < end {
                    placeholder.data.resize(end, 0);
                }
                placeholder.data[start..end].copy_from_slice(data);
                Ok(Response::new())
            }
            ncm::cmd::REGISTER => {
                let content_id = content_id_at(&input, 0)?;
                let placeholder_id = placeholder_id_at(&input, 16)?;
                if volume.contents.contains_key(&content_id) {
                    return Err(RESULT_CONTENT_ALREADY_EXISTS);
                }
                let placeholder = volume
                    .placeholders
                    .remove(&placeholder_id)
                    .ok_or(RESULT_PLACEHOLDER_NOT_FOUND)?;
                debug!(%content_id, bytes = placeholder.data.len(), "sim registered content");
                volume.contents.insert(content_id, placeholder.data);
                Ok(Response::new())
            }
            ncm::cmd::DELETE => {
                let content_id = content_id_at(&input, 0)?;
                volume
                    .contents
                    .remove(&content_id)
                    .map(|_| Response::new())
                    .ok_or(RESULT_CONTENT_NOT_FOUND)
            }
            ncm::cmd::HAS => {
                let content_id = content_id_at(&input, 0)?;
                let has = volume.contents.contains_key(&content_id);
                Ok(Response::new().with_output(vec![u8::from(has)]))
            }
            ncm::cmd::GET_PATH => {
                let content_id = content_id_at(&input, 0)?;
                if !volume.contents.contains_key(&content_id) {
                    return Err(RESULT_CONTENT_NOT_FOUND);
                }
                let path = content_path(self.storage_id, content_id);
                let out = request.out_buffer_at(0).ok_or(RESULT_BAD_REQUEST)?;
                if out.len() <= path.len() {
                    return Err(RESULT_BAD_REQUEST);
                }
                out[..path.len()].copy_from_slice(path.as_bytes());
                out[path.len()] = 0;
                Ok(Response::new())
            }
            _ => Err(RESULT_BAD_REQUEST),
        }
    }
}

struct MetaDatabaseSession {
    console: SimConsole,
    storage_id: StorageId,
}

impl ServiceSession for MetaDatabaseSession {
    fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
        let command = request.command();
        let mut state = self.console.state();
        state.record(Call {
            service: "IContentMetaDatabase",
            command,
        })?;

        let db = state.meta_database(self.storage_id);
        match command {
            ncm::cmd::META_DB_SET => {
                let key = ContentMetaKey::read_from(request.input_bytes())
                    .map_err(|_| RESULT_BAD_REQUEST)?;
                let record = request.in_buffer_at(0).ok_or(RESULT_BAD_REQUEST)?;
                db.staged.insert(key, record.to_vec());
                Ok(Response::new())
            }
            ncm::cmd::META_DB_COMMIT => {
                let staged: Vec<_> = db.staged.drain().collect();
                db.committed.extend(staged);
                Ok(Response::new())
            }
            _ => Err(RESULT_BAD_REQUEST),
        }
    }
}

// ── ns:am ─────────────────────────────────────────────────────────────

/// Title registry. Pushing onto an existing entry appends to it; a
/// replace is a delete followed by a push.
pub(crate) struct NsSession {
    console: SimConsole,
}

impl NsSession {
    pub(crate) fn new(console: SimConsole) -> Self {
        Self { console }
    }
}

impl ServiceSession for NsSession {
    fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
        let command = request.command();
        let mut state = self.console.state();
        state.record(Call {
            service: "ns:am",
            command,
        })?;

        let input = request.input_bytes().to_vec();
        match command {
            records::cmd::PUSH_APPLICATION_RECORD => {
                let event = input
                    .first()
                    .and_then(|&b| ApplicationEvent::from_wire_byte(b).ok())
                    .ok_or(RESULT_BAD_REQUEST)?;
                let title_id = u64_at(&input, 8)?;
                let raw = request.in_buffer_at(0).ok_or(RESULT_BAD_REQUEST)?;
                if raw.len() % ContentStorageRecord::SIZE != 0 {
                    return Err(RESULT_BAD_REQUEST);
                }
                let entry = state
                    .registry
                    .entry(title_id)
                    .or_insert_with(|| ApplicationRecord {
                        event,
                        raw: Vec::new(),
                    });
                entry.event = event;
                entry.raw.extend_from_slice(raw);
                Ok(Response::new())
            }
            records::cmd::LIST_APPLICATION_RECORD_CONTENT_META => {
                let offset = usize::try_from(u64_at(&input, 0)?).map_err(|_| RESULT_BAD_REQUEST)?;
                let title_id = u64_at(&input, 8)?;
                let entry = state
                    .registry
                    .get(&title_id)
                    .ok_or(RESULT_APPLICATION_RECORD_NOT_FOUND)?;
                let out = request.out_buffer_at(0).ok_or(RESULT_BAD_REQUEST)?;

                let start = offset
                    .saturating_mul(ContentStorageRecord::SIZE)
                    .min(entry.raw.len());
                let count = (entry.raw.len() - start).min(out.len()) / ContentStorageRecord::SIZE;
                let len = count * ContentStorageRecord::SIZE;
                out[..len].copy_from_slice(&entry.raw[start..start + len]);

                let count = i32::try_from(count).map_err(|_| RESULT_BAD_REQUEST)?;
                Ok(Response::new().with_output(count.to_le_bytes().to_vec()))
            }
            records::cmd::DELETE_APPLICATION_RECORD => {
                let title_id = u64_at(&input, 0)?;
                state
                    .registry
                    .remove(&title_id)
                    .map(|_| Response::new())
                    .ok_or(RESULT_APPLICATION_RECORD_NOT_FOUND)
            }
            records::cmd::INVALIDATE_APPLICATION_CONTROL_CACHE => {
                let title_id = u64_at(&input, 0)?;
                state.invalidated.push(title_id);
                Ok(Response::new())
            }
            _ => Err(RESULT_BAD_REQUEST),
        }
    }
}

// ── es ────────────────────────────────────────────────────────────────

pub(crate) struct EsSession {
    console: SimConsole,
}

impl EsSession {
    pub(crate) fn new(console: SimConsole) -> Self {
        Self { console }
    }
}

impl ServiceSession for EsSession {
    fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
        let command = request.command();
        let mut state = self.console.state();
        state.record(Call {
            service: "es",
            command,
        })?;

        match command {
            ticket::cmd::IMPORT_TICKET => {
                let ticket = request.in_buffer_at(0).ok_or(RESULT_BAD_REQUEST)?;
                let cert = request.in_buffer_at(1).ok_or(RESULT_BAD_REQUEST)?;
                state.tickets.push((ticket.to_vec(), cert.to_vec()));
                Ok(Response::new())
            }
            _ => Err(RESULT_BAD_REQUEST),
        }
    }
}
