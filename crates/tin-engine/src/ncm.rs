//! Content manager service (`ncm`) and the two session types it hands
//! out: a content storage per volume and a content meta database per
//! volume.

use bytes::BufMut;
use tin_ipc::{BufferAttr, IpcError, Request, ResultCode, Service, ServiceManager};
use tin_wire::{ContentId, ContentMetaKey, PlaceholderId, StorageId, WireError};

use crate::error::InstallError;

/// Result module of the content manager.
pub const MODULE: u32 = 5;

pub const RESULT_PLACEHOLDER_ALREADY_EXISTS: ResultCode = ResultCode::new(MODULE, 2);
pub const RESULT_PLACEHOLDER_NOT_FOUND: ResultCode = ResultCode::new(MODULE, 3);
pub const RESULT_CONTENT_ALREADY_EXISTS: ResultCode = ResultCode::new(MODULE, 4);
pub const RESULT_CONTENT_NOT_FOUND: ResultCode = ResultCode::new(MODULE, 5);

/// Size of the path buffer filled by `GetPath`.
pub const PATH_SIZE: usize = 0x301;

/// Command ids.
pub mod cmd {
    pub const OPEN_CONTENT_STORAGE: u32 = 4;
    pub const OPEN_CONTENT_META_DATABASE: u32 = 5;

    pub const GENERATE_PLACEHOLDER_ID: u32 = 0;
    pub const CREATE_PLACEHOLDER: u32 = 1;
    pub const DELETE_PLACEHOLDER: u32 = 2;
    pub const WRITE_PLACEHOLDER: u32 = 4;
    pub const REGISTER: u32 = 5;
    pub const DELETE: u32 = 6;
    pub const HAS: u32 = 7;
    pub const GET_PATH: u32 = 8;

    pub const META_DB_SET: u32 = 0;
    pub const META_DB_COMMIT: u32 = 15;
}

/// The `ncm` service itself.
#[derive(Clone, Debug)]
pub struct ContentManager {
    service: Service,
}

impl ContentManager {
    /// # Errors
    ///
    /// [`IpcError::ServiceUnavailable`] when `ncm` cannot be opened.
    pub fn open(services: &dyn ServiceManager) -> Result<Self, IpcError> {
        let session = services.get_service("ncm")?;
        Ok(Self {
            service: Service::new("ncm", session),
        })
    }

    /// # Errors
    ///
    /// Any IPC failure.
    pub fn open_content_storage(&self, storage_id: StorageId) -> Result<ContentStorage, IpcError> {
        let service = self.service.dispatch_object(
            cmd::OPEN_CONTENT_STORAGE,
            vec![storage_id.to_wire_byte()],
            "IContentStorage",
        )?;
        Ok(ContentStorage { service })
    }

    /// # Errors
    ///
    /// Any IPC failure.
    pub fn open_content_meta_database(
        &self,
        storage_id: StorageId,
    ) -> Result<ContentMetaDatabase, IpcError> {
        let service = self.service.dispatch_object(
            cmd::OPEN_CONTENT_META_DATABASE,
            vec![storage_id.to_wire_byte()],
            "IContentMetaDatabase",
        )?;
        Ok(ContentMetaDatabase { service })
    }
}

// ── ContentStorage ────────────────────────────────────────────────────

/// Content-addressed storage on one volume.
///
/// Content becomes visible only through [`register`](Self::register);
/// everything before that happens in a placeholder.
#[derive(Clone, Debug)]
pub struct ContentStorage {
    service: Service,
}

impl ContentStorage {
    pub fn new(service: Service) -> Self {
        Self { service }
    }

    /// # Errors
    ///
    /// Any IPC failure.
    pub fn generate_placeholder_id(&self) -> Result<PlaceholderId, InstallError> {
        let out = self
            .service
            .dispatch_out(cmd::GENERATE_PLACEHOLDER_ID, tin_wire::id::ID_SIZE)?;
        Ok(PlaceholderId::read_from(&out)?)
    }

    /// # Errors
    ///
    /// [`WireError::ContentTooLarge`] when `size` does not fit a signed
    /// 64-bit value, or any IPC failure.
    pub fn create_placeholder(
        &self,
        content_id: ContentId,
        placeholder_id: PlaceholderId,
        size: u64,
    ) -> Result<(), InstallError> {
        let size = i64::try_from(size).map_err(|_| WireError::ContentTooLarge { size })?;
        let mut input = Vec::with_capacity(40);
        input.put_slice(content_id.as_bytes());
        input.put_slice(placeholder_id.as_bytes());
        input.put_i64_le(size);
        self.service.dispatch_in(cmd::CREATE_PLACEHOLDER, input)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Any IPC failure, including `PlaceHolderNotFound`.
    pub fn delete_placeholder(&self, placeholder_id: PlaceholderId) -> Result<(), IpcError> {
        self.service
            .dispatch_in(cmd::DELETE_PLACEHOLDER, placeholder_id.as_bytes().to_vec())
    }

    /// # Errors
    ///
    /// Any IPC failure.
    pub fn write_placeholder(
        &self,
        placeholder_id: PlaceholderId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), IpcError> {
        let mut input = Vec::with_capacity(24);
        input.put_slice(placeholder_id.as_bytes());
        input.put_u64_le(offset);
        self.service
            .call(
                Request::new(cmd::WRITE_PLACEHOLDER)
                    .input(input)
                    .in_buffer(data, BufferAttr::MAP_ALIAS),
            )
            .map(|_| ())
    }

    /// Atomically turn a placeholder into permanent content.
    ///
    /// # Errors
    ///
    /// Any IPC failure, including `ContentAlreadyExists`.
    pub fn register(
        &self,
        content_id: ContentId,
        placeholder_id: PlaceholderId,
    ) -> Result<(), IpcError> {
        let mut input = Vec::with_capacity(32);
        input.put_slice(content_id.as_bytes());
        input.put_slice(placeholder_id.as_bytes());
        self.service.dispatch_in(cmd::REGISTER, input)
    }

    /// # Errors
    ///
    /// Any IPC failure, including `ContentNotFound`.
    pub fn delete(&self, content_id: ContentId) -> Result<(), IpcError> {
        self.service
            .dispatch_in(cmd::DELETE, content_id.as_bytes().to_vec())
    }

    /// # Errors
    ///
    /// Any IPC failure.
    pub fn has(&self, content_id: ContentId) -> Result<bool, IpcError> {
        let response = self.service.call(
            Request::new(cmd::HAS)
                .input(content_id.as_bytes().to_vec())
                .output_size(1),
        )?;
        Ok(response.output()[0] != 0)
    }

    /// Filesystem path of registered content, for mounting.
    ///
    /// # Errors
    ///
    /// Any IPC failure, including `ContentNotFound`.
    pub fn get_path(&self, content_id: ContentId) -> Result<String, IpcError> {
        let mut path = [0u8; PATH_SIZE];
        self.service.call(
            Request::new(cmd::GET_PATH)
                .input(content_id.as_bytes().to_vec())
                .out_buffer(&mut path, BufferAttr::POINTER | BufferAttr::FIXED_SIZE),
        )?;
        let end = path.iter().position(|&b| b == 0).unwrap_or(PATH_SIZE);
        Ok(String::from_utf8_lossy(&path[..end]).into_owned())
    }
}

// ── ContentMetaDatabase ───────────────────────────────────────────────

/// Key/value store of installed meta records on one volume.
#[derive(Clone, Debug)]
pub struct ContentMetaDatabase {
    service: Service,
}

impl ContentMetaDatabase {
    pub fn new(service: Service) -> Self {
        Self { service }
    }

    /// Stage `record` under `key`. Not visible until [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Any IPC failure.
    pub fn set(&self, key: &ContentMetaKey, record: &[u8]) -> Result<(), IpcError> {
        self.service
            .call(
                Request::new(cmd::META_DB_SET)
                    .input(key.to_bytes().to_vec())
                    .in_buffer(record, BufferAttr::MAP_ALIAS),
            )
            .map(|_| ())
    }

    /// # Errors
    ///
    /// Any IPC failure.
    pub fn commit(&self) -> Result<(), IpcError> {
        self.service.dispatch_in(cmd::META_DB_COMMIT, Vec::new())
    }
}
