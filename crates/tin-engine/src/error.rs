use tin_container::ContainerError;
use tin_ipc::IpcError;
use tin_wire::{ContentId, WireError};

/// Errors that abort an install.
///
/// ```text
/// ┌──────────────────┬──────────────────────────────────────────────────┐
/// │ Variant          │ Cause                                            │
/// ├──────────────────┼──────────────────────────────────────────────────┤
/// │ Ipc              │ A service call failed (carries the result code)  │
/// │ Wire             │ Malformed meta record or entry name              │
/// │ Container        │ Malformed package directory                      │
/// │ Io               │ Reading the package or a mounted content failed  │
/// │ MissingFile      │ An entry the package must contain is absent      │
/// │ MissingMetaFile  │ The mounted meta content holds no .cnmt file     │
/// │ ShortContent     │ A content stream ended before its declared size  │
/// │ ContentMissing   │ Registered content is not visible in storage     │
/// │ Cancelled        │ The step receiver was dropped mid-install        │
/// └──────────────────┴──────────────────────────────────────────────────┘
/// ```
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing file {name:?} in package")]
    MissingFile { name: String },

    #[error("meta content {content_id} contains no .cnmt file")]
    MissingMetaFile { content_id: ContentId },

    #[error("content {content_id} ended after {written} of {expected} bytes")]
    ShortContent {
        content_id: ContentId,
        expected: u64,
        written: u64,
    },

    #[error("content {content_id} is not present after registration")]
    ContentMissing { content_id: ContentId },

    #[error("install cancelled: step receiver dropped")]
    Cancelled,
}

impl InstallError {
    /// The remote result code, when the failure came from a service.
    pub fn result_code(&self) -> Option<tin_ipc::ResultCode> {
        match self {
            Self::Ipc(e) => e.code(),
            _ => None,
        }
    }
}
