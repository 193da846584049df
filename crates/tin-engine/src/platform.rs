use std::io;
use std::sync::Arc;

use tin_ipc::ServiceManager;

/// A content mounted as a read-only directory.
pub trait MountedContent: Send {
    /// Names of the files at the root of the mount.
    ///
    /// # Errors
    ///
    /// Any error from the mount.
    fn list(&self) -> io::Result<Vec<String>>;

    /// # Errors
    ///
    /// [`io::ErrorKind::NotFound`] when `name` does not exist.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Mounts registered content by the path the storage service reports
/// for it.
pub trait ContentMounter: Send + Sync {
    /// # Errors
    ///
    /// Any error from the filesystem layer, e.g. when the path does not
    /// name a mountable content.
    fn mount(&self, path: &str) -> io::Result<Box<dyn MountedContent>>;
}

/// Everything the engine needs from the console, passed in explicitly.
///
/// ```text
///   Platform
///   ├── services ── opens "ncm", "ns:am", "es"
///   └── mounter  ── reads files out of installed meta content
/// ```
#[derive(Clone)]
pub struct Platform {
    pub services: Arc<dyn ServiceManager>,
    pub mounter: Arc<dyn ContentMounter>,
}

impl Platform {
    pub fn new(services: Arc<dyn ServiceManager>, mounter: Arc<dyn ContentMounter>) -> Self {
        Self { services, mounter }
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
