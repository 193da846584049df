use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Streaming reader over one byte range of a blob.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// A seekable, streamable byte source with a known length.
///
/// The container reader never holds the whole package in memory: it
/// opens short ranges for the directory tables and hands each entry a
/// reader positioned at its own offset. Every call to
/// [`open_range`](Blob::open_range) returns an independent reader, so
/// entries can be streamed one after another without sharing a cursor.
///
/// ```text
///   Blob ──open_range(offset, len)──▶ BlobReader (AsyncRead, len bytes)
/// ```
pub trait Blob: Send + Sync {
    /// Total length in bytes.
    fn size(&self) -> u64;

    /// Open a reader over `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`io::ErrorKind::InvalidInput`] when the range extends past
    /// [`size`](Blob::size), or any error from the backing store.
    fn open_range(&self, offset: u64, len: u64) -> io::Result<BlobReader>;
}

fn check_range(offset: u64, len: u64, size: u64) -> io::Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("range {offset}+{len} outside blob of {size} bytes"),
        )),
    }
}

/// Read a whole range into memory.
///
/// # Errors
///
/// Any error from [`Blob::open_range`] or the reader.
pub async fn read_range(blob: &dyn Blob, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    let mut reader = blob.open_range(offset, len)?;
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    reader.read_to_end(&mut buf).await?;
    if (buf.len() as u64) < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("range {offset}+{len} ended after {} bytes", buf.len()),
        ));
    }
    Ok(buf)
}

// ── MemoryBlob ────────────────────────────────────────────────────────

/// Blob over bytes already in memory. Ranges share the buffer.
#[derive(Clone, Debug)]
pub struct MemoryBlob {
    data: Bytes,
}

impl MemoryBlob {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl Blob for MemoryBlob {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn open_range(&self, offset: u64, len: u64) -> io::Result<BlobReader> {
        check_range(offset, len, self.size())?;
        #[allow(clippy::cast_possible_truncation)]
        let (start, end) = (offset as usize, (offset + len) as usize);
        Ok(Box::pin(io::Cursor::new(self.data.slice(start..end))))
    }
}

// ── FileBlob ──────────────────────────────────────────────────────────

/// Blob backed by a file on disk. Each range opens its own handle.
#[derive(Clone, Debug)]
pub struct FileBlob {
    path: PathBuf,
    size: u64,
}

impl FileBlob {
    /// # Errors
    ///
    /// Any error from reading the file's metadata.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = std::fs::metadata(&path)?.len();
        Ok(Self { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Blob for FileBlob {
    fn size(&self) -> u64 {
        self.size
    }

    fn open_range(&self, offset: u64, len: u64) -> io::Result<BlobReader> {
        check_range(offset, len, self.size)?;
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::pin(tokio::fs::File::from_std(file).take(len)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn memory_blob_reads_range() {
        let blob = MemoryBlob::new(b"0123456789".to_vec());
        let bytes = read_range(&blob, 3, 4).await.unwrap();
        assert_eq!(bytes, b"3456");
    }

    #[tokio::test]
    async fn memory_blob_rejects_out_of_range() {
        let blob = MemoryBlob::new(b"abc".to_vec());
        let err = blob.open_range(2, 2).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(blob.open_range(u64::MAX, 1).is_err());
    }

    #[tokio::test]
    async fn file_blob_reads_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello, container").unwrap();
        file.flush().unwrap();

        let blob = FileBlob::open(file.path()).unwrap();
        assert_eq!(blob.size(), 16);
        let bytes = read_range(&blob, 7, 9).await.unwrap();
        assert_eq!(bytes, b"container");
    }
}
