use tin_container::BlobReader;
use tin_ipc::ResultExt;
use tin_wire::ContentId;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::error::InstallError;
use crate::ncm::{ContentStorage, RESULT_CONTENT_NOT_FOUND, RESULT_PLACEHOLDER_NOT_FOUND};
use crate::step::{Stage, StepSink};

/// Write one content into storage with all-or-nothing visibility.
///
/// ```text
///   GeneratePlaceHolderId
///   DeletePlaceHolder      (PlaceHolderNotFound allowed)
///   CreatePlaceHolder      size
///   WritePlaceHolder × n   offset 0, chunk, 2·chunk, …   ──▶ Progress
///   Delete                 (ContentNotFound allowed)
///   Register                                             ◀── commit point
/// ```
///
/// An interrupted run leaves an orphaned placeholder, which the next
/// attempt's delete removes. Returns the number of bytes written.
///
/// # Errors
///
/// - [`InstallError::ShortContent`] when `reader` ends before `size`
///   bytes; nothing is registered.
/// - Any IPC or read failure.
pub async fn install_content(
    storage: &ContentStorage,
    content_id: ContentId,
    mut reader: BlobReader,
    size: u64,
    chunk_size: usize,
    steps: &StepSink,
    stage: &Stage,
) -> Result<u64, InstallError> {
    let placeholder_id = storage.generate_placeholder_id()?;
    debug!(%content_id, %placeholder_id, size, "writing content");

    if storage
        .delete_placeholder(placeholder_id)
        .allow(RESULT_PLACEHOLDER_NOT_FOUND)?
        .is_some()
    {
        warn!(%placeholder_id, "removed stale placeholder");
    }
    storage.create_placeholder(content_id, placeholder_id, size)?;

    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut offset = 0u64;
    steps.progress(stage, 0, size).await?;
    while offset < size {
        let filled = fill(&mut reader, &mut buf).await?;
        if filled == 0 {
            break;
        }
        storage.write_placeholder(placeholder_id, offset, &buf[..filled])?;
        offset += filled as u64;
        steps.progress(stage, offset, size).await?;
    }

    if offset < size {
        return Err(InstallError::ShortContent {
            content_id,
            expected: size,
            written: offset,
        });
    }

    if storage
        .delete(content_id)
        .allow(RESULT_CONTENT_NOT_FOUND)?
        .is_some()
    {
        warn!(%content_id, "replaced previously registered content");
    }
    storage.register(content_id, placeholder_id)?;
    debug!(%content_id, bytes = offset, "registered content");

    Ok(offset)
}

/// Read until `buf` is full or the stream ends.
async fn fill(reader: &mut BlobReader, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use tin_container::{Blob, MemoryBlob};
    use tin_ipc::{Request, Response, ResultCode, Service, ServiceSession};
    use tin_wire::PlaceholderId;

    use super::*;
    use crate::ncm::{RESULT_PLACEHOLDER_ALREADY_EXISTS, cmd};

    const PLACEHOLDER: PlaceholderId = PlaceholderId::from_bytes([7; 16]);
    const CONTENT: ContentId = ContentId::from_bytes([0xC0; 16]);

    /// Storage that always hands out the same placeholder id, so a retry
    /// collides with the leftovers of the previous attempt.
    #[derive(Default)]
    struct FakeStorage {
        placeholders: Mutex<HashMap<[u8; 16], Vec<u8>>>,
        contents: Mutex<HashMap<[u8; 16], Vec<u8>>>,
        calls: Mutex<Vec<(u32, usize)>>,
    }

    impl ServiceSession for FakeStorage {
        fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
            let input = request.input_bytes().to_vec();
            let buf_len = request.in_buffer_at(0).map_or(0, <[u8]>::len);
            self.calls.lock().unwrap().push((request.command(), buf_len));
            let mut placeholders = self.placeholders.lock().unwrap();
            let mut contents = self.contents.lock().unwrap();
            let id = |at: usize| -> [u8; 16] { input[at..at + 16].try_into().unwrap() };

            match request.command() {
                cmd::GENERATE_PLACEHOLDER_ID => {
                    Ok(Response::new().with_output(PLACEHOLDER.as_bytes().to_vec()))
                }
                cmd::DELETE_PLACEHOLDER => placeholders
                    .remove(&id(0))
                    .map(|_| Response::new())
                    .ok_or(crate::ncm::RESULT_PLACEHOLDER_NOT_FOUND),
                cmd::CREATE_PLACEHOLDER => {
                    if placeholders.contains_key(&id(16)) {
                        return Err(RESULT_PLACEHOLDER_ALREADY_EXISTS);
                    }
                    placeholders.insert(id(16), Vec::new());
                    Ok(Response::new())
                }
                cmd::WRITE_PLACEHOLDER => {
                    let data = request.in_buffer_at(0).unwrap();
                    placeholders.get_mut(&id(0)).unwrap().extend_from_slice(data);
                    Ok(Response::new())
                }
                cmd::DELETE => contents
                    .remove(&id(0))
                    .map(|_| Response::new())
                    .ok_or(RESULT_CONTENT_NOT_FOUND),
                cmd::REGISTER => {
                    let data = placeholders.remove(&id(16)).unwrap();
                    contents.insert(id(0), data);
                    Ok(Response::new())
                }
                _ => Err(ResultCode::new(5, 0x7F)),
            }
        }
    }

    fn storage() -> (Arc<FakeStorage>, ContentStorage) {
        let fake = Arc::new(FakeStorage::default());
        let storage = ContentStorage::new(Service::new("IContentStorage", fake.clone()));
        (fake, storage)
    }

    async fn write(storage: &ContentStorage, data: &[u8], size: u64) -> Result<u64, InstallError> {
        let blob = MemoryBlob::new(data.to_vec());
        let (steps, mut rx) = StepSink::channel(64);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let stage = steps.start("content").await?;
        let reader = blob.open_range(0, blob.size())?;
        let result = install_content(storage, CONTENT, reader, size, 4, &steps, &stage).await;
        drop(steps);
        drain.await.unwrap();
        result
    }

    #[tokio::test]
    async fn writes_in_chunks_then_registers() {
        let (fake, storage) = storage();
        let written = write(&storage, b"0123456789", 10).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(fake.contents.lock().unwrap()[CONTENT.as_bytes()], b"0123456789");
        assert!(fake.placeholders.lock().unwrap().is_empty());
        assert_eq!(
            *fake.calls.lock().unwrap(),
            vec![
                (cmd::GENERATE_PLACEHOLDER_ID, 0),
                (cmd::DELETE_PLACEHOLDER, 0),
                (cmd::CREATE_PLACEHOLDER, 0),
                (cmd::WRITE_PLACEHOLDER, 4),
                (cmd::WRITE_PLACEHOLDER, 4),
                (cmd::WRITE_PLACEHOLDER, 2),
                (cmd::DELETE, 0),
                (cmd::REGISTER, 0),
            ]
        );
    }

    #[tokio::test]
    async fn short_stream_leaves_placeholder_for_retry() {
        let (fake, storage) = storage();
        let err = write(&storage, b"012345", 10).await.unwrap_err();
        assert!(matches!(
            err,
            InstallError::ShortContent { expected: 10, written: 6, .. }
        ));
        assert!(fake.contents.lock().unwrap().is_empty());
        assert_eq!(fake.placeholders.lock().unwrap().len(), 1);

        write(&storage, b"0123456789", 10).await.unwrap();
        assert!(fake.placeholders.lock().unwrap().is_empty());
        assert_eq!(fake.contents.lock().unwrap()[CONTENT.as_bytes()].len(), 10);
    }

    #[tokio::test]
    async fn reinstall_replaces_registered_content() {
        let (fake, storage) = storage();
        write(&storage, b"old!", 4).await.unwrap();
        write(&storage, b"new!", 4).await.unwrap();
        assert_eq!(fake.contents.lock().unwrap()[CONTENT.as_bytes()], b"new!");
    }
}
