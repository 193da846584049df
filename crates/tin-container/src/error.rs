/// Errors raised while reading a PFS0 container.
///
/// ```text
///   ContainerError
///   ├── InvalidMagic        ← first four bytes are not "PFS0"
///   ├── Truncated           ← header or tables run past the end
///   ├── TooManyEntries      ← entry count above the sanity limit
///   ├── StringTableTooLarge ← string table above the sanity limit
///   ├── InvalidName         ← name offset outside the table or not UTF-8
///   ├── DuplicateEntry      ← two entries share a name
///   ├── EntryOutOfBounds    ← entry data extends past the container
///   └── Io(std::io::Error)  ← from the underlying blob
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("invalid magic: expected \"PFS0\", got {found:02X?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("container truncated: need {needed} bytes, have {available}")]
    Truncated { needed: u64, available: u64 },

    #[error("container declares {count} entries, limit is {limit}")]
    TooManyEntries { count: u32, limit: u32 },

    #[error("string table of {size} bytes exceeds limit {limit}")]
    StringTableTooLarge { size: u32, limit: u32 },

    #[error("entry {index} has an invalid name")]
    InvalidName { index: usize },

    #[error("duplicate entry {name:?}")]
    DuplicateEntry { name: String },

    #[error("entry {name:?} ({size} bytes at {offset}) extends past the container ({container_size} bytes)")]
    EntryOutOfBounds {
        name: String,
        offset: u64,
        size: u64,
        container_size: u64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
