use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::blob::{Blob, BlobReader, read_range};
use crate::error::ContainerError;

/// Magic number: ASCII "PFS0".
pub const PFS0_MAGIC: [u8; 4] = *b"PFS0";

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 0x10;

/// Size of one entry in the file table.
pub const ENTRY_SIZE: usize = 0x18;

/// Sanity limit on the number of entries.
pub const MAX_ENTRIES: u32 = 0x1000;

/// Sanity limit on the string table size.
pub const MAX_STRING_TABLE: u32 = 0x10_0000;

/// PFS0 header, the first 16 bytes of a package.
///
/// ```text
/// ┌────────┬─────────┬──────────────────────────────────┐
/// │ Offset │ Size    │ Description                      │
/// ├────────┼─────────┼──────────────────────────────────┤
/// │ 0x00   │ 4 bytes │ Magic: "PFS0"                    │
/// │ 0x04   │ 4 bytes │ Entry count                      │
/// │ 0x08   │ 4 bytes │ String table size                │
/// │ 0x0C   │ 4 bytes │ Reserved                         │
/// └────────┴─────────┴──────────────────────────────────┘
/// ```
///
/// The entry table (0x18 bytes per entry) and the string table follow;
/// file data starts right after the string table. Entry data offsets are
/// relative to that data region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pfs0Header {
    pub entry_count: u32,
    pub string_table_size: u32,
}

impl Pfs0Header {
    /// # Errors
    ///
    /// - [`ContainerError::Truncated`] if `buf` is shorter than 16 bytes.
    /// - [`ContainerError::InvalidMagic`] if the magic is not "PFS0".
    /// - [`ContainerError::TooManyEntries`] / [`ContainerError::StringTableTooLarge`]
    ///   when the tables exceed the sanity limits.
    pub fn read_from(buf: &[u8]) -> Result<Self, ContainerError> {
        if buf.len() < HEADER_SIZE {
            return Err(ContainerError::Truncated {
                needed: HEADER_SIZE as u64,
                available: buf.len() as u64,
            });
        }

        if buf[0..4] != PFS0_MAGIC {
            return Err(ContainerError::InvalidMagic {
                found: [buf[0], buf[1], buf[2], buf[3]],
            });
        }

        let entry_count = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let string_table_size = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);

        if entry_count > MAX_ENTRIES {
            return Err(ContainerError::TooManyEntries {
                count: entry_count,
                limit: MAX_ENTRIES,
            });
        }
        if string_table_size > MAX_STRING_TABLE {
            return Err(ContainerError::StringTableTooLarge {
                size: string_table_size,
                limit: MAX_STRING_TABLE,
            });
        }

        Ok(Self {
            entry_count,
            string_table_size,
        })
    }

    /// Bytes occupied by the entry table plus the string table.
    pub fn tables_size(self) -> u64 {
        u64::from(self.entry_count) * ENTRY_SIZE as u64 + u64::from(self.string_table_size)
    }

    /// Absolute offset where file data begins.
    pub fn data_offset(self) -> u64 {
        HEADER_SIZE as u64 + self.tables_size()
    }
}

/// Location of one file, resolved to absolute container offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
struct RawEntry {
    name: String,
    offset: u64,
    size: u64,
}

/// Decode the entry and string tables (`tables` starts right after the
/// header) and resolve every entry against `container_size`.
fn read_tables(
    header: Pfs0Header,
    tables: &[u8],
    container_size: u64,
) -> Result<Vec<RawEntry>, ContainerError> {
    let count = header.entry_count as usize;
    let strings = &tables[count * ENTRY_SIZE..];
    let mut entries: Vec<RawEntry> = Vec::with_capacity(count);

    for (index, raw) in tables[..count * ENTRY_SIZE].chunks_exact(ENTRY_SIZE).enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(&raw[0..8]);
        let relative = u64::from_le_bytes(word);
        word.copy_from_slice(&raw[8..16]);
        let size = u64::from_le_bytes(word);
        let name_offset = u32::from_le_bytes([raw[16], raw[17], raw[18], raw[19]]) as usize;

        let name = strings
            .get(name_offset..)
            .and_then(|s| s.iter().position(|&b| b == 0).map(|end| &s[..end]))
            .and_then(|s| std::str::from_utf8(s).ok())
            .filter(|s| !s.is_empty())
            .ok_or(ContainerError::InvalidName { index })?
            .to_string();

        let offset = header.data_offset().checked_add(relative);
        let in_bounds = offset
            .and_then(|o| o.checked_add(size))
            .is_some_and(|end| end <= container_size);
        if !in_bounds {
            return Err(ContainerError::EntryOutOfBounds {
                name,
                offset: relative,
                size,
                container_size,
            });
        }

        if entries.iter().any(|e| e.name == name) {
            return Err(ContainerError::DuplicateEntry { name });
        }

        entries.push(RawEntry {
            name,
            offset: offset.unwrap_or_default(),
            size,
        });
    }

    Ok(entries)
}

// ── Streaming container ───────────────────────────────────────────────

/// One named file inside a container.
///
/// Holds a handle to the container's blob; nothing is read until
/// [`open`](Entry::open) or [`read_all`](Entry::read_all) is called.
#[derive(Clone)]
pub struct Entry {
    name: String,
    offset: u64,
    size: u64,
    blob: Arc<dyn Blob>,
}

impl Entry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute offset of the entry's data within the container.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the entry's bytes.
    ///
    /// # Errors
    ///
    /// Any error from the underlying blob.
    pub fn open(&self) -> io::Result<BlobReader> {
        self.blob.open_range(self.offset, self.size)
    }

    /// Read the entry into memory. Meant for small entries (tickets,
    /// certificates); content should be streamed with [`open`](Entry::open).
    ///
    /// # Errors
    ///
    /// Any error from the underlying blob.
    pub async fn read_all(&self) -> io::Result<Bytes> {
        read_range(self.blob.as_ref(), self.offset, self.size)
            .await
            .map(Bytes::from)
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// A parsed package: a map of entry name to [`Entry`].
///
/// ```text
/// ┌─────────────┐   parse()   ┌─────────────────────────────────┐
/// │ Arc<Blob>   │────────────▶│ files: name ──▶ Entry{off,size} │
/// └─────────────┘             └─────────────────────────────────┘
/// ```
///
/// Only the header and the two tables are read during parsing. Entry
/// order on disk is not preserved; callers select entries by suffix.
#[derive(Clone, Debug)]
pub struct Container {
    files: BTreeMap<String, Entry>,
}

impl Container {
    /// Read the directory of a package.
    ///
    /// # Errors
    ///
    /// Any [`ContainerError`] for a malformed directory, or an I/O error
    /// from the blob.
    pub async fn parse(blob: Arc<dyn Blob>) -> Result<Self, ContainerError> {
        let container_size = blob.size();
        if container_size < HEADER_SIZE as u64 {
            return Err(ContainerError::Truncated {
                needed: HEADER_SIZE as u64,
                available: container_size,
            });
        }

        let header_bytes = read_range(blob.as_ref(), 0, HEADER_SIZE as u64).await?;
        let header = Pfs0Header::read_from(&header_bytes)?;

        if header.data_offset() > container_size {
            return Err(ContainerError::Truncated {
                needed: header.data_offset(),
                available: container_size,
            });
        }

        let tables = read_range(blob.as_ref(), HEADER_SIZE as u64, header.tables_size()).await?;
        let files = read_tables(header, &tables, container_size)?
            .into_iter()
            .map(|raw| {
                let entry = Entry {
                    name: raw.name.clone(),
                    offset: raw.offset,
                    size: raw.size,
                    blob: Arc::clone(&blob),
                };
                (raw.name, entry)
            })
            .collect::<BTreeMap<_, _>>();

        debug!(entries = files.len(), size = container_size, "parsed container");
        Ok(Self { files })
    }

    pub fn files(&self) -> &BTreeMap<String, Entry> {
        &self.files
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.files.get(name)
    }

    /// Entries whose name ends with `suffix`, in name order.
    pub fn with_suffix<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.files
            .values()
            .filter(move |e| e.name.ends_with(suffix))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// ── In-memory image ───────────────────────────────────────────────────

/// A PFS0 image already in memory, with borrowed file contents.
///
/// Used for small images such as the section of a mounted meta content
/// that holds the `.cnmt` file.
#[derive(Clone, Debug)]
pub struct Pfs0Image<'a> {
    files: BTreeMap<String, &'a [u8]>,
}

impl<'a> Pfs0Image<'a> {
    /// # Errors
    ///
    /// Any [`ContainerError`] for a malformed image.
    pub fn parse(buf: &'a [u8]) -> Result<Self, ContainerError> {
        let header = Pfs0Header::read_from(buf)?;
        let container_size = buf.len() as u64;

        if header.data_offset() > container_size {
            return Err(ContainerError::Truncated {
                needed: header.data_offset(),
                available: container_size,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let tables = &buf[HEADER_SIZE..header.data_offset() as usize];
        let files = read_tables(header, tables, container_size)?
            .into_iter()
            .map(|raw| {
                #[allow(clippy::cast_possible_truncation)]
                let data = &buf[raw.offset as usize..(raw.offset + raw.size) as usize];
                (raw.name, data)
            })
            .collect();

        Ok(Self { files })
    }

    pub fn files(&self) -> &BTreeMap<String, &'a [u8]> {
        &self.files
    }

    pub fn get(&self, name: &str) -> Option<&'a [u8]> {
        self.files.get(name).copied()
    }
}
