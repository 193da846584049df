use crate::enums::{ContentMetaType, ContentType, StorageId};
use crate::error::WireError;
use crate::id::ContentId;
use crate::layout::{
    ContentInfo, ContentMetaKey, ContentStorageRecord, InstalledContentMetaHeader,
    PackagedContentInfo, PackagedContentMetaHeader, u32_at,
};

/// Offset of `required_system_version` inside the Application and Patch
/// extended headers.
pub const REQUIRED_SYSTEM_VERSION_OFFSET: usize = 0x08;

/// Offset of `extended_data_size` inside the Patch extended header.
pub const PATCH_EXTENDED_DATA_SIZE_OFFSET: usize = 0x0C;

/// Size of one content meta info entry (only present for system updates).
pub const CONTENT_META_INFO_SIZE: usize = 0x10;

/// Canonical registry id for a title.
///
/// Applications, their patches and their add-on content all share one
/// application record, keyed by the application's own id:
///
/// ```text
/// ┌──────────────┬─────────────────────────────────┐
/// │ Meta type    │ Base title id                   │
/// ├──────────────┼─────────────────────────────────┤
/// │ Patch        │ title_id ^ 0x800                │
/// │ AddOnContent │ (title_id ^ 0x1000) & !0xFFF    │
/// │ anything else│ title_id                        │
/// └──────────────┴─────────────────────────────────┘
/// ```
#[must_use]
pub fn base_title_id(title_id: u64, meta_type: ContentMetaType) -> u64 {
    match meta_type {
        ContentMetaType::Patch => title_id ^ 0x800,
        ContentMetaType::AddOnContent => (title_id ^ 0x1000) & !0xFFF,
        _ => title_id,
    }
}

/// Bounds-checked sub-slice; reports the absolute offset on failure.
fn region(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], WireError> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(WireError::UnexpectedEof {
            offset,
            needed: len,
            available: buf.len().saturating_sub(offset),
        })
}

// ── Packaged form ─────────────────────────────────────────────────────

/// Borrowed view over a packaged meta blob.
///
/// ```text
/// ┌──────────────────────────────────────────┐
/// │ PackagedContentMetaHeader   (0x20)       │
/// │ extended header             (variable)   │
/// │ PackagedContentInfo × content_count      │
/// │ content meta info × content_meta_count   │
/// │ extended data               (Patch only) │
/// │ digest                      (0x20)       │
/// └──────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug)]
pub struct PackagedContentMeta<'a> {
    pub header: PackagedContentMetaHeader,
    pub extended_header: &'a [u8],
    pub contents: Vec<PackagedContentInfo>,
    pub extended_data: &'a [u8],
}

impl<'a> PackagedContentMeta<'a> {
    /// Parse the packaged form. Trailing bytes (the digest) are ignored.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] when a declared region runs past the
    /// end of `buf`, or [`WireError::InvalidEnumValue`] for unknown enum
    /// bytes in the header or a content info.
    pub fn parse(buf: &'a [u8]) -> Result<Self, WireError> {
        let header = PackagedContentMetaHeader::read_from(buf)?;

        let mut offset = PackagedContentMetaHeader::SIZE;
        let extended_header = region(buf, offset, usize::from(header.extended_header_size))?;
        offset += extended_header.len();

        let count = usize::from(header.content_count);
        let table = region(buf, offset, count * PackagedContentInfo::SIZE)?;
        let contents = table
            .chunks_exact(PackagedContentInfo::SIZE)
            .map(PackagedContentInfo::read_from)
            .collect::<Result<Vec<_>, _>>()?;
        offset += table.len();

        offset += usize::from(header.content_meta_count) * CONTENT_META_INFO_SIZE;

        let extended_data_size = extended_data_size(header.meta_type, extended_header);
        let extended_data = region(buf, offset, extended_data_size)?;

        Ok(Self {
            header,
            extended_header,
            contents,
            extended_data,
        })
    }

    #[must_use]
    pub fn key(&self) -> ContentMetaKey {
        ContentMetaKey {
            title_id: self.header.title_id,
            version: self.header.version,
            meta_type: self.header.meta_type,
            install_type: self.header.install_type,
        }
    }
}

/// Size of the trailing extended data region.
///
/// Only patches carry one; its size sits in the patch extended header.
/// A header too short to hold the field means there is no region.
fn extended_data_size(meta_type: ContentMetaType, extended_header: &[u8]) -> usize {
    if meta_type != ContentMetaType::Patch
        || extended_header.len() < PATCH_EXTENDED_DATA_SIZE_OFFSET + 4
    {
        return 0;
    }
    u32_at(extended_header, PATCH_EXTENDED_DATA_SIZE_OFFSET) as usize
}

// ── Installed form ────────────────────────────────────────────────────

/// The meta blob itself, which becomes the first content info of the
/// installed record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaContent {
    pub content_id: ContentId,
    pub size: u64,
}

/// Output of [`build_install_record`]: the bytes to store in the meta
/// database plus everything the orchestrator needs to finish the title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallRecord {
    pub key: ContentMetaKey,
    pub base_title_id: u64,
    /// Installed record bytes, ready for `ContentMetaDatabase::set`.
    pub data: Vec<u8>,
    /// Content still to be written to storage, in packaged order. Never
    /// contains the meta blob or delta fragments.
    pub contents: Vec<ContentInfo>,
}

impl InstallRecord {
    pub fn content_ids(&self) -> impl Iterator<Item = ContentId> + '_ {
        self.contents.iter().map(|c| c.content_id)
    }

    #[must_use]
    pub fn storage_record(&self, storage_id: StorageId) -> ContentStorageRecord {
        ContentStorageRecord {
            key: self.key,
            storage_id,
        }
    }
}

/// Build the installed meta record from a packaged meta blob.
///
/// ```text
/// ┌──────────────────────────────────────────────┐
/// │ InstalledContentMetaHeader          (0x08)   │
/// │ extended header (verbatim, RSV zeroed)       │
/// │ ContentInfo for the meta blob       (0x18)   │
/// │ ContentInfo × kept entries          (0x18)   │
/// │ extended data (Patch only, verbatim)         │
/// └──────────────────────────────────────────────┘
/// ```
///
/// `DeltaFragment` entries are dropped, as are the content meta infos of
/// a system update. For Application and Patch the
/// `required_system_version` of the copied extended header is zeroed.
/// The function performs no I/O.
///
/// # Errors
///
/// - Any parse error from [`PackagedContentMeta::parse`].
/// - [`WireError::TooManyContents`] when the kept entries plus the meta
///   blob overflow the 16-bit count.
/// - [`WireError::ContentTooLarge`] when `meta.size` exceeds 40 bits.
pub fn build_install_record(
    packaged: &[u8],
    meta: &MetaContent,
    storage_id: StorageId,
) -> Result<InstallRecord, WireError> {
    let parsed = PackagedContentMeta::parse(packaged)?;
    let header = &parsed.header;

    let kept: Vec<ContentInfo> = parsed
        .contents
        .iter()
        .filter(|c| c.info.content_type != ContentType::DeltaFragment)
        .map(|c| c.info.clone())
        .collect();

    let content_count = u16::try_from(kept.len() + 1)
        .map_err(|_| WireError::TooManyContents { count: kept.len() + 1 })?;

    let extended_header_size = parsed.extended_header.len();
    let total = InstalledContentMetaHeader::SIZE
        + extended_header_size
        + usize::from(content_count) * ContentInfo::SIZE
        + parsed.extended_data.len();
    let mut data = vec![0u8; total];

    InstalledContentMetaHeader {
        extended_header_size: header.extended_header_size,
        content_count,
        // Content meta infos (system updates only) are not carried over.
        content_meta_count: 0,
        attributes: header.attributes,
        storage_id,
    }
    .write_to(&mut data)?;

    let mut offset = InstalledContentMetaHeader::SIZE;
    let extended = &mut data[offset..offset + extended_header_size];
    extended.copy_from_slice(parsed.extended_header);
    if matches!(
        header.meta_type,
        ContentMetaType::Application | ContentMetaType::Patch
    ) && extended.len() >= REQUIRED_SYSTEM_VERSION_OFFSET + 4
    {
        extended[REQUIRED_SYSTEM_VERSION_OFFSET..REQUIRED_SYSTEM_VERSION_OFFSET + 4].fill(0);
    }
    offset += extended_header_size;

    ContentInfo {
        content_id: meta.content_id,
        size: meta.size,
        attributes: 0,
        content_type: ContentType::Meta,
        id_offset: 0,
    }
    .write_to(&mut data[offset..])?;
    offset += ContentInfo::SIZE;

    for info in &kept {
        info.write_to(&mut data[offset..])?;
        offset += ContentInfo::SIZE;
    }

    data[offset..].copy_from_slice(parsed.extended_data);

    Ok(InstallRecord {
        key: parsed.key(),
        base_title_id: base_title_id(header.title_id, header.meta_type),
        data,
        contents: kept,
    })
}

/// Decoded view of an installed meta record, as stored in the database.
#[derive(Clone, Debug)]
pub struct InstalledContentMeta<'a> {
    pub header: InstalledContentMetaHeader,
    pub extended_header: &'a [u8],
    pub contents: Vec<ContentInfo>,
    /// Everything after the content (and content meta) infos.
    pub extended_data: &'a [u8],
}

impl<'a> InstalledContentMeta<'a> {
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] or [`WireError::InvalidEnumValue`].
    pub fn parse(buf: &'a [u8]) -> Result<Self, WireError> {
        let header = InstalledContentMetaHeader::read_from(buf)?;

        let mut offset = InstalledContentMetaHeader::SIZE;
        let extended_header = region(buf, offset, usize::from(header.extended_header_size))?;
        offset += extended_header.len();

        let table = region(
            buf,
            offset,
            usize::from(header.content_count) * ContentInfo::SIZE,
        )?;
        let contents = table
            .chunks_exact(ContentInfo::SIZE)
            .map(ContentInfo::read_from)
            .collect::<Result<Vec<_>, _>>()?;
        offset += table.len();

        let meta_infos = region(
            buf,
            offset,
            usize::from(header.content_meta_count) * CONTENT_META_INFO_SIZE,
        )?;
        offset += meta_infos.len();

        Ok(Self {
            header,
            extended_header,
            contents,
            extended_data: &buf[offset..],
        })
    }
}
