use crate::enums::{ContentInstallType, ContentMetaType, ContentType, StorageId};
use crate::error::WireError;
use crate::id::{ContentId, ID_SIZE};

// Fixed-layout structures shared by the packaged meta blob, the meta
// database and the title registry. Every field is little-endian and
// lives at a fixed offset; each struct has a `read_from` / `write_to`
// pair working on byte slices. The offset tables are checked against
// the declared sizes at compile time.

/// Largest content size representable in the 40-bit size field.
pub const MAX_CONTENT_SIZE: u64 = (1 << 40) - 1;

fn need(buf: &[u8], size: usize) -> Result<(), WireError> {
    if buf.len() < size {
        return Err(WireError::UnexpectedEof {
            offset: 0,
            needed: size,
            available: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

pub(crate) fn u64_at(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

// ── PackagedContentMetaHeader ─────────────────────────────────────────

mod packaged_offset {
    pub const TITLE_ID: usize = 0x00;
    pub const VERSION: usize = 0x08;
    pub const META_TYPE: usize = 0x0C;
    pub const EXTENDED_HEADER_SIZE: usize = 0x0E;
    pub const CONTENT_COUNT: usize = 0x10;
    pub const CONTENT_META_COUNT: usize = 0x12;
    pub const ATTRIBUTES: usize = 0x14;
    pub const STORAGE_ID: usize = 0x15;
    pub const INSTALL_TYPE: usize = 0x16;
    pub const COMMITTED: usize = 0x17;
    pub const REQUIRED_SYSTEM_VERSION: usize = 0x18;
    pub const RESERVED: usize = 0x1C;
}

/// Header at the start of a packaged meta blob (the `.cnmt` file).
///
/// ```text
/// ┌────────┬─────────┬──────────────────────────────┐
/// │ Offset │ Size    │ Field                        │
/// ├────────┼─────────┼──────────────────────────────┤
/// │ 0x00   │ 8 bytes │ title_id                     │
/// │ 0x08   │ 4 bytes │ version                      │
/// │ 0x0C   │ 1 byte  │ meta_type                    │
/// │ 0x0D   │ 1 byte  │ padding                      │
/// │ 0x0E   │ 2 bytes │ extended_header_size         │
/// │ 0x10   │ 2 bytes │ content_count                │
/// │ 0x12   │ 2 bytes │ content_meta_count           │
/// │ 0x14   │ 1 byte  │ attributes                   │
/// │ 0x15   │ 1 byte  │ storage_id                   │
/// │ 0x16   │ 1 byte  │ install_type                 │
/// │ 0x17   │ 1 byte  │ committed                    │
/// │ 0x18   │ 4 bytes │ required_system_version      │
/// │ 0x1C   │ 4 bytes │ padding                      │
/// └────────┴─────────┴──────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackagedContentMetaHeader {
    pub title_id: u64,
    pub version: u32,
    pub meta_type: ContentMetaType,
    pub extended_header_size: u16,
    pub content_count: u16,
    pub content_meta_count: u16,
    pub attributes: u8,
    pub storage_id: u8,
    pub install_type: ContentInstallType,
    pub committed: bool,
    pub required_system_version: u32,
}

const _: () = assert!(packaged_offset::RESERVED + 4 == PackagedContentMetaHeader::SIZE);

impl PackagedContentMetaHeader {
    pub const SIZE: usize = 0x20;

    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if `buf` is shorter than 0x20 bytes.
    /// - [`WireError::InvalidEnumValue`] for an unknown meta or install type.
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        use packaged_offset as o;
        need(buf, Self::SIZE)?;

        Ok(Self {
            title_id: u64_at(buf, o::TITLE_ID),
            version: u32_at(buf, o::VERSION),
            meta_type: ContentMetaType::from_wire_byte(buf[o::META_TYPE])?,
            extended_header_size: u16_at(buf, o::EXTENDED_HEADER_SIZE),
            content_count: u16_at(buf, o::CONTENT_COUNT),
            content_meta_count: u16_at(buf, o::CONTENT_META_COUNT),
            attributes: buf[o::ATTRIBUTES],
            storage_id: buf[o::STORAGE_ID],
            install_type: ContentInstallType::from_wire_byte(buf[o::INSTALL_TYPE])?,
            committed: buf[o::COMMITTED] != 0,
            required_system_version: u32_at(buf, o::REQUIRED_SYSTEM_VERSION),
        })
    }

    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] if `buf` is shorter than 0x20 bytes.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), WireError> {
        use packaged_offset as o;
        need(buf, Self::SIZE)?;

        buf[..Self::SIZE].fill(0);
        buf[o::TITLE_ID..o::TITLE_ID + 8].copy_from_slice(&self.title_id.to_le_bytes());
        buf[o::VERSION..o::VERSION + 4].copy_from_slice(&self.version.to_le_bytes());
        buf[o::META_TYPE] = self.meta_type.to_wire_byte();
        buf[o::EXTENDED_HEADER_SIZE..o::EXTENDED_HEADER_SIZE + 2]
            .copy_from_slice(&self.extended_header_size.to_le_bytes());
        buf[o::CONTENT_COUNT..o::CONTENT_COUNT + 2]
            .copy_from_slice(&self.content_count.to_le_bytes());
        buf[o::CONTENT_META_COUNT..o::CONTENT_META_COUNT + 2]
            .copy_from_slice(&self.content_meta_count.to_le_bytes());
        buf[o::ATTRIBUTES] = self.attributes;
        buf[o::STORAGE_ID] = self.storage_id;
        buf[o::INSTALL_TYPE] = self.install_type.to_wire_byte();
        buf[o::COMMITTED] = u8::from(self.committed);
        buf[o::REQUIRED_SYSTEM_VERSION..o::REQUIRED_SYSTEM_VERSION + 4]
            .copy_from_slice(&self.required_system_version.to_le_bytes());
        Ok(())
    }
}

// ── InstalledContentMetaHeader ────────────────────────────────────────

/// Header of a record stored in the content meta database.
///
/// ```text
/// ┌────────┬─────────┬──────────────────────────────┐
/// │ Offset │ Size    │ Field                        │
/// ├────────┼─────────┼──────────────────────────────┤
/// │ 0x00   │ 2 bytes │ extended_header_size         │
/// │ 0x02   │ 2 bytes │ content_count                │
/// │ 0x04   │ 2 bytes │ content_meta_count           │
/// │ 0x06   │ 1 byte  │ attributes                   │
/// │ 0x07   │ 1 byte  │ storage_id                   │
/// └────────┴─────────┴──────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledContentMetaHeader {
    pub extended_header_size: u16,
    pub content_count: u16,
    pub content_meta_count: u16,
    pub attributes: u8,
    pub storage_id: StorageId,
}

impl InstalledContentMetaHeader {
    pub const SIZE: usize = 0x08;

    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] or [`WireError::InvalidEnumValue`].
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        need(buf, Self::SIZE)?;
        Ok(Self {
            extended_header_size: u16_at(buf, 0),
            content_count: u16_at(buf, 2),
            content_meta_count: u16_at(buf, 4),
            attributes: buf[6],
            storage_id: StorageId::from_wire_byte(buf[7])?,
        })
    }

    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] if `buf` is shorter than 8 bytes.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), WireError> {
        need(buf, Self::SIZE)?;
        buf[0..2].copy_from_slice(&self.extended_header_size.to_le_bytes());
        buf[2..4].copy_from_slice(&self.content_count.to_le_bytes());
        buf[4..6].copy_from_slice(&self.content_meta_count.to_le_bytes());
        buf[6] = self.attributes;
        buf[7] = self.storage_id.to_wire_byte();
        Ok(())
    }
}

// ── ContentInfo ───────────────────────────────────────────────────────

/// One content file of a title, as stored in the meta database.
///
/// ```text
/// ┌────────┬──────────┬─────────────────────────────┐
/// │ Offset │ Size     │ Field                       │
/// ├────────┼──────────┼─────────────────────────────┤
/// │ 0x00   │ 16 bytes │ content_id                  │
/// │ 0x10   │ 4 bytes  │ size, low 32 bits           │
/// │ 0x14   │ 1 byte   │ size, high 8 bits           │
/// │ 0x15   │ 1 byte   │ attributes                  │
/// │ 0x16   │ 1 byte   │ content_type                │
/// │ 0x17   │ 1 byte   │ id_offset                   │
/// └────────┴──────────┴─────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentInfo {
    pub content_id: ContentId,
    pub size: u64,
    pub attributes: u8,
    pub content_type: ContentType,
    pub id_offset: u8,
}

const _: () = assert!(ID_SIZE + 4 + 1 + 1 + 1 + 1 == ContentInfo::SIZE);

impl ContentInfo {
    pub const SIZE: usize = 0x18;

    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] or [`WireError::InvalidEnumValue`].
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        need(buf, Self::SIZE)?;
        let size = u64::from(u32_at(buf, 0x10)) | (u64::from(buf[0x14]) << 32);
        Ok(Self {
            content_id: ContentId::read_from(buf)?,
            size,
            attributes: buf[0x15],
            content_type: ContentType::from_wire_byte(buf[0x16])?,
            id_offset: buf[0x17],
        })
    }

    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if `buf` is shorter than 0x18 bytes.
    /// - [`WireError::ContentTooLarge`] if `size` needs more than 40 bits.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), WireError> {
        need(buf, Self::SIZE)?;
        if self.size > MAX_CONTENT_SIZE {
            return Err(WireError::ContentTooLarge { size: self.size });
        }

        #[allow(clippy::cast_possible_truncation)]
        let (low, high) = ((self.size & 0xFFFF_FFFF) as u32, (self.size >> 32) as u8);

        buf[..ID_SIZE].copy_from_slice(self.content_id.as_bytes());
        buf[0x10..0x14].copy_from_slice(&low.to_le_bytes());
        buf[0x14] = high;
        buf[0x15] = self.attributes;
        buf[0x16] = self.content_type.to_wire_byte();
        buf[0x17] = self.id_offset;
        Ok(())
    }
}

// ── PackagedContentInfo ───────────────────────────────────────────────

/// Content info as it appears in a packaged meta blob: a 32-byte hash of
/// the content followed by the plain [`ContentInfo`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackagedContentInfo {
    pub hash: [u8; 32],
    pub info: ContentInfo,
}

const _: () = assert!(32 + ContentInfo::SIZE == PackagedContentInfo::SIZE);

impl PackagedContentInfo {
    pub const SIZE: usize = 0x38;

    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] or [`WireError::InvalidEnumValue`].
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        need(buf, Self::SIZE)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&buf[..32]);
        Ok(Self {
            hash,
            info: ContentInfo::read_from(&buf[32..])?,
        })
    }

    /// # Errors
    ///
    /// See [`ContentInfo::write_to`].
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), WireError> {
        need(buf, Self::SIZE)?;
        buf[..32].copy_from_slice(&self.hash);
        self.info.write_to(&mut buf[32..])
    }
}

// ── ContentMetaKey ────────────────────────────────────────────────────

/// Identity of one meta record.
///
/// ```text
/// ┌────────┬─────────┬──────────────────────────────┐
/// │ Offset │ Size    │ Field                        │
/// ├────────┼─────────┼──────────────────────────────┤
/// │ 0x00   │ 8 bytes │ title_id                     │
/// │ 0x08   │ 4 bytes │ version                      │
/// │ 0x0C   │ 1 byte  │ meta_type                    │
/// │ 0x0D   │ 1 byte  │ install_type                 │
/// │ 0x0E   │ 2 bytes │ padding                      │
/// └────────┴─────────┴──────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentMetaKey {
    pub title_id: u64,
    pub version: u32,
    pub meta_type: ContentMetaType,
    pub install_type: ContentInstallType,
}

impl ContentMetaKey {
    pub const SIZE: usize = 0x10;

    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] or [`WireError::InvalidEnumValue`].
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        need(buf, Self::SIZE)?;
        Ok(Self {
            title_id: u64_at(buf, 0),
            version: u32_at(buf, 8),
            meta_type: ContentMetaType::from_wire_byte(buf[0x0C])?,
            install_type: ContentInstallType::from_wire_byte(buf[0x0D])?,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.title_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[0x0C] = self.meta_type.to_wire_byte();
        buf[0x0D] = self.install_type.to_wire_byte();
        buf
    }
}

// ── ContentStorageRecord ──────────────────────────────────────────────

/// One entry of an application record in the title registry: which meta
/// record belongs to the title and on which volume it lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentStorageRecord {
    pub key: ContentMetaKey,
    pub storage_id: StorageId,
}

const _: () = assert!(ContentMetaKey::SIZE + 1 + 7 == ContentStorageRecord::SIZE);

impl ContentStorageRecord {
    pub const SIZE: usize = 0x18;

    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] or [`WireError::InvalidEnumValue`].
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        need(buf, Self::SIZE)?;
        Ok(Self {
            key: ContentMetaKey::read_from(buf)?,
            storage_id: StorageId::from_wire_byte(buf[ContentMetaKey::SIZE])?,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..ContentMetaKey::SIZE].copy_from_slice(&self.key.to_bytes());
        buf[ContentMetaKey::SIZE] = self.storage_id.to_wire_byte();
        buf
    }

    /// Whether the encoded record `raw` names the same key on the same
    /// volume. Padding is ignored and `raw` is never decoded, so entries
    /// with enum bytes this crate does not know still compare.
    #[must_use]
    pub fn matches_raw(&self, raw: &[u8]) -> bool {
        let ours = self.to_bytes();
        raw.len() >= Self::SIZE
            && raw[..0x0E] == ours[..0x0E]
            && raw[ContentMetaKey::SIZE] == ours[ContentMetaKey::SIZE]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PackagedContentMetaHeader {
        PackagedContentMetaHeader {
            title_id: 0x0100_0000_0000_1000,
            version: 0x0001_0000,
            meta_type: ContentMetaType::Application,
            extended_header_size: 0x10,
            content_count: 3,
            content_meta_count: 0,
            attributes: 0,
            storage_id: 0,
            install_type: ContentInstallType::Full,
            committed: false,
            required_system_version: 0x0C00_0000,
        }
    }

    #[test]
    fn packaged_header_field_offsets() {
        let mut buf = [0u8; PackagedContentMetaHeader::SIZE];
        header().write_to(&mut buf).unwrap();
        assert_eq!(&buf[0..8], &0x0100_0000_0000_1000u64.to_le_bytes());
        assert_eq!(buf[0x0C], 0x80);
        assert_eq!(u16_at(&buf, 0x0E), 0x10);
        assert_eq!(u16_at(&buf, 0x10), 3);
        assert_eq!(u32_at(&buf, 0x18), 0x0C00_0000);
        assert_eq!(PackagedContentMetaHeader::read_from(&buf).unwrap(), header());
    }

    #[test]
    fn packaged_header_rejects_short_buffer() {
        let result = PackagedContentMetaHeader::read_from(&[0u8; 0x1F]);
        assert!(matches!(
            result,
            Err(WireError::UnexpectedEof { needed: 0x20, available: 0x1F, .. })
        ));
    }

    #[test]
    fn packaged_header_rejects_unknown_type() {
        let mut buf = [0u8; PackagedContentMetaHeader::SIZE];
        header().write_to(&mut buf).unwrap();
        buf[0x0C] = 0x99;
        assert!(matches!(
            PackagedContentMetaHeader::read_from(&buf),
            Err(WireError::InvalidEnumValue { enum_name: "ContentMetaType", .. })
        ));
    }

    #[test]
    fn content_info_splits_forty_bit_size() {
        let info = ContentInfo {
            content_id: ContentId::from_bytes([7; 16]),
            size: 0x12_3456_7890,
            attributes: 0,
            content_type: ContentType::Program,
            id_offset: 0,
        };
        let mut buf = [0u8; ContentInfo::SIZE];
        info.write_to(&mut buf).unwrap();
        assert_eq!(u32_at(&buf, 0x10), 0x3456_7890);
        assert_eq!(buf[0x14], 0x12);
        assert_eq!(buf[0x16], 1);
        assert_eq!(ContentInfo::read_from(&buf).unwrap(), info);
    }

    #[test]
    fn content_info_rejects_oversized_content() {
        let info = ContentInfo {
            content_id: ContentId::default(),
            size: MAX_CONTENT_SIZE + 1,
            attributes: 0,
            content_type: ContentType::Data,
            id_offset: 0,
        };
        let mut buf = [0u8; ContentInfo::SIZE];
        assert!(matches!(
            info.write_to(&mut buf),
            Err(WireError::ContentTooLarge { .. })
        ));
    }

    #[test]
    fn storage_record_layout() {
        let record = ContentStorageRecord {
            key: ContentMetaKey {
                title_id: 0x0100_0000_0000_2000,
                version: 65536,
                meta_type: ContentMetaType::Patch,
                install_type: ContentInstallType::Full,
            },
            storage_id: StorageId::SdCard,
        };
        let bytes = record.to_bytes();
        assert_eq!(bytes[0x0C], 0x81);
        assert_eq!(bytes[0x10], 5);
        assert!(bytes[0x11..].iter().all(|&b| b == 0));
        assert_eq!(ContentStorageRecord::read_from(&bytes).unwrap(), record);
    }

    #[test]
    fn raw_match_ignores_padding_and_checks_storage() {
        let record = ContentStorageRecord {
            key: ContentMetaKey {
                title_id: 0x0100_0000_0001_0000,
                version: 0,
                meta_type: ContentMetaType::Application,
                install_type: ContentInstallType::Full,
            },
            storage_id: StorageId::SdCard,
        };
        let mut raw = record.to_bytes();
        raw[0x0E] = 0xFF;
        raw[0x11] = 0xAB;
        assert!(record.matches_raw(&raw));

        raw[0x10] = StorageId::BuiltInUser.to_wire_byte();
        assert!(!record.matches_raw(&raw));
        raw[0x10] = 0x07;
        assert!(!record.matches_raw(&raw));
        assert!(!record.matches_raw(&raw[..0x10]));
    }

    #[test]
    fn installed_header_layout() {
        let header = InstalledContentMetaHeader {
            extended_header_size: 0x18,
            content_count: 4,
            content_meta_count: 0,
            attributes: 1,
            storage_id: StorageId::BuiltInUser,
        };
        let mut buf = [0u8; InstalledContentMetaHeader::SIZE];
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf, [0x18, 0, 4, 0, 0, 0, 1, 4]);
        assert_eq!(InstalledContentMetaHeader::read_from(&buf).unwrap(), header);
    }
}
