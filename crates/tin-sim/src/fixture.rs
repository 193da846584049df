//! Builders for packaged meta files and complete packages.

use tin_container::Pfs0Builder;
use tin_wire::{
    ContentId, ContentInfo, ContentInstallType, ContentMetaType, ContentType, PackagedContentInfo,
    PackagedContentMetaHeader, WireError, base_title_id,
};

/// Deterministic content id: `seed` big-endian in the first four bytes.
pub fn content_id(seed: u32) -> ContentId {
    let mut bytes = [0x11u8; 16];
    bytes[..4].copy_from_slice(&seed.to_be_bytes());
    ContentId::from_bytes(bytes)
}

/// Builds the packaged form of a meta file.
///
/// The type-specific constructors lay out the extended header the way
/// the console does:
///
/// ```text
/// ┌──────────────┬──────┬─────────────────────────────────────────────┐
/// │ Type         │ Size │ Fields                                      │
/// ├──────────────┼──────┼─────────────────────────────────────────────┤
/// │ Application  │ 0x10 │ patch id, required system version, req. app │
/// │ Patch        │ 0x18 │ application id, required system version,    │
/// │              │      │ extended data size, reserved                │
/// │ AddOnContent │ 0x10 │ application id, required app version, pad   │
/// └──────────────┴──────┴─────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug)]
pub struct CnmtBuilder {
    title_id: u64,
    version: u32,
    meta_type: ContentMetaType,
    extended_header: Vec<u8>,
    contents: Vec<PackagedContentInfo>,
    extended_data: Vec<u8>,
}

impl CnmtBuilder {
    fn with_header(title_id: u64, meta_type: ContentMetaType, extended_header: Vec<u8>) -> Self {
        Self {
            title_id,
            version: 0,
            meta_type,
            extended_header,
            contents: Vec::new(),
            extended_data: Vec::new(),
        }
    }

    pub fn application(title_id: u64) -> Self {
        let mut ext = vec![0u8; 0x10];
        ext[..8].copy_from_slice(&(title_id ^ 0x800).to_le_bytes());
        Self::with_header(title_id, ContentMetaType::Application, ext)
    }

    pub fn patch(title_id: u64) -> Self {
        let mut ext = vec![0u8; 0x18];
        ext[..8].copy_from_slice(&(title_id ^ 0x800).to_le_bytes());
        Self::with_header(title_id, ContentMetaType::Patch, ext)
    }

    pub fn add_on_content(title_id: u64) -> Self {
        let mut ext = vec![0u8; 0x10];
        let application_id = base_title_id(title_id, ContentMetaType::AddOnContent);
        ext[..8].copy_from_slice(&application_id.to_le_bytes());
        Self::with_header(title_id, ContentMetaType::AddOnContent, ext)
    }

    /// Any other type, with no extended header.
    pub fn bare(title_id: u64, meta_type: ContentMetaType) -> Self {
        Self::with_header(title_id, meta_type, Vec::new())
    }

    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Set the u32 at offset 0x08 of the extended header.
    #[must_use]
    pub fn required_system_version(mut self, version: u32) -> Self {
        if let Some(field) = self.extended_header.get_mut(8..12) {
            field.copy_from_slice(&version.to_le_bytes());
        }
        self
    }

    #[must_use]
    pub fn content(mut self, content_id: ContentId, size: u64, content_type: ContentType) -> Self {
        let mut hash = [0u8; 32];
        hash[..16].copy_from_slice(content_id.as_bytes());
        self.contents.push(PackagedContentInfo {
            hash,
            info: ContentInfo {
                content_id,
                size,
                attributes: 0,
                content_type,
                id_offset: 0,
            },
        });
        self
    }

    /// Trailing extended data. For patches the size is also written into
    /// the extended header.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn extended_data(mut self, data: Vec<u8>) -> Self {
        if self.meta_type == ContentMetaType::Patch {
            if let Some(field) = self.extended_header.get_mut(0xC..0x10) {
                field.copy_from_slice(&(data.len() as u32).to_le_bytes());
            }
        }
        self.extended_data = data;
        self
    }

    pub fn title_id(&self) -> u64 {
        self.title_id
    }

    pub fn meta_type(&self) -> ContentMetaType {
        self.meta_type
    }

    /// Conventional name of the file inside the meta content.
    pub fn file_name(&self) -> String {
        format!("{}_{:016x}.cnmt", self.meta_type, self.title_id)
    }

    /// Packaged meta bytes, including a zeroed trailing digest.
    ///
    /// # Errors
    ///
    /// [`WireError::TooManyContents`] for more than `u16::MAX` entries, an
    /// extended header over `u16::MAX` bytes, or a content size over 40 bits.
    pub fn build(&self) -> Result<Vec<u8>, WireError> {
        let too_many = |count| WireError::TooManyContents { count };
        let header = PackagedContentMetaHeader {
            title_id: self.title_id,
            version: self.version,
            meta_type: self.meta_type,
            extended_header_size: u16::try_from(self.extended_header.len())
                .map_err(|_| too_many(self.extended_header.len()))?,
            content_count: u16::try_from(self.contents.len())
                .map_err(|_| too_many(self.contents.len()))?,
            content_meta_count: 0,
            attributes: 0,
            storage_id: 0,
            install_type: ContentInstallType::Full,
            committed: false,
            required_system_version: 0,
        };

        let mut buf = vec![0u8; PackagedContentMetaHeader::SIZE];
        header.write_to(&mut buf)?;
        buf.extend_from_slice(&self.extended_header);
        for content in &self.contents {
            let mut entry = [0u8; PackagedContentInfo::SIZE];
            content.write_to(&mut entry)?;
            buf.extend_from_slice(&entry);
        }
        buf.extend_from_slice(&self.extended_data);
        buf.extend_from_slice(&[0u8; 0x20]);
        Ok(buf)
    }

    /// The meta content as the simulator stores it: a PFS0 image holding
    /// the packaged meta file.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    pub fn meta_content(&self) -> Result<Vec<u8>, WireError> {
        Ok(Pfs0Builder::new().add(self.file_name(), self.build()?).build())
    }
}

/// Builds a complete package (an NSP).
#[derive(Clone, Debug, Default)]
pub struct NspBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl NspBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn file(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.files.push((name.into(), data));
        self
    }

    /// Add `<id>.cnmt.nca`.
    #[must_use]
    pub fn meta(self, meta_id: ContentId, meta_content: Vec<u8>) -> Self {
        self.file(format!("{meta_id}.cnmt.nca"), meta_content)
    }

    /// Add `<id>.nca`.
    #[must_use]
    pub fn content(self, content_id: ContentId, data: Vec<u8>) -> Self {
        self.file(format!("{content_id}.nca"), data)
    }

    /// Add `<rights_id>.tik` and `<rights_id>.cert`.
    #[must_use]
    pub fn ticket(self, rights_id: &str, ticket: Vec<u8>, cert: Vec<u8>) -> Self {
        self.file(format!("{rights_id}.tik"), ticket)
            .file(format!("{rights_id}.cert"), cert)
    }

    pub fn build(&self) -> Vec<u8> {
        self.files
            .iter()
            .fold(Pfs0Builder::new(), |builder, (name, data)| {
                builder.add(name.clone(), data.clone())
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use tin_container::Pfs0Image;
    use tin_wire::PackagedContentMeta;

    use super::*;

    #[test]
    fn application_meta_parses_back() {
        let cnmt = CnmtBuilder::application(0x0100_0000_0001_0000)
            .version(0x10000)
            .required_system_version(0x0C00_0000)
            .content(content_id(1), 0x200, ContentType::Program)
            .build()
            .unwrap();
        let parsed = PackagedContentMeta::parse(&cnmt).unwrap();

        assert_eq!(parsed.header.meta_type, ContentMetaType::Application);
        assert_eq!(parsed.header.version, 0x10000);
        assert_eq!(parsed.extended_header.len(), 0x10);
        assert_eq!(&parsed.extended_header[8..12], &0x0C00_0000u32.to_le_bytes());
        assert_eq!(parsed.contents[0].info.content_id, content_id(1));
    }

    #[test]
    fn patch_extended_data_size_lands_in_header() {
        let cnmt = CnmtBuilder::patch(0x0100_0000_0001_0800)
            .extended_data(vec![9; 12])
            .build()
            .unwrap();
        let parsed = PackagedContentMeta::parse(&cnmt).unwrap();
        assert_eq!(parsed.extended_data, &[9; 12]);
    }

    #[test]
    fn meta_content_wraps_cnmt_file() {
        let builder = CnmtBuilder::add_on_content(0x0100_0000_0001_1001);
        let image = builder.meta_content().unwrap();
        let pfs0 = Pfs0Image::parse(&image).unwrap();
        assert_eq!(
            pfs0.files().keys().collect::<Vec<_>>(),
            vec!["AddOnContent_0100000000011001.cnmt"]
        );
    }
}
