use crate::pfs0::{ENTRY_SIZE, HEADER_SIZE, PFS0_MAGIC};

/// Alignment applied to the start of the data region.
const DATA_ALIGNMENT: usize = 0x20;

/// Assembles a PFS0 image in memory.
///
/// Entries are laid out in insertion order. The string table is padded
/// with zeros so the data region starts on a 0x20 boundary.
///
/// # Example
///
/// ```
/// use tin_container::{Pfs0Builder, Pfs0Image};
///
/// let image = Pfs0Builder::new()
///     .add("hello.txt", b"hi".to_vec())
///     .build();
/// let parsed = Pfs0Image::parse(&image).unwrap();
/// assert_eq!(parsed.get("hello.txt"), Some(&b"hi"[..]));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Pfs0Builder {
    files: Vec<(String, Vec<u8>)>,
}

impl Pfs0Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.files.push((name.into(), data));
        self
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(&self) -> Vec<u8> {
        let mut strings = Vec::new();
        let mut name_offsets = Vec::with_capacity(self.files.len());
        for (name, _) in &self.files {
            name_offsets.push(strings.len() as u32);
            strings.extend_from_slice(name.as_bytes());
            strings.push(0);
        }

        let tables_end = HEADER_SIZE + self.files.len() * ENTRY_SIZE + strings.len();
        let padded = tables_end.next_multiple_of(DATA_ALIGNMENT);
        strings.resize(strings.len() + padded - tables_end, 0);

        let data_len: usize = self.files.iter().map(|(_, d)| d.len()).sum();
        let mut out = Vec::with_capacity(padded + data_len);
        out.extend_from_slice(&PFS0_MAGIC);
        out.extend_from_slice(&(self.files.len() as u32).to_le_bytes());
        out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        let mut data_offset = 0u64;
        for ((_, data), name_offset) in self.files.iter().zip(&name_offsets) {
            out.extend_from_slice(&data_offset.to_le_bytes());
            out.extend_from_slice(&(data.len() as u64).to_le_bytes());
            out.extend_from_slice(&name_offset.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            data_offset += data.len() as u64;
        }

        out.extend_from_slice(&strings);
        for (_, data) in &self.files {
            out.extend_from_slice(data);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pfs0::Pfs0Header;

    #[test]
    fn data_region_is_aligned() {
        let image = Pfs0Builder::new()
            .add("a", vec![1, 2, 3])
            .add("bb", vec![4])
            .build();
        let header = Pfs0Header::read_from(&image).unwrap();
        assert_eq!(header.entry_count, 2);
        assert_eq!(header.data_offset() % DATA_ALIGNMENT as u64, 0);
        assert_eq!(image.len() as u64, header.data_offset() + 4);
    }

    #[test]
    fn empty_builder_emits_header_only() {
        let image = Pfs0Builder::new().build();
        let header = Pfs0Header::read_from(&image).unwrap();
        assert_eq!(header.entry_count, 0);
        assert_eq!(image.len(), DATA_ALIGNMENT);
    }
}
