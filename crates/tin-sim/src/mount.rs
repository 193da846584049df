use std::collections::BTreeMap;
use std::io;

use tin_container::Pfs0Image;
use tin_engine::{ContentMounter, MountedContent};
use tin_wire::{ContentId, StorageId};

use crate::console::SimConsole;

const SCHEME: &str = "sim:/";

/// Path reported by `GetPath` for registered content.
pub fn content_path(storage_id: StorageId, content_id: ContentId) -> String {
    format!("{SCHEME}{}/{content_id}.nca", storage_id.to_wire_byte())
}

fn parse_content_path(path: &str) -> Option<(StorageId, ContentId)> {
    let (storage, name) = path.strip_prefix(SCHEME)?.split_once('/')?;
    let storage_id = StorageId::from_wire_byte(storage.parse().ok()?).ok()?;
    let content_id = ContentId::from_file_name(name).ok()?;
    Some((storage_id, content_id))
}

/// Mounts registered content of a [`SimConsole`].
///
/// Simulated meta content is a plain PFS0 image holding the `.cnmt`
/// file; there is no encryption layer to peel off.
#[derive(Clone, Debug)]
pub struct SimMounter {
    console: SimConsole,
}

impl SimMounter {
    pub fn new(console: SimConsole) -> Self {
        Self { console }
    }
}

impl ContentMounter for SimMounter {
    fn mount(&self, path: &str) -> io::Result<Box<dyn MountedContent>> {
        let (storage_id, content_id) = parse_content_path(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("not a content path: {path}"))
        })?;
        let data = self.console.content(storage_id, content_id).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no content at {path}"))
        })?;

        let image = Pfs0Image::parse(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let files = image
            .files()
            .iter()
            .map(|(name, data)| (name.clone(), data.to_vec()))
            .collect();
        Ok(Box::new(SimMount { files }))
    }
}

struct SimMount {
    files: BTreeMap<String, Vec<u8>>,
}

impl MountedContent for SimMount {
    fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_round_trips() {
        let id = ContentId::from_bytes([0x5A; 16]);
        let path = content_path(StorageId::SdCard, id);
        assert_eq!(path, format!("sim:/5/{id}.nca"));
        assert_eq!(parse_content_path(&path), Some((StorageId::SdCard, id)));
        assert_eq!(parse_content_path("@SdCard://x.nca"), None);
    }
}
