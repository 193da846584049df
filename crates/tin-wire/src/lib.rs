#![warn(clippy::pedantic)]

pub mod enums;
pub mod error;
pub mod id;
pub mod install_record;
pub mod layout;

pub use enums::{ApplicationEvent, ContentInstallType, ContentMetaType, ContentType, StorageId};
pub use error::WireError;
pub use id::{ContentId, PlaceholderId};
pub use install_record::{
    InstallRecord, InstalledContentMeta, MetaContent, PackagedContentMeta, base_title_id,
    build_install_record,
};
pub use layout::{
    ContentInfo, ContentMetaKey, ContentStorageRecord, InstalledContentMetaHeader,
    PackagedContentInfo, PackagedContentMetaHeader,
};
