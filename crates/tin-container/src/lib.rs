#![warn(clippy::pedantic)]

pub mod blob;
pub mod builder;
pub mod error;
pub mod pfs0;

pub use blob::{Blob, BlobReader, FileBlob, MemoryBlob, read_range};
pub use builder::Pfs0Builder;
pub use error::ContainerError;
pub use pfs0::{Container, Entry, Pfs0Header, Pfs0Image};
