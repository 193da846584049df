#![warn(clippy::pedantic)]

//! In-memory console: every service the install engine talks to, plus a
//! mounter that reads installed meta content back, and builders for the
//! packages fed into it.

pub mod console;
pub mod fixture;
pub mod mount;
mod services;

pub use console::{
    ApplicationRecord, Call, ConsoleState, Fault, MetaDatabase, Placeholder, SimConsole,
    StorageVolume,
};
pub use fixture::{CnmtBuilder, NspBuilder, content_id};
pub use mount::SimMounter;
