#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod install;
pub mod ncm;
pub mod platform;
pub mod records;
pub mod step;
pub mod store;
pub mod ticket;

pub use config::InstallConfig;
pub use error::InstallError;
pub use install::{Install, InstallReport, InstalledTitle, Installer};
pub use ncm::{ContentManager, ContentMetaDatabase, ContentStorage};
pub use platform::{ContentMounter, MountedContent, Platform};
pub use records::{ApplicationManager, MergeOutcome, RawRecord, merge_application_records};
pub use step::{Stage, Step, StepSink};
pub use store::install_content;
pub use ticket::{TicketPair, TicketService, ticket_pairs};
