#![warn(clippy::pedantic)]

pub mod buffer;
pub mod error;
pub mod request;
pub mod result_code;
pub mod session;

pub use buffer::{Buffer, BufferAttr};
pub use error::{IpcError, ResultExt};
pub use request::{Request, Response};
pub use result_code::ResultCode;
pub use session::{Service, ServiceManager, ServiceSession, Session};
