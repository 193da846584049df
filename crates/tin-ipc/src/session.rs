use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::error::IpcError;
use crate::request::{Request, Response};
use crate::result_code::ResultCode;

/// An open session with a privileged service.
///
/// This is the only seam between the installation logic and the
/// platform. The console binding forwards requests over the kernel IPC
/// mechanism; the simulator in `tin-sim` answers them from in-memory
/// state.
///
/// ```text
///   Service::call(Request) ──▶ ServiceSession::dispatch ──▶ Response
///                                         │
///                                  Err(ResultCode) on failure
/// ```
///
/// Implementations must be `Send + Sync`: sessions are shared by the
/// install task and anything the caller keeps around.
pub trait ServiceSession: Send + Sync {
    /// Perform one call. Output buffers in `request` are written in
    /// place; scalars and new sessions come back in the [`Response`].
    ///
    /// # Errors
    ///
    /// The service's non-success [`ResultCode`].
    fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode>;
}

/// Shared handle to a session. Cloning keeps the session open.
pub type Session = Arc<dyn ServiceSession>;

/// Opens services by name (`"ncm"`, `"ns:am"`, `"es"`).
pub trait ServiceManager: Send + Sync {
    /// # Errors
    ///
    /// [`IpcError::ServiceUnavailable`] when no such service exists or
    /// the caller lacks access.
    fn get_service(&self, name: &str) -> Result<Session, IpcError>;
}

/// A session paired with a diagnostic name.
///
/// Wraps [`ServiceSession::dispatch`] with reply-shape validation and
/// typed errors so each service wrapper only has to pack scalars.
#[derive(Clone)]
pub struct Service {
    name: &'static str,
    session: Session,
}

impl Service {
    pub fn new(name: &'static str, session: Session) -> Self {
        Self { name, session }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send `request` and validate the reply against what it declared.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Remote`] when the service returns a failure code.
    /// - [`IpcError::ShortOutput`] / [`IpcError::MissingObject`] when the
    ///   reply is smaller than declared.
    pub fn call(&self, mut request: Request<'_>) -> Result<Response, IpcError> {
        let command = request.command();
        debug!(service = self.name, command, "ipc call");

        let response = self
            .session
            .dispatch(&mut request)
            .map_err(|code| IpcError::Remote {
                service: self.name,
                command,
                code,
            })?;

        if response.output().len() < request.expected_output_size() {
            return Err(IpcError::ShortOutput {
                service: self.name,
                command,
                expected: request.expected_output_size(),
                actual: response.output().len(),
            });
        }

        if response.object_count() < request.expected_objects() {
            return Err(IpcError::MissingObject {
                service: self.name,
                command,
                expected: request.expected_objects(),
                actual: response.object_count(),
            });
        }

        Ok(response)
    }

    /// Call with input scalars only, discarding any output.
    ///
    /// # Errors
    ///
    /// See [`Service::call`].
    pub fn dispatch_in(&self, command: u32, input: impl Into<Vec<u8>>) -> Result<(), IpcError> {
        self.call(Request::new(command).input(input)).map(|_| ())
    }

    /// Call with no input and return exactly `size` bytes of output.
    ///
    /// # Errors
    ///
    /// See [`Service::call`].
    pub fn dispatch_out(&self, command: u32, size: usize) -> Result<Bytes, IpcError> {
        let response = self.call(Request::new(command).output_size(size))?;
        Ok(Bytes::copy_from_slice(&response.output()[..size]))
    }

    /// Call and take the single session object the reply carries.
    ///
    /// # Errors
    ///
    /// See [`Service::call`].
    pub fn dispatch_object(
        &self,
        command: u32,
        input: impl Into<Vec<u8>>,
        name: &'static str,
    ) -> Result<Service, IpcError> {
        let mut response = self.call(Request::new(command).input(input).objects(1))?;
        let session = response.take_object().ok_or(IpcError::MissingObject {
            service: self.name,
            command,
            expected: 1,
            actual: 0,
        })?;
        Ok(Service::new(name, session))
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Echoes the input back as output and records every command id.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<u32>>,
    }

    impl ServiceSession for Echo {
        fn dispatch(&self, request: &mut Request<'_>) -> Result<Response, ResultCode> {
            self.seen.lock().unwrap().push(request.command());
            match request.command() {
                99 => Err(ResultCode::new(5, 3)),
                7 => Ok(Response::new().with_object(Arc::new(Echo::default()))),
                _ => Ok(Response::new().with_output(request.input_bytes().to_vec())),
            }
        }
    }

    fn echo() -> (Arc<Echo>, Service) {
        let session = Arc::new(Echo::default());
        let service = Service::new("echo", session.clone());
        (session, service)
    }

    #[test]
    fn call_returns_output() {
        let (_, service) = echo();
        let response = service
            .call(Request::new(1).input(vec![1u8, 2, 3, 4]).output_size(4))
            .unwrap();
        assert_eq!(response.output(), &[1, 2, 3, 4]);
    }

    #[test]
    fn remote_failure_carries_code_and_command() {
        let (_, service) = echo();
        let err = service.dispatch_in(99, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            IpcError::Remote { service: "echo", command: 99, code } if code == ResultCode::new(5, 3)
        ));
    }

    #[test]
    fn short_output_is_rejected() {
        let (_, service) = echo();
        let err = service.dispatch_out(1, 16).unwrap_err();
        assert!(matches!(
            err,
            IpcError::ShortOutput { expected: 16, actual: 0, .. }
        ));
    }

    #[test]
    fn missing_object_is_rejected() {
        let (_, service) = echo();
        let err = service.dispatch_object(1, Vec::new(), "child").unwrap_err();
        assert!(matches!(err, IpcError::MissingObject { expected: 1, .. }));
    }

    #[test]
    fn object_outlives_call() {
        let (seen, service) = echo();
        let child = service.dispatch_object(7, Vec::new(), "child").unwrap();
        child.dispatch_in(3, vec![0u8]).unwrap();
        assert_eq!(child.name(), "child");
        assert_eq!(*seen.seen.lock().unwrap(), vec![7]);
    }
}
