use crate::result_code::ResultCode;

/// Errors raised while talking to a privileged service.
///
/// ```text
///   IpcError
///   ├── Remote          ← the service answered with a non-success code
///   ├── ShortOutput     ← reply carried fewer scalar bytes than declared
///   ├── MissingObject   ← reply carried fewer sessions than declared
///   └── ServiceUnavailable ← the named service could not be opened
/// ```
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("{service} command {command} failed with {code}")]
    Remote {
        service: &'static str,
        command: u32,
        code: ResultCode,
    },

    #[error("{service} command {command} returned {actual} output bytes, expected {expected}")]
    ShortOutput {
        service: &'static str,
        command: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{service} command {command} returned {actual} objects, expected {expected}")]
    MissingObject {
        service: &'static str,
        command: u32,
        expected: usize,
        actual: usize,
    },

    #[error("service {name:?} is unavailable: {code}")]
    ServiceUnavailable { name: String, code: ResultCode },
}

impl IpcError {
    /// The remote status code, when the failure came from the service.
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            Self::Remote { code, .. } | Self::ServiceUnavailable { code, .. } => Some(*code),
            Self::ShortOutput { .. } | Self::MissingObject { .. } => None,
        }
    }

    /// `true` when the service answered with exactly `code`.
    pub fn is(&self, code: ResultCode) -> bool {
        self.code() == Some(code)
    }
}

/// Swallow one specific remote code.
///
/// Used for best-effort cleanup calls where "it was not there" is as
/// good as success:
///
/// ```rust
/// use tin_ipc::{IpcError, ResultCode, ResultExt};
///
/// const NOT_FOUND: ResultCode = ResultCode::new(5, 3);
///
/// let gone: Result<(), IpcError> = Err(IpcError::Remote {
///     service: "demo",
///     command: 2,
///     code: NOT_FOUND,
/// });
/// assert_eq!(gone.allow(NOT_FOUND).unwrap(), None);
/// ```
pub trait ResultExt<T> {
    /// Map `Err` carrying `code` to `Ok(None)`, `Ok(v)` to `Ok(Some(v))`,
    /// and pass every other error through.
    ///
    /// # Errors
    ///
    /// Any error whose code differs from `code`.
    fn allow(self, code: ResultCode) -> Result<Option<T>, IpcError>;
}

impl<T> ResultExt<T> for Result<T, IpcError> {
    fn allow(self, code: ResultCode) -> Result<Option<T>, IpcError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is(code) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOT_FOUND: ResultCode = ResultCode::new(5, 3);

    fn remote(code: ResultCode) -> IpcError {
        IpcError::Remote {
            service: "test",
            command: 1,
            code,
        }
    }

    #[test]
    fn allow_passes_success_through() {
        let ok: Result<u32, IpcError> = Ok(7);
        assert_eq!(ok.allow(NOT_FOUND).unwrap(), Some(7));
    }

    #[test]
    fn allow_swallows_matching_code() {
        let err: Result<u32, IpcError> = Err(remote(NOT_FOUND));
        assert_eq!(err.allow(NOT_FOUND).unwrap(), None);
    }

    #[test]
    fn allow_keeps_other_codes() {
        let err: Result<u32, IpcError> = Err(remote(ResultCode::new(5, 4)));
        let result = err.allow(NOT_FOUND);
        assert!(matches!(result, Err(IpcError::Remote { code, .. }) if code == ResultCode::new(5, 4)));
    }

    #[test]
    fn shape_errors_have_no_code() {
        let err = IpcError::ShortOutput {
            service: "test",
            command: 0,
            expected: 16,
            actual: 0,
        };
        assert!(err.code().is_none());
        assert!(!err.is(NOT_FOUND));
    }
}
