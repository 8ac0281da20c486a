use crate::Status;

/// Client-facing error kinds, grounded on `wsrep::client_error` in
/// `client_state.hpp`. Each failure records both the kind
/// and the underlying provider status so the DBMS can distinguish, e.g.,
/// "deadlock from certification" from "deadlock from BF abort".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientErrorKind {
    Success,
    DeadlockError,
    InterruptedError,
    SizeExceededError,
    ErrorDuringCommit,
    ErrorDuringRollback,
    AppendFragmentError,
    NotSupportedError,
    TimeoutError,
    UnknownError,
}

impl Default for ClientErrorKind {
    fn default() -> Self {
        ClientErrorKind::Success
    }
}

/// A sticky error attached to a session (`client_state::override_error`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClientError {
    kind: ClientErrorKind,
    status: Option<Status>,
}

impl ClientError {
    pub fn success() -> Self {
        ClientError::default()
    }

    pub fn new(kind: ClientErrorKind, status: Option<Status>) -> Self {
        ClientError { kind, status }
    }

    pub fn kind(&self) -> ClientErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.kind == ClientErrorKind::Success
    }
}

#[cfg(test)]
#[path = "test/client_error.rs"]
mod test;
