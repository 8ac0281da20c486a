use crate::{ClientError, ClientErrorKind, Status};

#[test]
fn default_client_error_is_success() {
    assert!(ClientError::success().is_success());
}

#[test]
fn new_records_kind_and_status() {
    let err = ClientError::new(ClientErrorKind::DeadlockError, Some(Status::CertificationFailed));
    assert_eq!(err.kind(), ClientErrorKind::DeadlockError);
    assert_eq!(err.status(), Some(Status::CertificationFailed));
    assert!(!err.is_success());
}
