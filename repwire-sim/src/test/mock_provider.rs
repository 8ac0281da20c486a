use super::MockProvider;
use repwire_core::{ClientId, Flags, Provider, Seqno, ServerId, Status, TransactionId, WsHandle};

fn provider() -> MockProvider {
    MockProvider::new(ServerId::new([1; 16]), ServerId::new([1; 16]))
}

#[test]
fn certify_assigns_increasing_seqnos() {
    let p = provider();
    let h1 = WsHandle::with_opaque(TransactionId::new(1), 1);
    let h2 = WsHandle::with_opaque(TransactionId::new(2), 1);
    let (s1, m1) = p.certify(ClientId::new(1), &h1, Flags::START_TRANSACTION | Flags::COMMIT);
    let (s2, m2) = p.certify(ClientId::new(1), &h2, Flags::START_TRANSACTION | Flags::COMMIT);
    assert!(s1.is_success());
    assert!(s2.is_success());
    assert!(m2.unwrap().seqno().get() > m1.unwrap().seqno().get());
}

#[test]
fn forced_certify_result_is_consumed_once() {
    let p = provider();
    p.set_certify_result(Status::CertificationFailed);
    let handle = WsHandle::with_opaque(TransactionId::new(1), 1);
    let (s1, _) = p.certify(ClientId::new(1), &handle, Flags::START_TRANSACTION | Flags::COMMIT);
    assert_eq!(s1, Status::CertificationFailed);
    let (s2, _) = p.certify(ClientId::new(1), &handle, Flags::START_TRANSACTION | Flags::COMMIT);
    assert!(s2.is_success());
}

#[test]
fn bf_abort_marks_next_certify() {
    let p = provider();
    let txn_id = TransactionId::new(1);
    let mut victim_seqno = Seqno::new(99);
    let status = p.bf_abort(Seqno::new(5), txn_id, &mut victim_seqno);
    assert!(status.is_success());
    assert!(victim_seqno.is_undefined());

    let handle = WsHandle::with_opaque(txn_id, 1);
    let (s, _) = p.certify(ClientId::new(1), &handle, Flags::START_TRANSACTION | Flags::COMMIT);
    assert_eq!(s, Status::BfAbort);
}

#[test]
fn fail_connection_once_then_succeeds() {
    let p = provider();
    let txn_id = TransactionId::new(1);
    p.fail_connection_once(txn_id, 1);
    let handle = WsHandle::with_opaque(txn_id, 1);
    let (s1, _) = p.certify(ClientId::new(1), &handle, Flags::START_TRANSACTION | Flags::COMMIT);
    assert_eq!(s1, Status::ConnectionFailed);
    let (s2, _) = p.certify(ClientId::new(1), &handle, Flags::START_TRANSACTION | Flags::COMMIT);
    assert!(s2.is_success());
}

#[test]
fn tracks_fragment_counters() {
    let p = provider();
    let handle = WsHandle::with_opaque(TransactionId::new(1), 1);
    p.certify(ClientId::new(1), &handle, Flags::START_TRANSACTION);
    p.certify(ClientId::new(1), &handle, Flags::COMMIT);
    assert_eq!(p.fragments(), 2);
    assert_eq!(p.commit_fragments(), 1);
}

#[test]
fn enter_toi_counts_write_sets() {
    let p = provider();
    let (status, meta) = p.enter_toi(ClientId::new(1), &[], &[], Flags::NONE);
    assert!(status.is_success());
    assert!(meta.is_some());
    assert_eq!(p.toi_write_sets(), 1);
}
