use crate::{
    transition_allowed, ClientId, ClientService, Flags, Gtid, Key, KeyType, Provider, Seqno,
    ServerId, Status, Stid, Transaction, TransactionId, TransactionState, WsHandle, WsMeta, Xid,
};

struct StubProvider {
    certify_status: Status,
}

impl Provider for StubProvider {
    fn connect(&self, _: &str, _: &str, _: &str) -> Status {
        Status::Success
    }
    fn disconnect(&self) -> Status {
        Status::Success
    }
    fn capabilities(&self) -> u32 {
        0
    }
    fn desync(&self) -> Status {
        Status::Success
    }
    fn resync(&self) -> Status {
        Status::Success
    }
    fn pause(&self) -> Result<Seqno, Status> {
        Ok(Seqno::new(1))
    }
    fn resume(&self) -> Status {
        Status::Success
    }
    fn run_applier(&self, _: &mut dyn crate::HighPriorityService) -> Status {
        Status::Success
    }
    fn start_transaction(&self, _: &mut WsHandle) -> Status {
        Status::Success
    }
    fn assign_read_view(&self, _: Option<Gtid>) -> Status {
        Status::Success
    }
    fn append_key(&self, _: &WsHandle, _: &Key) -> Status {
        Status::Success
    }
    fn append_data(&self, _: &WsHandle, _: &[u8]) -> Status {
        Status::Success
    }
    fn certify(&self, _: ClientId, ws_handle: &WsHandle, flags: Flags) -> (Status, Option<WsMeta>) {
        if self.certify_status.is_success() {
            let meta = WsMeta::new(
                Gtid::new(ServerId::undefined(), Seqno::new(42)),
                Stid::new(ServerId::undefined(), ws_handle.transaction_id(), ClientId::undefined()),
                Seqno::undefined(),
                flags,
            );
            (Status::Success, Some(meta))
        } else {
            (self.certify_status, None)
        }
    }
    fn bf_abort(&self, _: Seqno, _: TransactionId, _: &mut Seqno) -> Status {
        Status::Success
    }
    fn rollback(&self, _: TransactionId) -> Status {
        Status::Success
    }
    fn commit_order_enter(&self, _: &WsHandle, _: &WsMeta) -> Status {
        Status::Success
    }
    fn commit_order_leave(&self, _: &WsHandle, _: &WsMeta, _: &[u8]) -> Status {
        Status::Success
    }
    fn release(&self, _: &mut WsHandle) -> Status {
        Status::Success
    }
    fn replay(&self, _: &WsHandle, _: &mut dyn crate::HighPriorityService) -> Status {
        Status::Success
    }
    fn enter_toi(&self, _: ClientId, _: &[Key], _: &[u8], _: Flags) -> (Status, Option<WsMeta>) {
        (Status::Success, None)
    }
    fn leave_toi(&self, _: ClientId, _: &WsMeta) -> Status {
        Status::Success
    }
    fn causal_read(&self, _: std::time::Duration) -> (Status, Gtid) {
        (Status::Success, Gtid::undefined())
    }
    fn wait_for_gtid(&self, _: Gtid, _: std::time::Duration) -> Status {
        Status::Success
    }
    fn last_committed_gtid(&self) -> Gtid {
        Gtid::undefined()
    }
    fn sst_sent(&self, _: Gtid, _: i32) -> Status {
        Status::Success
    }
    fn sst_received(&self, _: Gtid, _: i32) -> Status {
        Status::Success
    }
    fn enc_set_key(&self, _: &[u8]) -> Status {
        Status::Success
    }
    fn options(&self, _: &str) -> Status {
        Status::Success
    }
    fn status(&self) -> Vec<(String, String)> {
        Vec::new()
    }
    fn name(&self) -> &str {
        "stub"
    }
    fn version(&self) -> &str {
        "0"
    }
    fn vendor(&self) -> &str {
        "test"
    }
}

struct StubClientService {
    interrupted: bool,
    commit_by_xid_status: Status,
}

impl crate::SyncPoints for StubClientService {
    fn debug_sync(&self, _: &str) {}
    fn debug_crash(&self, _: &str) {}
}

impl ClientService for StubClientService {
    fn interrupted(&self) -> bool {
        self.interrupted
    }
    fn store_globals(&self) {}
    fn reset_globals(&self) {}
    fn prepare_data_for_replication(&self, _: TransactionId) -> Result<(), Status> {
        Ok(())
    }
    fn cleanup_transaction(&self, _: TransactionId) {}
    fn bytes_generated(&self) -> u64 {
        0
    }
    fn statement_allowed_for_streaming(&self) -> bool {
        true
    }
    fn prepare_fragment_for_replication(&self, _: TransactionId) -> Result<(Vec<u8>, u64), Status> {
        Ok((Vec::new(), 0))
    }
    fn remove_fragments(&self, _: TransactionId) -> Result<(), Status> {
        Ok(())
    }
    fn bf_rollback(&self, _: TransactionId) {}
    fn will_replay(&self) {}
    fn signal_replayed(&self) {}
    fn wait_for_replayers(&self) {}
    fn replay(&self, _: &WsHandle) -> Status {
        Status::Success
    }
    fn replay_unordered(&self, _: &WsHandle) -> Status {
        Status::Success
    }
    fn emergency_shutdown(&self, _: &str) {}
    fn commit_by_xid(&self, _: &Xid) -> Status {
        self.commit_by_xid_status
    }
    fn is_explicit_xa(&self) -> bool {
        false
    }
    fn is_xa_rollback(&self) -> bool {
        false
    }
}

fn stid() -> Stid {
    Stid::new(ServerId::new([1; 16]), TransactionId::new(1), ClientId::new(1))
}

#[test]
fn new_transaction_starts_executing() {
    let txn = Transaction::new(stid());
    assert_eq!(txn.state(), TransactionState::Executing);
    assert!(!txn.is_certified());
}

#[test]
fn successful_commit_path_reaches_committed() {
    let provider = StubProvider { certify_status: Status::Success };
    let client_service = StubClientService { interrupted: false, commit_by_xid_status: Status::Success };
    let mut txn = Transaction::new(stid());
    let mut key = Key::new(KeyType::Exclusive);
    key.append_part(b"row1".to_vec()).unwrap();
    txn.append_key(&provider, key).unwrap();

    txn.before_commit(&provider, &client_service, ClientId::new(1)).unwrap();
    assert_eq!(txn.state(), TransactionState::Committing);
    txn.ordered_commit(&provider).unwrap();
    assert_eq!(txn.state(), TransactionState::OrderedCommit);
    assert!(transition_allowed(TransactionState::OrderedCommit, TransactionState::Committed));
    txn.after_commit(&provider, None, true);
    assert_eq!(txn.state(), TransactionState::Committed);
}

#[test]
fn certification_failure_leads_to_cert_failed() {
    let provider = StubProvider { certify_status: Status::CertificationFailed };
    let client_service = StubClientService { interrupted: false, commit_by_xid_status: Status::Success };
    let mut txn = Transaction::new(stid());
    let err = txn
        .before_commit(&provider, &client_service, ClientId::new(1))
        .unwrap_err();
    assert_eq!(err.kind(), crate::ClientErrorKind::DeadlockError);
    assert_eq!(txn.state(), TransactionState::CertFailed);
}

#[test]
fn bf_abort_only_admitted_from_abortable_states() {
    let provider = StubProvider { certify_status: Status::Success };
    let client_service = StubClientService { interrupted: false, commit_by_xid_status: Status::Success };
    let mut txn = Transaction::new(stid());
    assert!(txn.bf_abort(&provider, &client_service, Seqno::new(5), true));
    assert_eq!(txn.state(), TransactionState::MustAbort);
    assert!(!txn.bf_abort(&provider, &client_service, Seqno::new(6), true));
}

#[test]
fn xa_replay_of_idle_client_reaches_aborted() {
    let provider = StubProvider { certify_status: Status::Success };
    let client_service = StubClientService { interrupted: false, commit_by_xid_status: Status::Success };
    let mut txn = Transaction::new(stid());
    txn.restore_to_prepared(Xid::new(1, 0, 0, &[]).unwrap()).unwrap();
    assert!(txn.bf_abort(&provider, &client_service, Seqno::new(1), false));
    txn.route_after_bf_abort(true);
    assert_eq!(txn.state(), TransactionState::MustReplay);

    txn.xa_replay(&client_service, true).unwrap();
    assert_eq!(txn.state(), TransactionState::Aborted);
}

#[test]
fn xa_replay_commit_by_xid_failure_returns_to_prepared() {
    let provider = StubProvider { certify_status: Status::Success };
    let client_service = StubClientService { interrupted: false, commit_by_xid_status: Status::ProviderFailed };
    let mut txn = Transaction::new(stid());
    txn.restore_to_prepared(Xid::new(1, 0, 0, &[]).unwrap()).unwrap();
    assert!(txn.bf_abort(&provider, &client_service, Seqno::new(1), false));
    txn.route_after_bf_abort(true);

    let err = txn.xa_replay(&client_service, false).unwrap_err();
    assert_eq!(err.kind(), crate::ClientErrorKind::ErrorDuringCommit);
    assert_eq!(txn.state(), TransactionState::Prepared);
}

#[test]
fn committed_is_a_terminal_state() {
    for to in [
        TransactionState::Executing,
        TransactionState::Preparing,
        TransactionState::Committing,
        TransactionState::Aborting,
    ] {
        assert!(!transition_allowed(TransactionState::Committed, to));
    }
}
