use std::sync::Arc;
use std::time::Duration;

use crate::provider::{Status, WsHandle, WsMeta};
use crate::{
    ClientId, ClientService, ClientSession, ClientSessionMode, ClientSessionState, Flags, Gtid,
    Key, Provider, RollbackMode, Seqno, ServerId, ServerService, StorageService, SyncPoints,
    TransactionId, Transaction, Xid,
};

use super::{mode_transition_allowed, state_transition_allowed};

struct NopProvider;

impl Provider for NopProvider {
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
    fn certify(&self, _: ClientId, _: &WsHandle, _: Flags) -> (Status, Option<WsMeta>) {
        (Status::Success, None)
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
        let meta = WsMeta::new(
            Gtid::new(ServerId::new([9; 16]), Seqno::new(7)),
            crate::Stid::default(),
            Seqno::undefined(),
            Flags::NONE,
        );
        (Status::Success, Some(meta))
    }
    fn leave_toi(&self, _: ClientId, _: &WsMeta) -> Status {
        Status::Success
    }
    fn causal_read(&self, _: Duration) -> (Status, Gtid) {
        (Status::Success, Gtid::new(ServerId::new([1; 16]), Seqno::new(3)))
    }
    fn wait_for_gtid(&self, _: Gtid, _: Duration) -> Status {
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
        "nop"
    }
    fn version(&self) -> &str {
        "0"
    }
    fn vendor(&self) -> &str {
        "test"
    }
}

struct NopStorageService;

impl StorageService for NopStorageService {
    fn start_transaction(&mut self, _: &WsHandle) -> Result<(), Status> {
        Ok(())
    }
    fn adopt_transaction(&mut self, _: &Transaction) {}
    fn append_fragment(
        &mut self,
        _: ServerId,
        _: TransactionId,
        _: crate::Flags,
        _: &[u8],
        _: &Xid,
    ) -> Result<(), Status> {
        Ok(())
    }
    fn update_fragment_meta(&mut self, _: &WsMeta) -> Result<(), Status> {
        Ok(())
    }
    fn remove_fragments(&mut self) -> Result<(), Status> {
        Ok(())
    }
    fn commit(&mut self, _: &WsHandle, _: &WsMeta) -> Result<(), Status> {
        Ok(())
    }
    fn rollback(&mut self, _: &WsHandle, _: &WsMeta) -> Result<(), Status> {
        Ok(())
    }
    fn store_globals(&mut self) {}
    fn reset_globals(&mut self) {}
}

struct NopServerService;

impl ServerService for NopServerService {
    fn rollback_mode(&self) -> RollbackMode {
        RollbackMode::Sync
    }
    fn initiate_background_rollback(&self, _: ClientId, _: TransactionId) {}
    fn log_state_change(&self, _: ClientId, _: &str, _: &str) {}
    fn last_committed_gtid(&self) -> Gtid {
        Gtid::undefined()
    }
    fn set_position(&self, _: Gtid) {}
    fn storage_service(&self) -> Box<dyn StorageService> {
        Box::new(NopStorageService)
    }
    fn stop_streaming_client(&self, _: ClientId) {}
}

struct NopClientService;

impl SyncPoints for NopClientService {
    fn debug_sync(&self, _: &str) {}
    fn debug_crash(&self, _: &str) {}
}

impl ClientService for NopClientService {
    fn interrupted(&self) -> bool {
        false
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
        Status::Success
    }
    fn is_explicit_xa(&self) -> bool {
        false
    }
    fn is_xa_rollback(&self) -> bool {
        false
    }
}

fn new_session() -> ClientSession {
    let provider: Arc<dyn Provider> = Arc::new(NopProvider);
    let server: Arc<dyn ServerService> = Arc::new(NopServerService);
    let client_service: Arc<dyn ClientService> = Arc::new(NopClientService);
    ClientSession::new(ClientId::new(1), ServerId::new([3; 16]), provider, server, client_service)
}

#[test]
fn open_moves_session_to_idle() {
    let session = new_session();
    session.open();
    assert_eq!(session.state(), ClientSessionState::Idle);
}

#[test]
fn before_command_acquires_exec_then_release_returns_idle() {
    let session = new_session();
    session.open();
    session.before_command(false).unwrap();
    assert_eq!(session.state(), ClientSessionState::Exec);
    session.after_command_before_result();
    session.after_command_after_result();
    assert_eq!(session.state(), ClientSessionState::Idle);
}

#[test]
fn toi_round_trip_updates_last_written_gtid() {
    let session = new_session();
    session.open();
    session.before_command(false).unwrap();
    let mut client_service = NopClientService;
    session
        .enter_toi_local(&mut client_service, &[], &[], None)
        .expect("enter_toi_local should succeed against a success-only provider");
    assert_eq!(session.mode(), ClientSessionMode::Toi);
    session.leave_toi_local(&[]).expect("leave_toi_local should succeed");
    assert_eq!(session.mode(), ClientSessionMode::Local);
    assert!(!session.last_written_gtid().is_undefined());
}

#[test]
fn rsu_round_trip_restores_prior_mode() {
    let session = new_session();
    session.open();
    session.before_command(false).unwrap();
    session.begin_rsu().expect("begin_rsu should succeed");
    assert_eq!(session.mode(), ClientSessionMode::Rsu);
    session.end_rsu().expect("end_rsu should succeed");
    assert_eq!(session.mode(), ClientSessionMode::Local);
}

#[test]
fn session_state_matrix_allows_idle_to_quitting_and_exec() {
    assert!(state_transition_allowed(ClientSessionState::Idle, ClientSessionState::Quitting));
    assert!(state_transition_allowed(ClientSessionState::Idle, ClientSessionState::Exec));
    assert!(!state_transition_allowed(ClientSessionState::Idle, ClientSessionState::None));
}

#[test]
fn session_mode_matrix_forbids_toi_to_rsu() {
    assert!(!mode_transition_allowed(ClientSessionMode::Toi, ClientSessionMode::Rsu));
    assert!(mode_transition_allowed(ClientSessionMode::Local, ClientSessionMode::Toi));
}
