use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

use repwire_core::{
    ClientId, Flags, Gtid, HighPriorityService, Key, Provider, Seqno, ServerId, Status, Stid,
    TransactionId, WsHandle, WsMeta,
};

/// Mock replication provider for the simulator (grounded on
/// `wsrep::mock_provider`). Assigns a strictly increasing cluster-wide
/// `group_seqno_` on every successful certify/enter_toi and supports
/// injecting `bf_abort` events ahead of time, the way `dbsim`'s test
/// harness does, so a workload script can deterministically provoke BF
/// aborts and TOI contention rather than relying on real concurrency.
pub struct MockProvider {
    server_id: ServerId,
    group_id: ServerId,
    state: Mutex<MockState>,
}

struct MockState {
    group_seqno: i64,
    bf_abort_map: HashMap<TransactionId, Seqno>,
    start_fragments: u64,
    fragments: u64,
    commit_fragments: u64,
    rollback_fragments: u64,
    toi_write_sets: u64,
    certify_result: Status,
    commit_order_enter_result: Status,
    commit_order_leave_result: Status,
    release_result: Status,
    connection_failed_once: HashMap<TransactionId, u32>,
}

impl MockProvider {
    pub fn new(server_id: ServerId, group_id: ServerId) -> Self {
        MockProvider {
            server_id,
            group_id,
            state: Mutex::new(MockState {
                group_seqno: 0,
                bf_abort_map: HashMap::new(),
                start_fragments: 0,
                fragments: 0,
                commit_fragments: 0,
                rollback_fragments: 0,
                toi_write_sets: 0,
                certify_result: Status::Success,
                commit_order_enter_result: Status::Success,
                commit_order_leave_result: Status::Success,
                release_result: Status::Success,
                connection_failed_once: HashMap::new(),
            }),
        }
    }

    /// Test/workload control surface: forces the next `certify` call to
    /// return `status` instead of `Success`, mirroring `mock_provider`'s
    /// public `certify_result_` field.
    pub fn set_certify_result(&self, status: Status) {
        self.state.lock().unwrap().certify_result = status;
    }

    pub fn set_commit_order_leave_result(&self, status: Status) {
        self.state.lock().unwrap().commit_order_leave_result = status;
    }

    /// Arranges for `certify`/`enter_toi` on `txn_id` to fail once with
    /// `connection_failed` before succeeding, used to exercise TOI's
    /// transient-retry path (spec §8 scenario S6).
    pub fn fail_connection_once(&self, txn_id: TransactionId, times: u32) {
        self.state
            .lock()
            .unwrap()
            .connection_failed_once
            .insert(txn_id, times);
    }

    pub fn fragments(&self) -> u64 {
        self.state.lock().unwrap().fragments
    }

    pub fn rollback_fragments(&self) -> u64 {
        self.state.lock().unwrap().rollback_fragments
    }

    pub fn commit_fragments(&self) -> u64 {
        self.state.lock().unwrap().commit_fragments
    }

    pub fn toi_write_sets(&self) -> u64 {
        self.state.lock().unwrap().toi_write_sets
    }

    fn next_seqno(state: &mut MockState) -> Seqno {
        state.group_seqno += 1;
        Seqno::new(state.group_seqno)
    }

    fn consume_connection_failure(state: &mut MockState, txn_id: TransactionId) -> bool {
        if let Some(remaining) = state.connection_failed_once.get_mut(&txn_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

fn flags_of(flags: Flags) -> (bool, bool, bool) {
    (
        flags.contains(Flags::START_TRANSACTION),
        flags.contains(Flags::COMMIT),
        flags.contains(Flags::ROLLBACK),
    )
}

impl Provider for MockProvider {
    fn connect(&self, _cluster_name: &str, _cluster_address: &str, _state_donor: &str) -> Status {
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
        let mut state = self.state.lock().unwrap();
        Ok(Self::next_seqno(&mut state))
    }

    fn resume(&self) -> Status {
        Status::Success
    }

    fn run_applier(&self, _high_priority: &mut dyn HighPriorityService) -> Status {
        Status::Success
    }

    fn start_transaction(&self, ws_handle: &mut WsHandle) -> Status {
        *ws_handle = WsHandle::with_opaque(ws_handle.transaction_id(), 1);
        Status::Success
    }

    fn assign_read_view(&self, _gtid: Option<Gtid>) -> Status {
        Status::Success
    }

    fn append_key(&self, _ws_handle: &WsHandle, _key: &Key) -> Status {
        Status::Success
    }

    fn append_data(&self, _ws_handle: &WsHandle, _data: &[u8]) -> Status {
        Status::Success
    }

    fn certify(&self, client_id: ClientId, ws_handle: &WsHandle, flags: Flags) -> (Status, Option<WsMeta>) {
        let mut state = self.state.lock().unwrap();
        debug!(target: "repwire::mock_provider", client = ?client_id, txn = ?ws_handle.transaction_id(), ?flags, "certify");

        if state.certify_result != Status::Success {
            let result = state.certify_result;
            state.certify_result = Status::Success;
            return (result, None);
        }

        if Self::consume_connection_failure(&mut state, ws_handle.transaction_id()) {
            return (Status::ConnectionFailed, None);
        }

        let (starts, commits, rolls_back) = flags_of(flags);
        state.fragments += 1;
        if starts {
            state.start_fragments += 1;
        }
        if commits {
            state.commit_fragments += 1;
        }
        if rolls_back {
            state.rollback_fragments += 1;
        }

        let stid = Stid::new(self.server_id, ws_handle.transaction_id(), client_id);
        match state.bf_abort_map.remove(&ws_handle.transaction_id()) {
            None => {
                let seqno = Self::next_seqno(&mut state);
                let gtid = Gtid::new(self.group_id, seqno);
                let meta = WsMeta::new(gtid, stid, Seqno::new(seqno.get() - 1), flags);
                (Status::Success, Some(meta))
            }
            Some(bf_seqno) => {
                if bf_seqno.is_undefined() {
                    (Status::CertificationFailed, None)
                } else {
                    let seqno = Self::next_seqno(&mut state);
                    let gtid = Gtid::new(self.group_id, seqno);
                    let meta = WsMeta::new(gtid, stid, Seqno::new(seqno.get() - 1), flags);
                    (Status::BfAbort, Some(meta))
                }
            }
        }
    }

    fn bf_abort(&self, bf_seqno: Seqno, txn_id: TransactionId, victim_seqno: &mut Seqno) -> Status {
        let mut state = self.state.lock().unwrap();
        state.bf_abort_map.insert(txn_id, bf_seqno);
        if !bf_seqno.is_undefined() {
            state.group_seqno = bf_seqno.get();
        }
        *victim_seqno = Seqno::undefined();
        Status::Success
    }

    fn rollback(&self, _txn_id: TransactionId) -> Status {
        let mut state = self.state.lock().unwrap();
        state.fragments += 1;
        state.rollback_fragments += 1;
        Status::Success
    }

    fn commit_order_enter(&self, ws_handle: &WsHandle, ws_meta: &WsMeta) -> Status {
        debug_assert!(ws_handle.opaque() != 0);
        debug_assert!(!ws_meta.seqno().is_undefined());
        self.state.lock().unwrap().commit_order_enter_result
    }

    fn commit_order_leave(&self, ws_handle: &WsHandle, ws_meta: &WsMeta, err: &[u8]) -> Status {
        debug_assert!(ws_handle.opaque() != 0);
        debug_assert!(!ws_meta.seqno().is_undefined());
        if !err.is_empty() {
            return Status::Fatal;
        }
        self.state.lock().unwrap().commit_order_leave_result
    }

    fn release(&self, _ws_handle: &mut WsHandle) -> Status {
        self.state.lock().unwrap().release_result
    }

    fn replay(&self, ws_handle: &WsHandle, high_priority: &mut dyn HighPriorityService) -> Status {
        let mut state = self.state.lock().unwrap();
        let seqno = Self::next_seqno(&mut state);
        let gtid = Gtid::new(self.group_id, seqno);
        let stid = Stid::new(self.server_id, ws_handle.transaction_id(), ClientId::undefined());
        let meta = WsMeta::new(
            gtid,
            stid,
            Seqno::new(seqno.get() - 1),
            Flags::START_TRANSACTION | Flags::COMMIT,
        );
        drop(state);
        let (status, _err) = high_priority.apply_write_set(&meta, &[]);
        if status.is_success() {
            Status::Success
        } else {
            Status::Fatal
        }
    }

    fn enter_toi(&self, client_id: ClientId, _keys: &[Key], _data: &[u8], flags: Flags) -> (Status, Option<WsMeta>) {
        let mut state = self.state.lock().unwrap();
        if state.certify_result != Status::Success {
            let result = state.certify_result;
            state.certify_result = Status::Success;
            return (result, None);
        }
        let txn_id = TransactionId::undefined();
        if Self::consume_connection_failure(&mut state, txn_id) {
            return (Status::ConnectionFailed, None);
        }
        let seqno = Self::next_seqno(&mut state);
        let gtid = Gtid::new(self.group_id, seqno);
        let stid = Stid::new(self.server_id, TransactionId::undefined(), client_id);
        let meta = WsMeta::new(gtid, stid, Seqno::new(seqno.get() - 1), flags);
        state.toi_write_sets += 1;
        (Status::Success, Some(meta))
    }

    fn leave_toi(&self, _client_id: ClientId, _meta: &WsMeta) -> Status {
        Status::Success
    }

    fn causal_read(&self, _timeout: Duration) -> (Status, Gtid) {
        (Status::NotImplemented, Gtid::undefined())
    }

    fn wait_for_gtid(&self, _gtid: Gtid, _timeout: Duration) -> Status {
        Status::Success
    }

    fn last_committed_gtid(&self) -> Gtid {
        Gtid::undefined()
    }

    fn sst_sent(&self, _gtid: Gtid, _status: i32) -> Status {
        Status::Success
    }

    fn sst_received(&self, _gtid: Gtid, _status: i32) -> Status {
        Status::Success
    }

    fn enc_set_key(&self, _key: &[u8]) -> Status {
        Status::Success
    }

    fn options(&self, _opts: &str) -> Status {
        Status::Success
    }

    fn status(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        vec![
            ("fragments".into(), state.fragments.to_string()),
            ("commit_fragments".into(), state.commit_fragments.to_string()),
            ("rollback_fragments".into(), state.rollback_fragments.to_string()),
            ("toi_write_sets".into(), state.toi_write_sets.to_string()),
        ]
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> &str {
        "0.0"
    }

    fn vendor(&self) -> &str {
        "repwire-sim"
    }
}

#[cfg(test)]
#[path = "test/mock_provider.rs"]
mod test;
