use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use repwire_core::{
    ClientId, RollbackMode, ServerId, Status, StorageService, SyncPoints, Transaction,
    TransactionId, WsHandle, WsMeta, Xid,
};

/// Durable fragment keyed by `(server id, transaction id, flags, xid)`,
/// kept in memory for the simulator.
#[derive(Clone)]
struct StoredFragment {
    data: Vec<u8>,
    xid: Xid,
    meta: WsMeta,
}

/// Shared storage backing the simulator's `db::storage_service` /
/// `db::server_service` mocks: durable fragment log plus the single
/// cluster position GTID. The engine itself persists nothing; it delegates
/// to the storage service, the way `dbsim/db_storage_service.cpp` does.
#[derive(Default)]
pub struct MockStorage {
    fragments: Mutex<HashMap<TransactionId, Vec<StoredFragment>>>,
    position: Mutex<repwire_core::Gtid>,
}

impl MockStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(MockStorage {
            fragments: Mutex::new(HashMap::new()),
            position: Mutex::new(repwire_core::Gtid::undefined()),
        })
    }

    pub fn fragment_count(&self, txn_id: TransactionId) -> usize {
        self.fragments.lock().unwrap().get(&txn_id).map(Vec::len).unwrap_or(0)
    }
}

/// Debug sync points, a no-op outside of tests. The simulator records hits
/// so a workload script can assert a
/// particular crash point was reached without actually crashing.
#[derive(Default)]
pub struct MockSyncPoints {
    hits: Mutex<Vec<String>>,
}

impl MockSyncPoints {
    pub fn new() -> Self {
        MockSyncPoints::default()
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

impl SyncPoints for MockSyncPoints {
    fn debug_sync(&self, point: &str) {
        self.hits.lock().unwrap().push(point.to_string());
    }

    fn debug_crash(&self, _point: &str) {}
}

/// `db::client_service` mock: a locally-executing statement's view of
/// replication payload preparation, fragment serialization, and emergency
/// shutdown (grounded on `dbsim/db_client_service.{hpp,cpp}`).
pub struct MockClientService {
    sync_points: MockSyncPoints,
    bytes_generated: AtomicU64,
    interrupted: AtomicBool,
    emergency_shutdowns: Mutex<Vec<String>>,
    next_fragment_seq: AtomicU64,
    explicit_xa: bool,
    replays: AtomicU64,
}

impl MockClientService {
    pub fn new() -> Self {
        MockClientService {
            sync_points: MockSyncPoints::new(),
            bytes_generated: AtomicU64::new(0),
            interrupted: AtomicBool::new(false),
            emergency_shutdowns: Mutex::new(Vec::new()),
            next_fragment_seq: AtomicU64::new(0),
            explicit_xa: false,
            replays: AtomicU64::new(0),
        }
    }

    pub fn with_explicit_xa(mut self, explicit: bool) -> Self {
        self.explicit_xa = explicit;
        self
    }

    /// Workload hook: records `n` more bytes of replication payload having
    /// been generated by the active transaction (spec §8 property 7).
    pub fn generate_bytes(&self, n: u64) {
        self.bytes_generated.fetch_add(n, Ordering::SeqCst);
    }

    pub fn set_interrupted(&self, interrupted: bool) {
        self.interrupted.store(interrupted, Ordering::SeqCst);
    }

    pub fn emergency_shutdowns(&self) -> Vec<String> {
        self.emergency_shutdowns.lock().unwrap().clone()
    }

    pub fn sync_points(&self) -> &MockSyncPoints {
        &self.sync_points
    }

    /// Count of `replay`/`replay_unordered` calls this client service has
    /// serviced, the simulator's equivalent of `db::client::stats::replays`.
    pub fn replays(&self) -> u64 {
        self.replays.load(Ordering::SeqCst)
    }
}

impl Default for MockClientService {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncPoints for MockClientService {
    fn debug_sync(&self, point: &str) {
        self.sync_points.debug_sync(point);
    }

    fn debug_crash(&self, point: &str) {
        self.sync_points.debug_crash(point);
    }
}

impl repwire_core::ClientService for MockClientService {
    fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn store_globals(&self) {}
    fn reset_globals(&self) {}

    fn prepare_data_for_replication(&self, _txn_id: TransactionId) -> Result<(), Status> {
        Ok(())
    }

    fn cleanup_transaction(&self, _txn_id: TransactionId) {
        self.bytes_generated.store(0, Ordering::SeqCst);
    }

    fn bytes_generated(&self) -> u64 {
        self.bytes_generated.load(Ordering::SeqCst)
    }

    fn statement_allowed_for_streaming(&self) -> bool {
        true
    }

    fn prepare_fragment_for_replication(&self, txn_id: TransactionId) -> Result<(Vec<u8>, u64), Status> {
        let seq = self.next_fragment_seq.fetch_add(1, Ordering::SeqCst);
        let payload = format!("fragment-{}-{}", txn_id.get(), seq).into_bytes();
        let position = self.bytes_generated();
        Ok((payload, position))
    }

    fn remove_fragments(&self, _txn_id: TransactionId) -> Result<(), Status> {
        Ok(())
    }

    fn bf_rollback(&self, _txn_id: TransactionId) {}

    fn will_replay(&self) {}
    fn signal_replayed(&self) {}
    fn wait_for_replayers(&self) {}

    fn replay(&self, _ws_handle: &WsHandle) -> Status {
        Status::Success
    }

    fn replay_unordered(&self, _ws_handle: &WsHandle) -> Status {
        Status::Success
    }

    fn emergency_shutdown(&self, reason: &str) {
        self.emergency_shutdowns.lock().unwrap().push(reason.to_string());
    }

    fn commit_by_xid(&self, _xid: &Xid) -> Status {
        Status::Success
    }

    fn is_explicit_xa(&self) -> bool {
        self.explicit_xa
    }

    fn is_xa_rollback(&self) -> bool {
        false
    }
}

/// `db::high_priority_service` mock: applies write sets/fragments/TOI
/// payloads out of band the way a background applier thread would
/// (grounded on `dbsim/db_high_priority_service.cpp`).
pub struct MockHighPriorityService {
    applied: Mutex<Vec<WsMeta>>,
    replaying: AtomicBool,
}

impl MockHighPriorityService {
    pub fn new() -> Self {
        MockHighPriorityService {
            applied: Mutex::new(Vec::new()),
            replaying: AtomicBool::new(false),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }
}

impl Default for MockHighPriorityService {
    fn default() -> Self {
        Self::new()
    }
}

impl repwire_core::HighPriorityService for MockHighPriorityService {
    fn start_transaction(&mut self, _ws_handle: &WsHandle, _ws_meta: &WsMeta) -> Status {
        Status::Success
    }

    fn next_fragment(&mut self, _ws_meta: &WsMeta) -> Status {
        Status::Success
    }

    fn adopt_transaction(&mut self, _transaction: &Transaction) {}

    fn apply_write_set(&mut self, ws_meta: &WsMeta, _data: &[u8]) -> (Status, Vec<u8>) {
        self.applied.lock().unwrap().push(*ws_meta);
        (Status::Success, Vec::new())
    }

    fn append_fragment_and_commit(
        &mut self,
        _ws_handle: &WsHandle,
        ws_meta: &WsMeta,
        _data: &[u8],
        _xid: &Xid,
    ) -> Status {
        self.applied.lock().unwrap().push(*ws_meta);
        Status::Success
    }

    fn remove_fragments(&mut self, _ws_meta: &WsMeta) -> Status {
        Status::Success
    }

    fn commit(&mut self, _ws_handle: &WsHandle, _ws_meta: &WsMeta) -> Status {
        Status::Success
    }

    fn rollback(&mut self, _ws_handle: &WsHandle, _ws_meta: &WsMeta) -> Status {
        Status::Success
    }

    fn apply_toi(&mut self, _ws_meta: &WsMeta, _data: &[u8]) -> (Status, Vec<u8>) {
        (Status::Success, Vec::new())
    }

    fn apply_nbo_begin(&mut self, _ws_meta: &WsMeta, _data: &[u8]) -> (Status, Vec<u8>) {
        (Status::Success, Vec::new())
    }

    fn after_apply(&mut self) {}
    fn store_globals(&mut self) {}
    fn reset_globals(&mut self) {}

    fn log_dummy_write_set(&mut self, _ws_handle: &WsHandle, ws_meta: &WsMeta) -> Status {
        self.applied.lock().unwrap().push(*ws_meta);
        Status::Success
    }

    fn adopt_apply_error(&mut self, _err: Vec<u8>) {}

    fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }
}

/// `db::storage_service` mock scoped to one locally-processing thread's
/// fragment durability operations (grounded on `dbsim/db_storage_service.hpp`).
/// Acquired through [`MockServerService::storage_service`] inside the
/// scope guard described by spec §5/§9.
pub struct MockStorageService {
    storage: Arc<MockStorage>,
    active_txn: Option<TransactionId>,
}

impl MockStorageService {
    fn new(storage: Arc<MockStorage>) -> Self {
        MockStorageService { storage, active_txn: None }
    }
}

impl StorageService for MockStorageService {
    fn start_transaction(&mut self, ws_handle: &WsHandle) -> Result<(), Status> {
        self.active_txn = Some(ws_handle.transaction_id());
        Ok(())
    }

    fn adopt_transaction(&mut self, transaction: &Transaction) {
        self.active_txn = Some(transaction.id());
    }

    fn append_fragment(
        &mut self,
        _server_id: ServerId,
        txn_id: TransactionId,
        _flags: repwire_core::Flags,
        data: &[u8],
        xid: &Xid,
    ) -> Result<(), Status> {
        self.storage
            .fragments
            .lock()
            .unwrap()
            .entry(txn_id)
            .or_default()
            .push(StoredFragment {
                data: data.to_vec(),
                xid: xid.clone(),
                meta: WsMeta::default(),
            });
        Ok(())
    }

    fn update_fragment_meta(&mut self, ws_meta: &WsMeta) -> Result<(), Status> {
        if let Some(txn_id) = self.active_txn {
            if let Some(frags) = self.storage.fragments.lock().unwrap().get_mut(&txn_id) {
                if let Some(last) = frags.last_mut() {
                    last.meta = *ws_meta;
                }
            }
        }
        Ok(())
    }

    fn remove_fragments(&mut self) -> Result<(), Status> {
        if let Some(txn_id) = self.active_txn {
            self.storage.fragments.lock().unwrap().remove(&txn_id);
        }
        Ok(())
    }

    fn commit(&mut self, _ws_handle: &WsHandle, ws_meta: &WsMeta) -> Result<(), Status> {
        if !ws_meta.gtid().is_undefined() {
            *self.storage.position.lock().unwrap() = ws_meta.gtid();
        }
        Ok(())
    }

    fn rollback(&mut self, _ws_handle: &WsHandle, _ws_meta: &WsMeta) -> Result<(), Status> {
        if let Some(txn_id) = self.active_txn {
            self.storage.fragments.lock().unwrap().remove(&txn_id);
        }
        Ok(())
    }

    fn store_globals(&mut self) {}
    fn reset_globals(&mut self) {}
}

/// `db::server_service` mock: the factory for the other three seams, plus
/// the background-rollback scheduler (grounded on `dbsim/db_server_service.cpp`).
pub struct MockServerService {
    storage: Arc<MockStorage>,
    rollback_mode: RollbackMode,
    rollback_requests: Mutex<Vec<(ClientId, TransactionId)>>,
    state_changes: Mutex<Vec<(ClientId, String, String)>>,
    stopped_streaming_clients: Mutex<Vec<ClientId>>,
}

impl MockServerService {
    pub fn new(storage: Arc<MockStorage>, rollback_mode: RollbackMode) -> Arc<Self> {
        Arc::new(MockServerService {
            storage,
            rollback_mode,
            rollback_requests: Mutex::new(Vec::new()),
            state_changes: Mutex::new(Vec::new()),
            stopped_streaming_clients: Mutex::new(Vec::new()),
        })
    }

    /// Concretely-typed equivalent of [`ServerService::storage_service`], for
    /// callers (the simulator, tests) that want the mock's extra inspection
    /// methods without downcasting the trait object.
    pub fn mock_storage_service(&self) -> MockStorageService {
        MockStorageService::new(self.storage.clone())
    }

    pub fn pending_rollbacks(&self) -> Vec<(ClientId, TransactionId)> {
        self.rollback_requests.lock().unwrap().clone()
    }

    pub fn stopped_streaming_clients(&self) -> Vec<ClientId> {
        self.stopped_streaming_clients.lock().unwrap().clone()
    }

    pub fn storage(&self) -> &Arc<MockStorage> {
        &self.storage
    }
}

impl repwire_core::ServerService for MockServerService {
    fn rollback_mode(&self) -> RollbackMode {
        self.rollback_mode
    }

    fn initiate_background_rollback(&self, client_id: ClientId, txn_id: TransactionId) {
        self.rollback_requests.lock().unwrap().push((client_id, txn_id));
    }

    fn log_state_change(&self, client_id: ClientId, from: &str, to: &str) {
        self.state_changes
            .lock()
            .unwrap()
            .push((client_id, from.to_string(), to.to_string()));
    }

    fn last_committed_gtid(&self) -> repwire_core::Gtid {
        *self.storage.position.lock().unwrap()
    }

    fn set_position(&self, gtid: repwire_core::Gtid) {
        *self.storage.position.lock().unwrap() = gtid;
    }

    fn storage_service(&self) -> Box<dyn StorageService> {
        Box::new(self.mock_storage_service())
    }

    fn stop_streaming_client(&self, client_id: ClientId) {
        self.stopped_streaming_clients.lock().unwrap().push(client_id);
    }
}

#[cfg(test)]
#[path = "test/mock_services.rs"]
mod test;
