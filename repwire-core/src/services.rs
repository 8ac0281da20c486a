use crate::{ClientId, Key, KeyArray, Provider, Status, TransactionId, Transaction, WsHandle, WsMeta, Xid};

/// A named point the engine pauses at so a test harness can deterministically
/// interleave a BF-abort injection with the code under test, grounded on
/// `client_service::debug_sync`/`debug_crash` in `client_state.cpp`. A no-op
/// in a production DBMS integration.
pub trait SyncPoints: Send + Sync {
    fn debug_sync(&self, point: &str);
    fn debug_crash(&self, point: &str);
}

/// A `SyncPoints` that does nothing, for embedders that don't want the hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSyncPoints;

impl SyncPoints for NoSyncPoints {
    fn debug_sync(&self, _point: &str) {}
    fn debug_crash(&self, _point: &str) {}
}

/// Capabilities the DBMS supplies for a locally-executing client session
/// (`wsrep::client_service`).
///
/// Every method takes `&self`: the owning command thread, a background
/// rollbacker, and a BF-abort caller may all reach the same client session's
/// `client_service` while holding only the session's mutex for protection,
/// the same reentrancy contract already required of [`Provider`].
/// Implementations use interior mutability (atomics, a mutex) the way
/// `db::client_service` guards its mutable fields.
pub trait ClientService: SyncPoints {
    /// True if the DBMS-side connection for this client has been torn down;
    /// used to cut short TOI polling and command processing.
    fn interrupted(&self) -> bool;

    fn store_globals(&self);
    fn reset_globals(&self);

    /// Serializes accumulated replication payload for the active
    /// transaction; failure is reported as size-exceeded.
    fn prepare_data_for_replication(&self, txn_id: TransactionId) -> Result<(), Status>;

    fn cleanup_transaction(&self, txn_id: TransactionId);

    /// Monotonically non-decreasing count of bytes generated by the
    /// current transaction so far.
    fn bytes_generated(&self) -> u64;

    fn statement_allowed_for_streaming(&self) -> bool;

    /// Serializes the next streaming fragment and the log position at
    /// which it was produced.
    fn prepare_fragment_for_replication(&self, txn_id: TransactionId) -> Result<(Vec<u8>, u64), Status>;

    fn remove_fragments(&self, txn_id: TransactionId) -> Result<(), Status>;

    fn bf_rollback(&self, txn_id: TransactionId);

    fn will_replay(&self);
    fn signal_replayed(&self);
    fn wait_for_replayers(&self);

    fn replay(&self, ws_handle: &WsHandle) -> Status;
    fn replay_unordered(&self, ws_handle: &WsHandle) -> Status;

    fn emergency_shutdown(&self, reason: &str);

    fn commit_by_xid(&self, xid: &Xid) -> Status;
    fn is_explicit_xa(&self) -> bool;
    fn is_xa_rollback(&self) -> bool;
}

/// Capabilities the DBMS supplies for applying write sets out of band:
/// high-priority appliers, streaming-fragment appliers, and replayers all
/// go through this seam (`wsrep::high_priority_service`).
pub trait HighPriorityService: Send {
    fn start_transaction(&mut self, ws_handle: &WsHandle, ws_meta: &WsMeta) -> Status;
    fn next_fragment(&mut self, ws_meta: &WsMeta) -> Status;
    fn adopt_transaction(&mut self, transaction: &Transaction);
    fn apply_write_set(&mut self, ws_meta: &WsMeta, data: &[u8]) -> (Status, Vec<u8>);
    fn append_fragment_and_commit(
        &mut self,
        ws_handle: &WsHandle,
        ws_meta: &WsMeta,
        data: &[u8],
        xid: &Xid,
    ) -> Status;
    fn remove_fragments(&mut self, ws_meta: &WsMeta) -> Status;
    fn commit(&mut self, ws_handle: &WsHandle, ws_meta: &WsMeta) -> Status;
    fn rollback(&mut self, ws_handle: &WsHandle, ws_meta: &WsMeta) -> Status;
    fn apply_toi(&mut self, ws_meta: &WsMeta, data: &[u8]) -> (Status, Vec<u8>);
    fn apply_nbo_begin(&mut self, ws_meta: &WsMeta, data: &[u8]) -> (Status, Vec<u8>);
    fn after_apply(&mut self);
    fn store_globals(&mut self);
    fn reset_globals(&mut self);
    fn log_dummy_write_set(&mut self, ws_handle: &WsHandle, ws_meta: &WsMeta) -> Status;
    fn adopt_apply_error(&mut self, err: Vec<u8>);
    fn is_replaying(&self) -> bool;
}

/// Storage access for durably recording streaming-transaction fragments,
/// used only from the locally-processing transaction's own thread
/// (`wsrep::storage_service`). Acquired through [`ServerService::storage_service`]
/// inside a scope guard (§5, §9) that restores globals on every exit path.
pub trait StorageService {
    fn start_transaction(&mut self, ws_handle: &WsHandle) -> Result<(), Status>;
    fn adopt_transaction(&mut self, transaction: &Transaction);
    fn append_fragment(
        &mut self,
        server_id: crate::ServerId,
        txn_id: TransactionId,
        flags: crate::Flags,
        data: &[u8],
        xid: &Xid,
    ) -> Result<(), Status>;
    fn update_fragment_meta(&mut self, ws_meta: &WsMeta) -> Result<(), Status>;
    fn remove_fragments(&mut self) -> Result<(), Status>;
    fn commit(&mut self, ws_handle: &WsHandle, ws_meta: &WsMeta) -> Result<(), Status>;
    fn rollback(&mut self, ws_handle: &WsHandle, ws_meta: &WsMeta) -> Result<(), Status>;
    fn store_globals(&mut self);
    fn reset_globals(&mut self);
}

/// Whether a BF-abort victim is rolled back by the thread that detects the
/// abort, or handed off to a background rollbacker thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RollbackMode {
    Sync,
    Async,
}

/// The server-wide factory/registry of the other three service seams, plus
/// SST and view-storage hooks (`wsrep::server_service`).
pub trait ServerService: Send + Sync {
    fn rollback_mode(&self) -> RollbackMode;

    /// Schedules the background rollbacker to finish aborting `txn_id` on
    /// behalf of an idle session.
    fn initiate_background_rollback(&self, client_id: ClientId, txn_id: TransactionId);

    fn log_state_change(&self, client_id: ClientId, from: &str, to: &str);

    fn last_committed_gtid(&self) -> crate::Gtid;
    fn set_position(&self, gtid: crate::Gtid);

    /// Hands out a fresh [`StorageService`] scoped to the calling thread's
    /// current fragment-durability operation. Boxed rather than associated-typed so
    /// the seam stays object-safe, the way the other three seams are
    /// produced through this factory in `wsrep::server_service`.
    fn storage_service(&self) -> Box<dyn StorageService>;

    /// DBMS-side bookkeeping that a streaming client is no longer
    /// registered as such, called once after a streaming transaction's
    /// `after_commit`/replay concludes in local mode, grounded on
    /// `server_state::stop_streaming_client`: not itself one of the four
    /// core service seams, but required to complete the streaming commit
    /// sequence those seams document.
    fn stop_streaming_client(&self, client_id: ClientId);
}

/// Serialized certification key set re-seeded at commit time for a
/// streaming transaction.
pub type StoredKeys = KeyArray;

#[cfg(test)]
#[path = "test/services.rs"]
mod test;
