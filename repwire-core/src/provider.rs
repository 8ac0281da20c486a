use std::time::Duration;

use crate::{ClientId, Flags, Gtid, Key, Seqno, ServerId, Stid, TransactionId};

/// Opaque write-set handle: a transaction id plus a provider-owned token.
/// The engine must round-trip the token across calls that share the same
/// logical write-set but must never interpret it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WsHandle {
    transaction_id: TransactionId,
    opaque: usize,
}

impl WsHandle {
    pub fn new(transaction_id: TransactionId) -> Self {
        WsHandle {
            transaction_id,
            opaque: 0,
        }
    }

    pub fn with_opaque(transaction_id: TransactionId, opaque: usize) -> Self {
        WsHandle {
            transaction_id,
            opaque,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn opaque(&self) -> usize {
        self.opaque
    }
}

/// Replication metadata assigned to a write-set once it has been ordered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WsMeta {
    gtid: Gtid,
    stid: Stid,
    depends_on: Seqno,
    flags: Flags,
}

impl WsMeta {
    pub fn new(gtid: Gtid, stid: Stid, depends_on: Seqno, flags: Flags) -> Self {
        WsMeta {
            gtid,
            stid,
            depends_on,
            flags,
        }
    }

    pub fn from_stid(stid: Stid) -> Self {
        WsMeta {
            gtid: Gtid::undefined(),
            stid,
            depends_on: Seqno::undefined(),
            flags: Flags::NONE,
        }
    }

    pub fn gtid(&self) -> Gtid {
        self.gtid
    }

    pub fn server_id(&self) -> ServerId {
        self.stid.server_id()
    }

    pub fn client_id(&self) -> ClientId {
        self.stid.client_id()
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.stid.transaction_id()
    }

    pub fn seqno(&self) -> Seqno {
        self.gtid.seqno()
    }

    pub fn ordered(&self) -> bool {
        !self.gtid.is_undefined()
    }

    pub fn depends_on(&self) -> Seqno {
        self.depends_on
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn stid(&self) -> Stid {
        self.stid
    }
}

/// Status codes the engine maps every provider call onto (`wsrep::provider::status`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Success,
    Warning,
    TransactionMissing,
    CertificationFailed,
    BfAbort,
    SizeExceeded,
    ConnectionFailed,
    ProviderFailed,
    Fatal,
    NotImplemented,
    NotAllowed,
    Unknown,
}

impl Status {
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Success => "success",
            Status::Warning => "warning",
            Status::TransactionMissing => "transaction_missing",
            Status::CertificationFailed => "certification_failed",
            Status::BfAbort => "bf_abort",
            Status::SizeExceeded => "size_exceeded",
            Status::ConnectionFailed => "connection_failed",
            Status::ProviderFailed => "provider_failed",
            Status::Fatal => "fatal",
            Status::NotImplemented => "not_implemented",
            Status::NotAllowed => "not_allowed",
            Status::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The replication-provider binary interface the engine drives. A real
/// implementation loads a group-communication/certification engine at
/// runtime; `repwire-sim` supplies a mock.
///
/// All methods take `&self`: providers are shared read-only and reentrant
/// from any thread.
pub trait Provider: Send + Sync {
    fn connect(&self, cluster_name: &str, cluster_address: &str, state_donor: &str) -> Status;
    fn disconnect(&self) -> Status;
    fn capabilities(&self) -> u32;
    fn desync(&self) -> Status;
    fn resync(&self) -> Status;
    fn pause(&self) -> Result<Seqno, Status>;
    fn resume(&self) -> Status;
    fn run_applier(&self, high_priority: &mut dyn crate::HighPriorityService) -> Status;

    fn start_transaction(&self, ws_handle: &mut WsHandle) -> Status;
    fn assign_read_view(&self, gtid: Option<Gtid>) -> Status;
    fn append_key(&self, ws_handle: &WsHandle, key: &Key) -> Status;
    fn append_data(&self, ws_handle: &WsHandle, data: &[u8]) -> Status;

    fn certify(&self, client_id: ClientId, ws_handle: &WsHandle, flags: Flags) -> (Status, Option<WsMeta>);

    /// Requests preemption of a locally-running transaction. `victim_seqno`
    /// receives the provider's last-known certified seqno for the victim,
    /// if any.
    fn bf_abort(
        &self,
        bf_seqno: Seqno,
        txn_id: TransactionId,
        victim_seqno: &mut Seqno,
    ) -> Status;

    fn rollback(&self, txn_id: TransactionId) -> Status;

    fn commit_order_enter(&self, ws_handle: &WsHandle, meta: &WsMeta) -> Status;
    fn commit_order_leave(&self, ws_handle: &WsHandle, meta: &WsMeta, err: &[u8]) -> Status;
    fn release(&self, ws_handle: &mut WsHandle) -> Status;

    fn replay(&self, ws_handle: &WsHandle, high_priority: &mut dyn crate::HighPriorityService) -> Status;

    fn enter_toi(
        &self,
        client_id: ClientId,
        keys: &[Key],
        data: &[u8],
        flags: Flags,
    ) -> (Status, Option<WsMeta>);
    fn leave_toi(&self, client_id: ClientId, meta: &WsMeta) -> Status;

    fn causal_read(&self, timeout: Duration) -> (Status, Gtid);
    fn wait_for_gtid(&self, gtid: Gtid, timeout: Duration) -> Status;
    fn last_committed_gtid(&self) -> Gtid;

    fn sst_sent(&self, gtid: Gtid, status: i32) -> Status;
    fn sst_received(&self, gtid: Gtid, status: i32) -> Status;
    fn enc_set_key(&self, key: &[u8]) -> Status;

    fn options(&self, opts: &str) -> Status;
    fn status(&self) -> Vec<(String, String)>;

    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn vendor(&self) -> &str;
}

#[cfg(test)]
#[path = "test/provider.rs"]
mod test;
