use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::{
    ClientError, ClientErrorKind, ClientService, Flags, Gtid, Key, Provider, Seqno, ServerId,
    Status, Stid, StorageService, StoredKeys, StreamingContext, TransactionId, WsHandle, WsMeta,
    Xid,
};

const STATE_HISTORY_LIMIT: usize = 12;

/// Transaction lifecycle states, grounded on `wsrep::transaction::state` in
/// `transaction.cpp`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionState {
    Executing,
    Preparing,
    Prepared,
    Certifying,
    Committing,
    OrderedCommit,
    Committed,
    CertFailed,
    MustAbort,
    Aborting,
    Aborted,
    MustReplay,
    Replaying,
}

use TransactionState as S;

const N_STATES: usize = 13;

fn state_index(s: S) -> usize {
    match s {
        S::Executing => 0,
        S::Preparing => 1,
        S::Prepared => 2,
        S::Certifying => 3,
        S::Committing => 4,
        S::OrderedCommit => 5,
        S::Committed => 6,
        S::CertFailed => 7,
        S::MustAbort => 8,
        S::Aborting => 9,
        S::Aborted => 10,
        S::MustReplay => 11,
        S::Replaying => 12,
    }
}

// Rows = from, columns = to; matches `transaction.cpp`'s
// `allowed_transitions_` table exactly (ex pg pd ce co oc ct cf ma ab ad mr re).
#[rustfmt::skip]
const ALLOWED: [[bool; N_STATES]; N_STATES] = [
    /* ex */ [false, true,  false, true,  false, false, false, false, true,  true,  false, false, false],
    /* pg */ [false, false, true,  false, true,  false, false, false, true,  false, false, false, false],
    /* pd */ [false, false, false, true,  true,  false, false, false, true,  true,  false, false, false],
    /* ce */ [true,  true,  true,  false, true,  false, false, true,  true,  false, false, false, false],
    /* co */ [false, false, false, false, false, true,  true,  false, true,  false, false, false, false],
    /* oc */ [false, false, false, false, false, false, true,  false, false, false, false, false, false],
    /* ct */ [false, false, false, false, false, false, false, false, false, false, false, false, false],
    /* cf */ [false, false, false, false, false, false, false, false, false, true,  false, false, false],
    /* ma */ [false, false, false, false, false, false, false, true,  false, true,  false, true,  false],
    /* ab */ [false, false, false, false, false, false, false, false, false, false, true,  false, false],
    /* ad */ [false, false, false, false, false, false, false, false, false, false, false, false, false],
    /* mr */ [false, false, false, false, false, false, false, false, false, false, false, false, true ],
    /* re */ [false, true,  false, false, true,  false, true,  false, false, false, true,  false, false],
];

/// Returns `true` if `from -> to` is a legal transaction-state transition.
pub fn transition_allowed(from: TransactionState, to: TransactionState) -> bool {
    ALLOWED[state_index(from)][state_index(to)]
}

/// Per-transaction entity, grounded on `wsrep::transaction` in `transaction.cpp`.
#[derive(Debug)]
pub struct Transaction {
    stid: Stid,
    xid: Xid,
    ws_handle: WsHandle,
    ws_meta: WsMeta,
    state: TransactionState,
    state_hist: VecDeque<TransactionState>,
    bf_abort_state: Option<TransactionState>,
    bf_aborted_in_total_order: bool,
    flags: Flags,
    pa_unsafe: bool,
    implicit_deps: bool,
    certified: bool,
    fragments_certified_for_statement: u32,
    streaming: StreamingContext,
    stored_keys: StoredKeys,
    apply_error: Vec<u8>,
}

impl Transaction {
    pub fn new(stid: Stid) -> Self {
        Transaction {
            stid,
            xid: Xid::null(),
            ws_handle: WsHandle::new(stid.transaction_id()),
            ws_meta: WsMeta::from_stid(stid),
            state: S::Executing,
            state_hist: VecDeque::with_capacity(STATE_HISTORY_LIMIT),
            bf_abort_state: None,
            bf_aborted_in_total_order: false,
            flags: Flags::NONE,
            pa_unsafe: false,
            implicit_deps: false,
            certified: false,
            fragments_certified_for_statement: 0,
            streaming: StreamingContext::new(),
            stored_keys: Vec::new(),
            apply_error: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.stid.transaction_id()
    }

    pub fn stid(&self) -> Stid {
        self.stid
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn ws_handle(&self) -> WsHandle {
        self.ws_handle
    }

    pub fn ws_meta(&self) -> WsMeta {
        self.ws_meta
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_certified(&self) -> bool {
        self.certified
    }

    pub fn is_xa(&self) -> bool {
        !self.xid.is_null()
    }

    pub fn ordered(&self) -> bool {
        self.ws_meta.ordered()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_streaming()
    }

    pub fn streaming(&self) -> &StreamingContext {
        &self.streaming
    }

    pub fn bf_aborted(&self) -> bool {
        self.bf_abort_state.is_some()
    }

    pub fn bf_aborted_in_total_order(&self) -> bool {
        self.bf_aborted_in_total_order
    }

    /// True once the transaction has been created and not yet cleared for
    /// reuse.
    pub fn active(&self) -> bool {
        !matches!(self.state, S::Committed | S::Aborted)
    }

    pub fn assign_xid(&mut self, xid: Xid) {
        self.xid = xid;
    }

    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    /// Moves the transaction to `next`, enforcing the transition matrix: any
    /// other transition is a programming error and panics, and the move is
    /// recorded in the bounded history.
    fn set_state(&mut self, next: TransactionState) {
        if !transition_allowed(self.state, next) {
            panic!(
                "illegal transaction state transition for {:?}: {:?} -> {:?}",
                self.stid, self.state, next
            );
        }
        trace!(target: "repwire::transaction", txn = ?self.stid, from = ?self.state, to = ?next, "state transition");
        if self.state_hist.len() == STATE_HISTORY_LIMIT {
            self.state_hist.pop_front();
        }
        self.state_hist.push_back(self.state);
        self.state = next;
    }

    /// `start_transaction(id)`. Rebinds this (possibly reused — its storage
    /// is reused for the next transaction on the same session) transaction
    /// entity to a fresh `stid` and resets all per-transaction accounting.
    /// In local mode, seeds the provider's write-set handle.
    pub fn start_transaction(&mut self, provider: Option<&dyn Provider>, stid: Stid) {
        debug_assert!(!self.active());
        self.stid = stid;
        self.xid = Xid::null();
        self.ws_handle = WsHandle::new(stid.transaction_id());
        self.ws_meta = WsMeta::from_stid(stid);
        self.state_hist.clear();
        self.bf_abort_state = None;
        self.bf_aborted_in_total_order = false;
        self.flags = Flags::START_TRANSACTION;
        self.pa_unsafe = false;
        self.implicit_deps = false;
        self.certified = false;
        self.fragments_certified_for_statement = 0;
        self.stored_keys.clear();
        self.apply_error.clear();
        self.state = S::Executing;
        if let Some(provider) = provider {
            provider.start_transaction(&mut self.ws_handle);
        }
    }

    /// `append_key(key)`: idempotently records the key for later
    /// re-certification and forwards it to the provider.
    pub fn append_key(&mut self, provider: &dyn Provider, key: Key) -> Result<(), ClientError> {
        let status = provider.append_key(&self.ws_handle, &key);
        if !status.is_success() {
            return Err(ClientError::new(ClientErrorKind::AppendFragmentError, Some(status)));
        }
        if !self.stored_keys.contains(&key) {
            self.stored_keys.push(key);
        }
        Ok(())
    }

    /// `append_data(buf)`.
    pub fn append_data(&mut self, provider: &dyn Provider, data: &[u8]) -> Result<(), ClientError> {
        let status = provider.append_data(&self.ws_handle, data);
        if !status.is_success() {
            return Err(ClientError::new(ClientErrorKind::AppendFragmentError, Some(status)));
        }
        Ok(())
    }

    /// Certify-for-commit. Precondition: active and not
    /// interrupted (checked by the caller via `ClientService::interrupted`).
    pub fn certify_for_commit(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
        client_id: crate::ClientId,
    ) -> Result<(), ClientError> {
        client_service.wait_for_replayers();

        if self.is_streaming() && !self.is_xa() {
            let whole_txn_keys = self.stored_keys.clone();
            for key in whole_txn_keys {
                let _ = provider.append_key(&self.ws_handle, &key);
            }
            self.pa_unsafe = true;
            self.flags.insert(Flags::PA_UNSAFE);
        }

        self.flags.insert(Flags::COMMIT);
        self.flags.remove(Flags::PREPARE);
        if self.implicit_deps {
            self.flags.insert(Flags::IMPLICIT_DEPS);
        }
        if let Err(status) = client_service.prepare_data_for_replication(self.id()) {
            self.set_state(S::MustAbort);
            return Err(ClientError::new(ClientErrorKind::SizeExceededError, Some(status)));
        }

        self.set_state(S::Certifying);
        let (status, meta) = provider.certify(client_id, &self.ws_handle, self.flags);
        match status {
            Status::Success => {
                self.certified = true;
                self.ws_meta = meta.unwrap_or(self.ws_meta);
                self.set_state(if self.is_xa() { S::Committing } else { S::Preparing });
                Ok(())
            }
            Status::BfAbort => {
                self.set_state(S::MustAbort);
                self.set_state(S::MustReplay);
                Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)))
            }
            Status::CertificationFailed => {
                self.set_state(S::CertFailed);
                Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)))
            }
            Status::ConnectionFailed => {
                // Treat a concurrent BF abort as a valid possible cause
                // without asserting it is the only one.
                if self.bf_aborted() {
                    self.set_state(S::MustAbort);
                    if self.is_xa() {
                        self.set_state(S::MustReplay);
                    }
                    Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)))
                } else if self.is_xa() {
                    self.set_state(S::Prepared);
                    Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
                } else {
                    self.set_state(S::MustAbort);
                    Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
                }
            }
            Status::Fatal => {
                client_service.emergency_shutdown("fatal provider status during certify");
                self.set_state(S::MustAbort);
                Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
            }
            Status::SizeExceeded
            | Status::ProviderFailed
            | Status::NotImplemented
            | Status::NotAllowed => {
                self.set_state(S::MustAbort);
                let kind = if status == Status::SizeExceeded {
                    ClientErrorKind::SizeExceededError
                } else {
                    ClientErrorKind::ErrorDuringCommit
                };
                Err(ClientError::new(kind, Some(status)))
            }
            Status::Warning | Status::TransactionMissing | Status::Unknown => {
                self.set_state(S::MustAbort);
                Err(ClientError::new(ClientErrorKind::UnknownError, Some(status)))
            }
        }
    }

    /// `before_prepare()`.
    pub fn before_prepare(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
        client_id: crate::ClientId,
    ) -> Result<(), ClientError> {
        debug!(target: "repwire::transaction", txn = ?self.stid, "before_prepare");
        if self.state == S::MustAbort {
            return Err(ClientError::new(ClientErrorKind::DeadlockError, None));
        }

        if !self.is_xa() && self.is_streaming() {
            client_service.debug_sync("before_prepare_remove_fragments");
            client_service
                .remove_fragments(self.id())
                .map_err(|s| ClientError::new(ClientErrorKind::AppendFragmentError, Some(s)))?;
            client_service.debug_sync("after_prepare_remove_fragments");
        }

        if self.is_xa() {
            self.flags.insert(Flags::PREPARE);
            self.flags.insert(Flags::PA_UNSAFE);
            let keys = self.stored_keys.clone();
            for key in keys {
                let _ = provider.append_key(&self.ws_handle, &key);
            }
            self.streaming_step(provider, client_service, client_id, true)?;
            self.set_state(S::Preparing);
            Ok(())
        } else {
            self.certify_for_commit(provider, client_service, client_id)?;
            Ok(())
        }
    }

    /// `after_prepare()`.
    pub fn after_prepare(&mut self) -> Result<(), ClientError> {
        match self.state {
            S::Preparing => {
                self.set_state(if self.is_xa() { S::Prepared } else { S::Committing });
                Ok(())
            }
            S::MustAbort => {
                if self.certified {
                    self.set_state(S::MustReplay);
                    Err(ClientError::new(ClientErrorKind::DeadlockError, None))
                } else {
                    Err(ClientError::new(ClientErrorKind::DeadlockError, None))
                }
            }
            _ => panic!("after_prepare called from state {:?}", self.state),
        }
    }

    /// `before_commit()`: orchestrates prepare -> certify -> enter commit
    /// order.
    pub fn before_commit(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
        client_id: crate::ClientId,
    ) -> Result<(), ClientError> {
        if matches!(self.state, S::Executing | S::Replaying) {
            self.before_prepare(provider, client_service, client_id)?;
            self.after_prepare()?;
        }
        if self.state == S::MustAbort {
            return Err(ClientError::new(ClientErrorKind::DeadlockError, None));
        }
        let status = provider.commit_order_enter(&self.ws_handle, &self.ws_meta);
        if status == Status::BfAbort {
            self.set_state(S::MustAbort);
            self.set_state(S::MustReplay);
            return Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)));
        }
        if self.state != S::Committing {
            self.set_state(S::Committing);
        }
        Ok(())
    }

    /// `ordered_commit()`.
    pub fn ordered_commit(&mut self, provider: &dyn Provider) -> Result<(), ClientError> {
        let err = std::mem::take(&mut self.apply_error);
        let status = provider.commit_order_leave(&self.ws_handle, &self.ws_meta, &err);
        if status.is_success() {
            self.set_state(S::OrderedCommit);
            Ok(())
        } else {
            // Known exception to "commit order always succeeds": permitted
            // only for high-priority streaming-storage writes.
            self.set_state(S::Aborting);
            Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
        }
    }

    /// `after_commit()`. When this is a streaming XA transaction, `storage`
    /// must be a scoped storage service through which the fragment log is
    /// cleared and the empty commit record is written. The write-set
    /// handle is only released in local mode; a high-priority (applier)
    /// session retains it for the caller to release.
    pub fn after_commit(
        &mut self,
        provider: &dyn Provider,
        storage: Option<&mut dyn StorageService>,
        local_mode: bool,
    ) {
        if self.is_streaming() {
            if self.is_xa() {
                if let Some(storage) = storage {
                    storage.adopt_transaction(self);
                    let _ = storage.remove_fragments();
                    let _ = storage.commit(&WsHandle::new(self.id()), &WsMeta::default());
                }
            }
            self.streaming.clear_fragments();
        }
        self.streaming.disable();
        if local_mode {
            let mut h = self.ws_handle;
            provider.release(&mut h);
            self.ws_handle = h;
        }
        self.set_state(S::Committed);
    }

    /// Streaming step. `bytes_generated` must be monotonically
    /// non-decreasing; `delta` is the unit-specific increment for this call.
    pub fn after_row(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
        client_id: crate::ClientId,
    ) -> Result<(), ClientError> {
        if !self.is_streaming() {
            return Ok(());
        }
        let unit = self.streaming.fragment_unit().unwrap();
        let delta = match unit {
            crate::FragmentUnit::Bytes => {
                let bytes = client_service.bytes_generated();
                if bytes < self.streaming.log_position() {
                    self.set_state(S::MustAbort);
                    return Err(ClientError::new(ClientErrorKind::UnknownError, None));
                }
                let delta = bytes - self.streaming.log_position();
                self.streaming.set_log_position(bytes);
                delta
            }
            crate::FragmentUnit::Rows | crate::FragmentUnit::Statements => 1,
        };
        if self.streaming.advance(delta, false) {
            self.certify_fragment(provider, client_service, client_id)?;
        }
        Ok(())
    }

    fn streaming_step(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
        client_id: crate::ClientId,
        force: bool,
    ) -> Result<(), ClientError> {
        if self.streaming.advance(0, force) {
            self.certify_fragment(provider, client_service, client_id)?;
        }
        Ok(())
    }

    /// Certify-fragment. Transitions `executing -> certifying`.
    fn certify_fragment(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
        client_id: crate::ClientId,
    ) -> Result<(), ClientError> {
        self.set_state(S::Certifying);
        let (fragment, log_position) = client_service
            .prepare_fragment_for_replication(self.id())
            .map_err(|s| ClientError::new(ClientErrorKind::AppendFragmentError, Some(s)))?;
        let _ = provider.append_data(&self.ws_handle, &fragment);

        let (status, meta) = provider.certify(client_id, &self.ws_handle, self.flags);
        let genuinely_certified = status.is_success();
        if genuinely_certified {
            if let Some(meta) = meta {
                self.streaming.record_certified_fragment(meta.seqno(), meta.seqno());
            }
            self.streaming.set_log_position(log_position);
            self.set_state(S::Executing);
            let mut h = self.ws_handle;
            provider.release(&mut h);
            self.ws_handle = h;
            Ok(())
        } else {
            // `transaction.cpp` may mark a fragment certified even on
            // certification_failed, reasoning the provider can overload
            // that status; preserved here rather than normalized.
            if status == Status::CertificationFailed && self.certified {
                if let Some(meta) = meta {
                    self.streaming.record_certified_fragment(meta.seqno(), meta.seqno());
                }
            }
            self.set_state(S::MustAbort);
            self.streaming_rollback(provider, client_service);
            Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)))
        }
    }

    /// Streaming rollback. Idempotent via `StreamingContext::rolled_back`.
    fn streaming_rollback(&mut self, provider: &dyn Provider, client_service: &dyn ClientService) {
        if self.streaming.is_rolled_back(self.id()) {
            return;
        }
        if self.bf_aborted_in_total_order {
            client_service.bf_rollback(self.id());
            self.streaming.mark_rolled_back(self.id());
            return;
        }
        client_service.bf_rollback(self.id());
        self.streaming.clear_fragments();
        self.streaming.mark_rolled_back(self.id());
        provider.rollback(self.id());
    }

    /// `before_rollback()`.
    pub fn before_rollback(&mut self, provider: &dyn Provider, client_service: &dyn ClientService) {
        if self.is_streaming() && !self.streaming.is_rolled_back(self.id()) {
            self.streaming_rollback(provider, client_service);
        }
        match self.state {
            S::Preparing => self.set_state(S::MustAbort),
            S::Prepared | S::Executing => {
                if self.certified {
                    self.set_state(S::MustReplay);
                } else {
                    self.set_state(S::Aborting);
                }
            }
            S::MustAbort => {
                if self.certified {
                    self.set_state(S::MustReplay);
                } else {
                    self.set_state(S::Aborting);
                }
            }
            S::CertFailed | S::Aborting | S::MustReplay => {}
            _ => panic!("before_rollback called from state {:?}", self.state),
        }
    }

    /// `after_rollback()`. Does not release the write-set handle; that is
    /// postponed to `after_statement`. When a streaming transaction was
    /// BF-aborted in total order, `storage` (a scoped storage service) is
    /// used to clear the fragment log and write an empty commit record.
    pub fn after_rollback(&mut self, storage: Option<&mut dyn StorageService>) {
        if self.is_streaming() && self.bf_aborted_in_total_order {
            if let Some(storage) = storage {
                storage.adopt_transaction(self);
                let _ = storage.remove_fragments();
                let _ = storage.commit(&WsHandle::new(self.id()), &WsMeta::default());
            }
        }
        if self.is_streaming() && self.state != S::MustReplay {
            self.streaming.clear_fragments();
        }
        if self.state == S::Aborting {
            self.set_state(S::Aborted);
        }
        self.streaming.disable();
    }

    /// `after_statement()`: cleanup point; drives replay.
    /// Returns `Ok(true)` if the engine should now call into replay.
    pub fn after_statement(&mut self, provider: &dyn Provider) -> Result<bool, ClientError> {
        match self.state {
            S::Executing | S::Prepared | S::Committed => Ok(false),
            S::MustAbort | S::CertFailed | S::Aborting => {
                if self.state != S::Aborting {
                    self.set_state(S::Aborting);
                }
                if self.ordered() {
                    let _ = provider.commit_order_enter(&self.ws_handle, &self.ws_meta);
                    let _ = provider.commit_order_leave(&self.ws_handle, &self.ws_meta, &[]);
                }
                let mut h = self.ws_handle;
                provider.release(&mut h);
                self.ws_handle = h;
                self.set_state(S::Aborted);
                Ok(false)
            }
            S::MustReplay => Ok(true),
            S::Aborted => {
                if self.bf_aborted() {
                    Err(ClientError::new(ClientErrorKind::DeadlockError, None))
                } else {
                    Ok(false)
                }
            }
            _ => panic!("after_statement called from state {:?}", self.state),
        }
    }

    /// `bf_abort(by_seqno)`. Called while the caller holds the owning
    /// session's mutex (or has otherwise proved exclusive access); only
    /// `Executing, Preparing, Prepared, Certifying, Committing` admit BF
    /// abort. Returns `true` if the abort was accepted.
    ///
    /// If the victim is `Executing` and streaming in local mode, the
    /// rollback fragment is replicated immediately so it orders ahead of
    /// the victim releasing its locks; otherwise streaming
    /// rollback is deferred to `before_rollback`. The caller is
    /// responsible for the rest of the hand-off decision (whether to move
    /// straight to `Aborting`/`MustReplay` and schedule a background
    /// rollbacker) via [`Transaction::route_after_bf_abort`], since that
    /// decision depends on session-level state this type doesn't hold.
    pub fn bf_abort(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
        bf_seqno: Seqno,
        local_mode: bool,
    ) -> bool {
        let state_at_enter = self.state;
        let admits = self.active()
            && matches!(
                state_at_enter,
                S::Executing | S::Preparing | S::Prepared | S::Certifying | S::Committing
            );
        if !admits {
            debug!(target: "repwire::transaction", txn = ?self.stid, state = ?self.state, "bf_abort ignored: not in an abortable state");
            return false;
        }
        let mut victim_seqno = Seqno::undefined();
        let status = provider.bf_abort(bf_seqno, self.id(), &mut victim_seqno);
        if !status.is_success() {
            return false;
        }
        self.bf_abort_state = Some(state_at_enter);
        self.set_state(S::MustAbort);
        if local_mode && self.is_streaming() && state_at_enter == S::Executing {
            self.streaming_rollback(provider, client_service);
        }
        true
    }

    /// The state the transaction was in when `bf_abort` most recently
    /// admitted it, used by the owning session to decide whether the
    /// hand-off prefers `MustReplay`.
    pub fn bf_abort_origin_state(&self) -> Option<TransactionState> {
        self.bf_abort_state
    }

    /// Moves a BF-aborted transaction from `MustAbort` straight to
    /// `Aborting` or `MustReplay`, for the owning session to call once it
    /// has decided to hand off to a background rollbacker: idle with
    /// synchronous rollback mode, or high-priority streaming.
    /// `prefer_replay` should be set when this is an XA transaction that
    /// was already `Prepared` when the abort was admitted. A no-op unless
    /// the transaction is currently `MustAbort`.
    pub fn route_after_bf_abort(&mut self, prefer_replay: bool) {
        if self.state != S::MustAbort {
            return;
        }
        if prefer_replay {
            self.set_state(S::MustReplay);
        } else {
            self.set_state(S::Aborting);
        }
    }

    pub fn set_bf_aborted_in_total_order(&mut self) {
        self.bf_aborted_in_total_order = true;
    }

    /// Snapshot used to seed a replaying high-priority transaction from its
    /// original victim, grounded on `transaction.cpp::clone_for_replay`.
    pub fn clone_for_replay(&self) -> Transaction {
        let mut clone = Transaction::new(self.stid);
        clone.xid = self.xid.clone();
        clone.ws_handle = self.ws_handle;
        clone.ws_meta = self.ws_meta;
        clone.flags = self.flags;
        clone.certified = self.certified;
        clone.stored_keys = self.stored_keys.clone();
        clone.set_state(S::Replaying);
        clone
    }

    /// Restores a prepared XA transaction from its XID alone, e.g. after a
    /// server restart, grounded on `transaction.cpp::restore_to_prepared_state`.
    pub fn restore_to_prepared(&mut self, xid: Xid) -> Result<(), ClientError> {
        if self.state != S::Executing {
            return Err(ClientError::new(ClientErrorKind::UnknownError, None));
        }
        self.xid = xid;
        self.set_state(S::Preparing);
        self.set_state(S::Prepared);
        Ok(())
    }

    /// Resolves a recovered prepared XA transaction strictly from its XID,
    /// grounded on `transaction.cpp::commit_or_rollback_by_xid`.
    pub fn commit_or_rollback_by_xid(
        &mut self,
        client_service: &dyn ClientService,
        xid: &Xid,
        commit: bool,
    ) -> Result<(), ClientError> {
        if self.xid.format_id() != xid.format_id() || self.xid.data() != xid.data() {
            return Err(ClientError::new(ClientErrorKind::NotSupportedError, None));
        }
        if commit {
            let status = client_service.commit_by_xid(xid);
            if status.is_success() {
                self.set_state(S::Committing);
                self.set_state(S::Committed);
                Ok(())
            } else {
                Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
            }
        } else {
            self.set_state(S::Aborting);
            self.set_state(S::Aborted);
            Ok(())
        }
    }

    /// Detaches this transaction from XA bookkeeping once resolved
    /// (grounded on `transaction.cpp::xa_detach`).
    pub fn xa_detach(&mut self) {
        self.xid.clear();
    }

    /// Replay: drives `client_service.replay()`, which calls
    /// `provider.replay()` under the hood.
    pub fn replay(
        &mut self,
        provider: &dyn Provider,
        client_service: &dyn ClientService,
    ) -> Result<(), ClientError> {
        self.set_state(S::Replaying);
        let status = client_service.replay(&self.ws_handle);
        match status {
            Status::Success => {
                self.streaming.disable();
                let mut h = self.ws_handle;
                provider.release(&mut h);
                self.ws_handle = h;
                self.set_state(S::Committed);
                Ok(())
            }
            Status::CertificationFailed => {
                let _ = client_service.remove_fragments(self.id());
                self.set_state(S::Aborted);
                Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)))
            }
            other => {
                client_service.emergency_shutdown("unexpected replay status");
                Err(ClientError::new(ClientErrorKind::UnknownError, Some(other)))
            }
        }
    }

    /// XA replay: used when a *prepared* streaming XA transaction is
    /// BF-aborted.
    pub fn xa_replay(
        &mut self,
        client_service: &dyn ClientService,
        client_idle: bool,
    ) -> Result<(), ClientError> {
        self.set_state(S::Replaying);
        let status = client_service.replay_unordered(&self.ws_handle);
        if !status.is_success() {
            client_service.emergency_shutdown("xa replay_unordered failed");
        }
        let result = if client_idle {
            self.set_state(S::Aborted);
            Ok(())
        } else {
            let commit_status = client_service.commit_by_xid(&self.xid);
            if commit_status.is_success() {
                self.set_state(S::Committing);
                self.set_state(S::Committed);
                Ok(())
            } else {
                self.set_state(S::Preparing);
                self.set_state(S::Prepared);
                Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(commit_status)))
            }
        };
        client_service.signal_replayed();
        result
    }

    pub fn enable_streaming(&mut self, unit: crate::FragmentUnit, fragment_size: u64) {
        self.streaming.enable(unit, fragment_size);
    }

    pub fn disable_streaming(&mut self) {
        self.streaming.disable();
    }

    pub fn set_server_id(&mut self, _server_id: ServerId) {
        // Retained for symmetry with `transaction.cpp`'s per-call server-id
        // plumbing; this port derives server id solely from `stid`.
    }

    pub fn gtid(&self) -> Gtid {
        self.ws_meta.gtid()
    }
}

#[cfg(test)]
#[path = "test/transaction.rs"]
mod test;
