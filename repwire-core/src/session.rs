use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{
    ClientError, ClientErrorKind, ClientId, ClientService, Flags, Gtid, Key, Provider, RollbackMode,
    Seqno, ServerId, ServerService, Status, Stid, StorageService, TransactionId, Transaction,
    TransactionState, WsMeta,
};

const STATE_HISTORY_LIMIT: usize = 10;
const TOI_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Client session lifecycle states, grounded on `wsrep::client_state::state`
/// in `client_state.cpp`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientSessionState {
    None,
    Idle,
    Exec,
    Result,
    Quitting,
}

use ClientSessionState as CS;

#[rustfmt::skip]
const STATE_ALLOWED: [[bool; 5]; 5] = [
    /*          none   idle   exec   result quit  */
    /* none */ [false, true,  false, false, false],
    /* idle */ [false, false, true,  false, true ],
    /* exec */ [false, false, false, true,  false],
    /* rslt */ [false, true,  false, false, false],
    /* quit */ [true,  false, false, false, false],
];

fn cs_index(s: CS) -> usize {
    match s {
        CS::None => 0,
        CS::Idle => 1,
        CS::Exec => 2,
        CS::Result => 3,
        CS::Quitting => 4,
    }
}

/// Session execution mode, grounded on `wsrep::client_state::mode` in
/// `client_state.cpp`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientSessionMode {
    Undefined,
    Local,
    HighPriority,
    Toi,
    Rsu,
    Nbo,
}

use ClientSessionMode as M;

#[rustfmt::skip]
const MODE_ALLOWED: [[bool; 6]; 6] = [
    /*             u      l      h      t      r      n    */
    /* undef */  [false, false, false, false, false, false],
    /* local */  [false, false, true,  true,  true,  true ],
    /* hprio */  [false, true,  false, true,  false, true ],
    /* toi   */  [false, true,  true,  false, false, false],
    /* rsu   */  [false, true,  false, false, false, false],
    /* nbo   */  [false, true,  true,  false, false, false],
];

fn mode_index(m: M) -> usize {
    match m {
        M::Undefined => 0,
        M::Local => 1,
        M::HighPriority => 2,
        M::Toi => 3,
        M::Rsu => 4,
        M::Nbo => 5,
    }
}

pub fn state_transition_allowed(from: ClientSessionState, to: ClientSessionState) -> bool {
    STATE_ALLOWED[cs_index(from)][cs_index(to)]
}

pub fn mode_transition_allowed(from: ClientSessionMode, to: ClientSessionMode) -> bool {
    MODE_ALLOWED[mode_index(from)][mode_index(to)]
}

struct Inner {
    id: ClientId,
    state: ClientSessionState,
    state_hist: VecDeque<ClientSessionState>,
    mode: ClientSessionMode,
    toi_mode: ClientSessionMode,
    toi_meta: WsMeta,
    nbo_meta: WsMeta,
    owning_thread: Option<ThreadId>,
    rollbacker_active: bool,
    sync_wait_gtid: Gtid,
    last_written_gtid: Gtid,
    current_error: ClientError,
    keep_command_error: bool,
    transaction: Transaction,
    next_transaction_seq: u64,
    /// Command-execution state captured at the moment a BF abort was most
    /// recently admitted against this session's transaction; `xa_replay`
    /// dispatch needs this rather than the (possibly already-advanced)
    /// current state.
    bf_abort_client_state: Option<ClientSessionState>,
}

/// Per-connection state machine driving one [`Transaction`] through a
/// [`Provider`], grounded on `wsrep::client_state` in `client_state.cpp`.
///
/// Mirrors `wsrep::client_state`: a mutex-guarded state/mode pair plus a
/// condition variable used to hand off control between the owning client
/// thread and a background rollbacker thread.
pub struct ClientSession {
    inner: Mutex<Inner>,
    cond: Condvar,
    server_id: ServerId,
    provider: Arc<dyn Provider>,
    server: Arc<dyn ServerService>,
    client_service: Arc<dyn ClientService>,
}

impl ClientSession {
    pub fn new(
        id: ClientId,
        server_id: ServerId,
        provider: Arc<dyn Provider>,
        server: Arc<dyn ServerService>,
        client_service: Arc<dyn ClientService>,
    ) -> Self {
        let stid = Stid::new(server_id, TransactionId::undefined(), id);
        ClientSession {
            inner: Mutex::new(Inner {
                id,
                state: CS::None,
                state_hist: VecDeque::with_capacity(STATE_HISTORY_LIMIT),
                mode: M::Local,
                toi_mode: M::Undefined,
                toi_meta: WsMeta::default(),
                nbo_meta: WsMeta::default(),
                owning_thread: None,
                rollbacker_active: false,
                sync_wait_gtid: Gtid::undefined(),
                last_written_gtid: Gtid::undefined(),
                current_error: ClientError::success(),
                keep_command_error: false,
                transaction: Transaction::new(stid),
                next_transaction_seq: 1,
                bf_abort_client_state: None,
            }),
            cond: Condvar::new(),
            server_id,
            provider,
            server,
            client_service,
        }
    }

    pub fn id(&self) -> ClientId {
        self.inner.lock().unwrap().id
    }

    pub fn state(&self) -> ClientSessionState {
        self.inner.lock().unwrap().state
    }

    pub fn mode(&self) -> ClientSessionMode {
        self.inner.lock().unwrap().mode
    }

    pub fn current_error(&self) -> ClientError {
        self.inner.lock().unwrap().current_error
    }

    pub fn last_written_gtid(&self) -> Gtid {
        self.inner.lock().unwrap().last_written_gtid
    }

    fn set_state(inner: &mut Inner, next: ClientSessionState) {
        if !state_transition_allowed(inner.state, next) {
            panic!(
                "illegal client session state transition: {:?} -> {:?}",
                inner.state, next
            );
        }
        if inner.state_hist.len() == STATE_HISTORY_LIMIT {
            inner.state_hist.pop_front();
        }
        inner.state_hist.push_back(inner.state);
        inner.state = next;
    }

    fn set_mode(inner: &mut Inner, next: ClientSessionMode) {
        if !mode_transition_allowed(inner.mode, next) {
            panic!("illegal client session mode transition: {:?} -> {:?}", inner.mode, next);
        }
        inner.mode = next;
    }

    fn override_error(inner: &mut Inner, error: ClientErrorKind, status: Option<Status>) {
        inner.current_error = ClientError::new(error, status);
    }

    /// `open(id)`: associates the session with a freshly
    /// accepted DBMS connection.
    pub fn open(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.state, CS::None);
        inner.owning_thread = Some(std::thread::current().id());
        inner.rollbacker_active = false;
        inner.sync_wait_gtid = Gtid::undefined();
        inner.last_written_gtid = Gtid::undefined();
        Self::set_state(&mut inner, CS::Idle);
    }

    /// `close()`: rolls back any still-active transaction that
    /// is not a prepared XA transaction, then disables streaming.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::set_state(&mut inner, CS::Quitting);
        inner.keep_command_error = false;
        let mode = inner.mode;
        let not_prepared_local =
            mode != M::Local || inner.transaction.state() != TransactionState::Prepared;
        let active = inner.transaction.active();
        drop(inner);
        if active && not_prepared_local {
            self.client_service.bf_rollback(self.transaction_id());
            let _ = self.with_transaction_mut(|t| t.after_statement(self.provider.as_ref()));
        }
        if mode == M::Local {
            self.disable_streaming();
        }
    }

    /// `cleanup()`: returns the session to `none` for reuse.
    pub fn cleanup(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::set_state(&mut inner, CS::None);
    }

    fn transaction_id(&self) -> TransactionId {
        self.inner.lock().unwrap().transaction.id()
    }

    fn with_transaction_mut<R>(&self, f: impl FnOnce(&mut Transaction) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner.transaction)
    }

    /// `before_command()`: the owning thread acquires control,
    /// waiting for any in-flight background rollback to finish first, then
    /// checks whether a BF abort left the transaction in `must_abort` or
    /// `aborted` while this session was idle.
    pub fn before_command(&self, keep_command_error: bool) -> Result<(), ClientError> {
        let inner = self.inner.lock().unwrap();
        let mut inner = if inner.state != CS::Exec {
            assert_eq!(inner.state, CS::Idle);
            let inner = self.do_wait_rollback_complete_and_acquire_ownership(inner);
            assert_eq!(inner.state, CS::Exec);
            drop(inner);
            self.client_service.store_globals();
            self.inner.lock().unwrap()
        } else {
            debug_assert_eq!(inner.owning_thread, Some(std::thread::current().id()));
            inner
        };
        inner.keep_command_error = keep_command_error;

        if !inner.transaction.active() {
            return Ok(());
        }
        let txn_state = inner.transaction.state();
        if !matches!(txn_state, TransactionState::MustAbort | TransactionState::Aborted) {
            return Ok(());
        }
        if inner.transaction.is_xa() {
            return Err(ClientError::new(ClientErrorKind::DeadlockError, None));
        }
        Self::override_error(&mut inner, ClientErrorKind::DeadlockError, None);
        if txn_state == TransactionState::MustAbort {
            drop(inner);
            self.client_service.bf_rollback(self.transaction_id());
            inner = self.inner.lock().unwrap();
        }
        if inner.keep_command_error {
            return Ok(());
        }
        drop(inner);
        let _ = self.with_transaction_mut(|t| t.after_statement(self.provider.as_ref()));
        let inner = self.inner.lock().unwrap();
        debug_assert!(!inner.transaction.active());
        debug_assert_eq!(inner.transaction.state(), TransactionState::Aborted);
        debug_assert!(!inner.current_error.is_success());
        Err(ClientError::new(ClientErrorKind::DeadlockError, None))
    }

    /// `before_statement()`: a cheap gate a DBMS calls just
    /// before executing the next statement of an already-running command.
    /// Rollback and cleanup of a BF-aborted victim are deferred to
    /// `after_command_before_result`.
    pub fn before_statement(&self) -> Result<(), ClientError> {
        let inner = self.inner.lock().unwrap();
        if inner.transaction.active() && inner.transaction.state() == TransactionState::MustAbort {
            Err(ClientError::new(ClientErrorKind::DeadlockError, None))
        } else {
            Ok(())
        }
    }

    /// `after_command_before_result()`: error-sticky
    /// bookkeeping point between executing a command and returning its
    /// result to the DBMS.
    pub fn after_command_before_result(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.state, CS::Exec);
        if inner.transaction.active() && inner.transaction.state() == TransactionState::MustAbort {
            Self::override_error(&mut inner, ClientErrorKind::DeadlockError, None);
            drop(inner);
            self.client_service.bf_rollback(self.transaction_id());
            if !self.inner.lock().unwrap().keep_command_error {
                let _ = self.with_transaction_mut(|t| t.after_statement(self.provider.as_ref()));
            }
            inner = self.inner.lock().unwrap();
            debug_assert_eq!(inner.transaction.state(), TransactionState::Aborted);
            debug_assert!(!inner.current_error.is_success());
        } else if !inner.keep_command_error && inner.current_error.is_success() {
            Self::override_error(&mut inner, ClientErrorKind::Success, None);
        }
        Self::set_state(&mut inner, CS::Result);
    }

    /// `after_command_after_result()`: releases ownership back
    /// to `idle`, unless the session is quitting.
    pub fn after_command_after_result(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.state, CS::Result);
        debug_assert_ne!(inner.transaction.state(), TransactionState::Aborting);
        if inner.transaction.active() && inner.transaction.state() == TransactionState::MustAbort {
            drop(inner);
            self.client_service.bf_rollback(self.transaction_id());
            inner = self.inner.lock().unwrap();
            debug_assert_eq!(inner.transaction.state(), TransactionState::Aborted);
            Self::override_error(&mut inner, ClientErrorKind::DeadlockError, None);
        } else if !inner.transaction.active() && !inner.keep_command_error {
            inner.current_error = ClientError::success();
        }
        inner.keep_command_error = false;
        inner.sync_wait_gtid = Gtid::undefined();
        Self::set_state(&mut inner, CS::Idle);
        self.cond.notify_all();
    }

    fn do_acquire_ownership(inner: &mut std::sync::MutexGuard<Inner>) {
        assert!(inner.state == CS::Idle || inner.mode != M::Local);
        inner.owning_thread = Some(std::thread::current().id());
    }

    fn do_wait_rollback_complete_and_acquire_ownership<'a>(
        &'a self,
        mut inner: std::sync::MutexGuard<'a, Inner>,
    ) -> std::sync::MutexGuard<'a, Inner> {
        assert_eq!(inner.state, CS::Idle);
        while inner.rollbacker_active {
            inner = self.cond.wait(inner).unwrap();
        }
        Self::do_acquire_ownership(&mut inner);
        Self::set_state(&mut inner, CS::Exec);
        inner
    }

    /// `wait_rollback_complete_and_acquire_ownership()`:
    /// used by a processing thread (e.g. a network poller) to seize control
    /// of an idle session ahead of `before_command`.
    pub fn wait_rollback_complete_and_acquire_ownership(&self) {
        let inner = self.inner.lock().unwrap();
        if inner.state == CS::Idle {
            let inner = self.do_wait_rollback_complete_and_acquire_ownership(inner);
            assert_eq!(inner.state, CS::Exec);
        }
    }

    /// `sync_rollback_complete()`: called by the background
    /// rollbacker once it has finished aborting the session's victim
    /// transaction, releasing any thread parked in
    /// `wait_rollback_complete_and_acquire_ownership`.
    pub fn sync_rollback_complete(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.state, CS::Idle);
        assert_eq!(inner.mode, M::Local);
        assert_eq!(inner.transaction.state(), TransactionState::Aborted);
        inner.rollbacker_active = false;
        self.cond.notify_all();
    }

    pub fn set_rollbacker_active(&self, active: bool) {
        self.inner.lock().unwrap().rollbacker_active = active;
    }

    pub fn enable_streaming(&self, unit: crate::FragmentUnit, fragment_size: u64) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.mode, M::Local);
        inner.transaction.enable_streaming(unit, fragment_size);
    }

    pub fn disable_streaming(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.mode, M::Local);
        inner.transaction.disable_streaming();
    }

    fn update_last_written_gtid(inner: &mut Inner, gtid: Gtid) {
        assert!(inner.last_written_gtid.is_undefined() || inner.last_written_gtid.id() == gtid.id());
        inner.last_written_gtid = gtid;
    }

    fn poll_enter_toi(
        &self,
        client_service: &mut dyn ClientService,
        keys: &[Key],
        data: &[u8],
        flags: Flags,
        deadline: Option<Instant>,
    ) -> (Status, WsMeta) {
        let mut meta = WsMeta::default();
        loop {
            let (status, new_meta) = self.provider.enter_toi(self.id(), keys, data, flags);
            meta = new_meta.unwrap_or_default();
            if !status.is_success() && !meta.gtid().is_undefined() {
                if !self.provider.leave_toi(self.id(), &WsMeta::default()).is_success() {
                    warn!(target: "repwire::session", "failed to leave TOI after failed enter_toi");
                }
                meta = WsMeta::default();
            }
            let retryable = matches!(status, Status::CertificationFailed | Status::ConnectionFailed);
            let timed_out = deadline.map(|d| Instant::now() >= d).unwrap_or(true);
            if !retryable || timed_out || client_service.interrupted() {
                return (status, meta);
            }
            std::thread::sleep(TOI_POLL_INTERVAL);
        }
    }

    /// `enter_toi_local()`: blocks the calling (local-mode)
    /// session until the provider admits it to total-order isolation, or
    /// `deadline` passes.
    pub fn enter_toi_local(
        &self,
        client_service: &mut dyn ClientService,
        keys: &[Key],
        data: &[u8],
        deadline: Option<Instant>,
    ) -> Result<(), ClientError> {
        let flags = Flags::START_TRANSACTION | Flags::COMMIT;
        let (status, meta) = self.poll_enter_toi(client_service, keys, data, flags, deadline);
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.state, CS::Exec);
        assert_eq!(inner.mode, M::Local);
        match status {
            Status::Success => {
                inner.toi_mode = inner.mode;
                Self::set_mode(&mut inner, M::Toi);
                inner.toi_meta = meta;
                Ok(())
            }
            Status::CertificationFailed => {
                Self::override_error(&mut inner, ClientErrorKind::DeadlockError, Some(status));
                Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)))
            }
            other => {
                let kind = ClientErrorKind::ErrorDuringCommit;
                Self::override_error(&mut inner, kind, Some(other));
                Err(ClientError::new(kind, Some(other)))
            }
        }
    }

    /// `leave_toi_local()`.
    pub fn leave_toi_local(&self, err: &[u8]) -> Result<(), ClientError> {
        let (toi_meta, id) = {
            let mut inner = self.inner.lock().unwrap();
            assert_eq!(inner.toi_mode, M::Local);
            let prior = inner.toi_mode;
            Self::set_mode(&mut inner, prior);
            inner.toi_mode = M::Undefined;
            let toi_meta = inner.toi_meta;
            if !toi_meta.gtid().is_undefined() {
                Self::update_last_written_gtid(&mut inner, toi_meta.gtid());
            }
            inner.toi_meta = WsMeta::default();
            (toi_meta, inner.id)
        };
        let status = self.provider.leave_toi(id, &toi_meta);
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
        }
    }

    /// `begin_rsu(timeout)`: pauses the provider and
    /// isolates this session as the sole writer.
    pub fn begin_rsu(&self) -> Result<(), ClientError> {
        if !self.provider.desync().is_success() {
            return Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, None));
        }
        match self.provider.pause() {
            Ok(_seqno) => {
                let mut inner = self.inner.lock().unwrap();
                inner.toi_mode = inner.mode;
                Self::set_mode(&mut inner, M::Rsu);
                Ok(())
            }
            Err(status) => {
                let _ = self.provider.resync();
                Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
            }
        }
    }

    /// `end_rsu()`.
    pub fn end_rsu(&self) -> Result<(), ClientError> {
        let resume_ok = self.provider.resume().is_success();
        let resync_ok = self.provider.resync().is_success();
        let mut inner = self.inner.lock().unwrap();
        let prior = inner.toi_mode;
        Self::set_mode(&mut inner, prior);
        if resume_ok && resync_ok {
            Ok(())
        } else {
            Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, None))
        }
    }

    /// `begin_nbo_phase_one()` (two-phase non-blocking
    /// operation).
    pub fn begin_nbo_phase_one(
        &self,
        client_service: &mut dyn ClientService,
        keys: &[Key],
        data: &[u8],
        deadline: Option<Instant>,
    ) -> Result<(), ClientError> {
        {
            let inner = self.inner.lock().unwrap();
            assert_eq!(inner.state, CS::Exec);
            assert_eq!(inner.mode, M::Local);
            assert_eq!(inner.toi_mode, M::Undefined);
        }
        let (status, meta) =
            self.poll_enter_toi(client_service, keys, data, Flags::START_TRANSACTION, deadline);
        let mut inner = self.inner.lock().unwrap();
        match status {
            Status::Success => {
                inner.toi_mode = inner.mode;
                Self::set_mode(&mut inner, M::Nbo);
                inner.toi_meta = meta;
                Ok(())
            }
            Status::CertificationFailed => {
                Self::override_error(&mut inner, ClientErrorKind::DeadlockError, Some(status));
                Err(ClientError::new(ClientErrorKind::DeadlockError, Some(status)))
            }
            other => {
                Self::override_error(&mut inner, ClientErrorKind::ErrorDuringCommit, Some(other));
                Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(other)))
            }
        }
    }

    /// `end_nbo_phase_one()`.
    pub fn end_nbo_phase_one(&self, err: &[u8]) -> Result<(), ClientError> {
        let (id, toi_meta) = {
            let inner = self.inner.lock().unwrap();
            assert_eq!(inner.state, CS::Exec);
            assert_eq!(inner.mode, M::Nbo);
            (inner.id, inner.toi_meta)
        };
        let status = self.provider.leave_toi(id, &toi_meta);
        let mut inner = self.inner.lock().unwrap();
        inner.nbo_meta = inner.toi_meta;
        inner.toi_meta = WsMeta::default();
        inner.toi_mode = M::Undefined;
        let _ = err;
        if status.is_success() {
            Ok(())
        } else {
            Self::override_error(&mut inner, ClientErrorKind::ErrorDuringCommit, Some(status));
            Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
        }
    }

    /// `begin_nbo_phase_two()`: the thread that completes a
    /// long-running non-blocking operation re-enters TOI to commit it in
    /// order.
    pub fn begin_nbo_phase_two(
        &self,
        client_service: &mut dyn ClientService,
        keys: &[Key],
        deadline: Option<Instant>,
    ) -> Result<(), ClientError> {
        {
            let inner = self.inner.lock().unwrap();
            assert_eq!(inner.state, CS::Exec);
            assert_eq!(inner.mode, M::Nbo);
            assert_eq!(inner.toi_mode, M::Undefined);
        }
        let (status, meta) = self.poll_enter_toi(client_service, keys, &[], Flags::COMMIT, deadline);
        let mut inner = self.inner.lock().unwrap();
        match status {
            Status::Success => {
                inner.nbo_meta = meta;
                inner.toi_meta = meta;
                inner.toi_mode = M::Local;
                Ok(())
            }
            Status::ProviderFailed => {
                Self::override_error(&mut inner, ClientErrorKind::InterruptedError, Some(status));
                Self::set_mode(&mut inner, M::Local);
                inner.nbo_meta = WsMeta::default();
                Err(ClientError::new(ClientErrorKind::InterruptedError, Some(status)))
            }
            other => {
                Self::override_error(&mut inner, ClientErrorKind::ErrorDuringCommit, Some(other));
                Self::set_mode(&mut inner, M::Local);
                inner.nbo_meta = WsMeta::default();
                Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(other)))
            }
        }
    }

    /// `end_nbo_phase_two()`.
    pub fn end_nbo_phase_two(&self, err: &[u8]) -> Result<(), ClientError> {
        let (id, toi_meta) = {
            let inner = self.inner.lock().unwrap();
            assert_eq!(inner.state, CS::Exec);
            assert_eq!(inner.mode, M::Nbo);
            assert_eq!(inner.toi_mode, M::Local);
            (inner.id, inner.toi_meta)
        };
        let _ = err;
        let status = self.provider.leave_toi(id, &toi_meta);
        let mut inner = self.inner.lock().unwrap();
        inner.toi_meta = WsMeta::default();
        inner.toi_mode = M::Undefined;
        inner.nbo_meta = WsMeta::default();
        Self::set_mode(&mut inner, M::Local);
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::new(ClientErrorKind::ErrorDuringCommit, Some(status)))
        }
    }

    /// `sync_wait(timeout)`: a causal read used to
    /// ensure subsequent reads observe everything this session has
    /// previously written, possibly on a different node.
    pub fn sync_wait(&self, timeout: Duration) -> Result<(), ClientError> {
        let (status, gtid) = self.provider.causal_read(timeout);
        let mut inner = self.inner.lock().unwrap();
        match status {
            Status::Success => {
                inner.sync_wait_gtid = gtid;
                Ok(())
            }
            Status::NotImplemented => {
                Self::override_error(&mut inner, ClientErrorKind::NotSupportedError, Some(status));
                Err(ClientError::new(ClientErrorKind::NotSupportedError, Some(status)))
            }
            other => {
                Self::override_error(&mut inner, ClientErrorKind::TimeoutError, Some(other));
                Err(ClientError::new(ClientErrorKind::TimeoutError, Some(other)))
            }
        }
    }

    /// BF-abort entry point for this session's active transaction. Called
    /// by the provider or a background preemption thread, never by the
    /// session's own owning thread.
    ///
    /// If the victim is locally idle with synchronous rollback mode, or is a
    /// high-priority streaming applier, this hands the rest of the rollback
    /// off to a background rollbacker rather
    /// than leaving it for the owning thread to notice in
    /// `before_command`/`before_statement`.
    pub fn bf_abort(&self, bf_seqno: crate::Seqno) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let client_id = inner.id;
        let local_mode = inner.mode == M::Local;
        let streaming_before = inner.transaction.is_streaming();
        let accepted =
            inner
                .transaction
                .bf_abort(self.provider.as_ref(), self.client_service.as_ref(), bf_seqno, local_mode);
        if !accepted {
            return false;
        }
        inner.bf_abort_client_state = Some(inner.state);
        let origin_state = inner.transaction.bf_abort_origin_state();
        let prefer_replay = inner.transaction.is_xa() && origin_state == Some(TransactionState::Prepared);
        let idle_sync = inner.state == CS::Idle && self.server.rollback_mode() == RollbackMode::Sync;
        let high_priority_streaming = inner.mode == M::HighPriority && streaming_before;
        if idle_sync || high_priority_streaming {
            inner.transaction.route_after_bf_abort(prefer_replay);
            inner.rollbacker_active = true;
            let txn_id = inner.transaction.id();
            drop(inner);
            if high_priority_streaming {
                self.server.stop_streaming_client(client_id);
            }
            self.server.initiate_background_rollback(client_id, txn_id);
        } else {
            debug!(target: "repwire::session", client = ?client_id, "BF abort admitted; victim will roll back on its own thread");
        }
        true
    }

    /// Read-only access to the session's active transaction.
    pub fn with_transaction<R>(&self, f: impl FnOnce(&Transaction) -> R) -> R {
        let inner = self.inner.lock().unwrap();
        f(&inner.transaction)
    }

    /// `start_transaction()`, via `wsrep::client_state`: mints a
    /// fresh transaction id for this session and rebinds its (possibly
    /// reused) transaction entity to it.
    pub fn start_transaction(&self) -> TransactionId {
        let mut inner = self.inner.lock().unwrap();
        let seq = inner.next_transaction_seq;
        inner.next_transaction_seq += 1;
        let stid = Stid::new(self.server_id, TransactionId::new(seq), inner.id);
        let provider = if inner.mode == M::Local { Some(self.provider.as_ref()) } else { None };
        inner.transaction.start_transaction(provider, stid);
        inner.transaction.id()
    }

    pub fn append_key(&self, key: Key) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.append_key(self.provider.as_ref(), key)
    }

    pub fn append_data(&self, data: &[u8]) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.append_data(self.provider.as_ref(), data)
    }

    /// Streaming step, called once per applied row/statement while a
    /// streaming transaction is executing.
    pub fn after_row(&self) -> Result<(), ClientError> {
        let id = self.id();
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.after_row(self.provider.as_ref(), self.client_service.as_ref(), id)
    }

    pub fn before_prepare(&self) -> Result<(), ClientError> {
        let id = self.id();
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.before_prepare(self.provider.as_ref(), self.client_service.as_ref(), id)
    }

    pub fn after_prepare(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.after_prepare()
    }

    /// `before_commit()`: drives prepare/certify/commit-order
    /// entry for the session's active transaction.
    pub fn before_commit(&self) -> Result<(), ClientError> {
        let id = self.id();
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.before_commit(self.provider.as_ref(), self.client_service.as_ref(), id)
    }

    pub fn ordered_commit(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        let result = inner.transaction.ordered_commit(self.provider.as_ref());
        if result.is_ok() {
            let gtid = inner.transaction.gtid();
            if !gtid.is_undefined() {
                Self::update_last_written_gtid(&mut inner, gtid);
            }
        }
        result
    }

    /// `after_commit()`. Acquires a scoped [`StorageService`]
    /// from [`ServerService::storage_service`] only when the transaction is
    /// a streaming XA transaction (a scoped storage service);
    /// the write-set handle is released only in local mode.
    pub fn after_commit(&self) {
        let mut inner = self.inner.lock().unwrap();
        let local_mode = inner.mode == M::Local;
        let needs_storage = inner.transaction.is_streaming() && inner.transaction.is_xa();
        if needs_storage {
            let mut storage = self.server.storage_service();
            storage.store_globals();
            inner.transaction.after_commit(self.provider.as_ref(), Some(storage.as_mut()), local_mode);
            storage.reset_globals();
        } else {
            inner.transaction.after_commit(self.provider.as_ref(), None, local_mode);
        }
        if inner.transaction.is_streaming() && local_mode {
            drop(inner);
            self.server.stop_streaming_client(self.id());
        }
    }

    pub fn before_rollback(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.before_rollback(self.provider.as_ref(), self.client_service.as_ref());
    }

    /// `after_rollback()`: see [`ClientSession::after_commit`]
    /// for the scoped-storage-service rule this shares.
    pub fn after_rollback(&self) {
        let mut inner = self.inner.lock().unwrap();
        let needs_storage = inner.transaction.is_streaming() && inner.transaction.bf_aborted_in_total_order();
        if needs_storage {
            let mut storage = self.server.storage_service();
            storage.store_globals();
            inner.transaction.after_rollback(Some(storage.as_mut()));
            storage.reset_globals();
        } else {
            inner.transaction.after_rollback(None);
        }
    }

    /// `after_statement()`: cleanup point; drives replay when
    /// the transaction was BF-aborted after having already certified.
    pub fn after_statement(&self) -> Result<(), ClientError> {
        let should_replay = self.with_transaction_mut(|t| t.after_statement(self.provider.as_ref()))?;
        if should_replay {
            self.replay()
        } else {
            Ok(())
        }
    }

    /// Drives replay of a transaction that certified before being
    /// BF-aborted.
    pub fn replay(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        inner.transaction.replay(self.provider.as_ref(), self.client_service.as_ref())
    }

    /// XA replay, used when a prepared streaming XA
    /// transaction is BF-aborted; `client_idle` reflects this session's
    /// state at the moment the abort was admitted.
    pub fn xa_replay(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock().unwrap();
        let client_idle = inner.bf_abort_client_state == Some(CS::Idle);
        inner.transaction.xa_replay(self.client_service.as_ref(), client_idle)
    }
}

#[cfg(test)]
#[path = "test/session.rs"]
mod test;
