use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use repwire_core::{
    ClientError, ClientErrorKind, ClientService, ClientSession, Key, KeyType, Provider, ServerId,
};

use crate::params::Config;

/// One simulated client connection driving a scripted workload through a
/// [`ClientSession`] (grounded on `dbsim/db_client.{hpp,cpp}`'s `db::client`).
///
/// Mirrors `db::client::run_one_transaction`: generate a key/data write set,
/// optionally go through an explicit prepare, commit it, and roll back on any
/// failure. `db::client::client_command`'s `before_command` /
/// `before_statement` / `after_statement` / `after_command_*` bracketing is
/// reproduced in [`Driver::client_command`].
pub struct Driver {
    session: Arc<ClientSession>,
    client_service: Arc<dyn ClientService>,
    provider: Arc<dyn Provider>,
    config: Config,
    rng: Cell<u64>,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    replays: AtomicU64,
    bf_aborts_injected: AtomicU64,
    txn_counter: AtomicU64,
}

/// Deterministic counter-based sequence for workload data generation
/// (`db::client` leans on `<random>` for the same purpose). Rather than
/// hand-rolling a PRNG, this reuses `rapidhash` the way `submerge-coldb`'s
/// `dict.rs` does — hash a running counter to get the next pseudorandom
/// word — so the workspace's one hashing dependency covers both uses.
fn xorshift_next(state: &Cell<u64>) -> u64 {
    let counter = state.get();
    state.set(counter.wrapping_add(1));
    rapidhash::rapidhash(&counter.to_le_bytes())
}

fn xorshift_below(state: &Cell<u64>, bound: usize) -> usize {
    if bound == 0 {
        0
    } else {
        (xorshift_next(state) as usize) % bound
    }
}

/// Summary statistics for one driver's run (`db::client::stats`).
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientStats {
    pub commits: u64,
    pub rollbacks: u64,
    pub replays: u64,
    pub bf_aborts_injected: u64,
}

impl Driver {
    pub fn new(
        session: Arc<ClientSession>,
        client_service: Arc<dyn ClientService>,
        provider: Arc<dyn Provider>,
        config: Config,
        seed: u64,
    ) -> Self {
        Driver {
            session,
            client_service,
            provider,
            config,
            rng: Cell::new(if seed == 0 { 0x9e3779b97f4a7c15 } else { seed }),
            commits: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            replays: AtomicU64::new(0),
            bf_aborts_injected: AtomicU64::new(0),
            txn_counter: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            commits: self.commits.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
            replays: self.replays.load(Ordering::SeqCst),
            bf_aborts_injected: self.bf_aborts_injected.load(Ordering::SeqCst),
        }
    }

    /// `db::client::start()`: opens the session and runs `n_transactions`
    /// scripted transactions in sequence.
    pub fn run(&self) {
        self.session.open();
        for i in 0..self.config.n_transactions {
            self.run_one_transaction();
            if (i + 1) % 1000 == 0 {
                info!(
                    target: "repwire::driver",
                    client = ?self.session.id(),
                    "transactions: {} ({:.1}%)",
                    i + 1,
                    100.0 * (i + 1) as f64 / self.config.n_transactions.max(1) as f64
                );
            }
        }
        self.session.close();
        self.session.cleanup();
    }

    /// `db::client::client_command`: brackets a unit of work with
    /// `before_command`/`before_statement`/`after_statement`/
    /// `after_command_before_result`/`after_command_after_result`, the way
    /// every DBMS-side statement handler must (spec §2 "Control flow").
    fn client_command(&self, f: impl FnOnce(&ClientSession) -> Result<(), ClientError>) -> bool {
        let mut ok = self.session.before_command(false).is_ok();
        if ok {
            ok = self.session.before_statement().is_ok();
            if ok {
                ok = f(&self.session).is_ok();
            }
            let _ = self.session.after_statement();
        }
        self.session.after_command_before_result();
        if !self.session.current_error().is_success() {
            ok = false;
        }
        self.session.after_command_after_result();
        ok
    }

    fn max_data_len(&self) -> usize {
        self.config.max_data_size.max(8)
    }

    /// `db::client::run_one_transaction`.
    fn run_one_transaction(&self) {
        if self.config.sync_wait {
            let _ = self.session.sync_wait(Duration::from_secs(5));
        }

        let mut ok = self.client_command(|session| {
            session.start_transaction();
            Ok(())
        });

        if ok && self.config.fragment_size > 0 {
            self.session.enable_streaming(repwire_core::FragmentUnit::Bytes, self.config.fragment_size);
        }

        ok = ok
            && self.client_command(|session| {
                let random_key = xorshift_below(&self.rng, self.config.n_rows.max(1)) as u64;
                let mut data = vec![0u8; self.max_data_len()];
                let bytes = random_key.to_le_bytes();
                let n = bytes.len().min(data.len());
                data[..n].copy_from_slice(&bytes[..n]);

                let unknown = || ClientError::new(ClientErrorKind::UnknownError, None);
                let mut key = Key::new(KeyType::Exclusive);
                key.append_part(b"dbms".to_vec()).map_err(|_| unknown())?;
                key.append_part(session.id().get().to_le_bytes().to_vec()).map_err(|_| unknown())?;
                key.append_part(random_key.to_le_bytes().to_vec()).map_err(|_| unknown())?;
                session.append_key(key)?;

                let data_len = if self.config.random_data_size {
                    1 + xorshift_below(&self.rng, data.len().max(1))
                } else {
                    data.len()
                };
                session.append_data(&data[..data_len])?;
                self.client_service.cleanup_transaction(session.with_transaction(|t| t.id()));
                session.after_row()?;
                Ok(())
            });

        if ok {
            self.maybe_inject_bf_abort();
        }

        ok = ok
            && self.client_command(|session| {
                if self.config.two_phase_commit {
                    session.before_prepare()?;
                    session.after_prepare()?;
                }
                session.before_commit()?;
                session.ordered_commit()?;
                session.after_commit();
                Ok(())
            });

        if !ok && self.session.with_transaction(|t| t.active()) {
            self.session.before_rollback();
            self.session.after_rollback();
        }

        let final_state = self.session.with_transaction(|t| t.state());
        if !ok && final_state == repwire_core::TransactionState::Committed {
            self.replays.fetch_add(1, Ordering::SeqCst);
        }

        match final_state {
            repwire_core::TransactionState::Committed => {
                self.commits.fetch_add(1, Ordering::SeqCst);
            }
            repwire_core::TransactionState::Aborted => {
                self.rollbacks.fetch_add(1, Ordering::SeqCst);
            }
            other => {
                debug!(target: "repwire::driver", state = ?other, "transaction ended in unexpected state");
            }
        }
    }

    /// Injects a BF-abort against this driver's own in-flight transaction
    /// every `bf_abort_freq` transactions, between write-set generation and
    /// commit (spec §8 "abort storm" property, §9 supplemented feature).
    ///
    /// Marks the victim's next `certify` at the provider rather than calling
    /// `ClientSession::bf_abort` directly: the latter is meant for an
    /// external applier thread aborting an idle victim, and routes through a
    /// background rollbacker that this single-threaded harness never
    /// services. Marking the provider instead lets the victim discover the
    /// abort itself, on its own thread, the next time it certifies — exactly
    /// what `before_commit`/`certify_for_commit` already handle by routing
    /// to `must_replay`.
    fn maybe_inject_bf_abort(&self) {
        if self.config.bf_abort_freq == 0 {
            return;
        }
        let n = self.txn_counter.fetch_add(1, Ordering::SeqCst) + 1;
        if n % self.config.bf_abort_freq != 0 {
            return;
        }
        let txn_id = self.session.with_transaction(|t| t.id());
        if txn_id.is_undefined() {
            return;
        }
        let mut victim_seqno = repwire_core::Seqno::undefined();
        // A defined `bf_seqno` routes the victim's next certify to
        // `Status::BfAbort` (replay path) rather than `CertificationFailed`
        // (plain abort path) — see `MockProvider::certify`.
        self.provider.bf_abort(repwire_core::Seqno::new(0), txn_id, &mut victim_seqno);
        self.bf_aborts_injected.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn server_id_for(index: usize) -> ServerId {
    let mut bytes = [0u8; 16];
    bytes[0] = (index + 1) as u8;
    ServerId::new(bytes)
}

#[cfg(test)]
#[path = "test/driver.rs"]
mod test;
