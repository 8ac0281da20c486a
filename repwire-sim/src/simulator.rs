use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use repwire_core::{ClientId, ClientSession, Provider, RollbackMode};

use crate::driver::{server_id_for, ClientStats, Driver};
use crate::mock_provider::MockProvider;
use crate::mock_services::{MockClientService, MockServerService, MockStorage};
use crate::params::Config;

/// Aggregate statistics for a whole simulator run (`db::simulator::stats_`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatorStats {
    pub commits: u64,
    pub rollbacks: u64,
    pub replays: u64,
    pub bf_aborts_injected: u64,
    pub elapsed_secs: f64,
}

impl SimulatorStats {
    pub fn transactions(&self) -> u64 {
        self.commits + self.rollbacks
    }

    /// `db::simulator::stats()`'s textual report.
    pub fn report(&self) -> String {
        format!(
            "Number of transactions: {}\nSeconds: {:.3}\nTransactions per second: {:.1}\nBF aborts: {}\nClient commits: {}\nClient rollbacks: {}\nClient replays: {}",
            self.transactions(),
            self.elapsed_secs,
            if self.elapsed_secs > 0.0 { self.transactions() as f64 / self.elapsed_secs } else { 0.0 },
            self.bf_aborts_injected,
            self.commits,
            self.rollbacks,
            self.replays,
        )
    }
}

/// One simulated replication server: a single [`ClientSession`] per
/// configured client, sharing one [`MockProvider`] and [`MockServerService`]
/// (grounded on `dbsim/db_server.{hpp,cpp}`'s `db::server`, simplified to a
/// single in-process "cluster" of one provider rather than a real
/// multi-process group-communication mesh — the provider itself, per spec
/// §1, is out of scope).
struct SimulatedServer {
    sessions: Vec<Arc<ClientSession>>,
    client_services: Vec<Arc<MockClientService>>,
    provider: Arc<MockProvider>,
    server_service: Arc<MockServerService>,
}

/// The in-tree DBMS simulation harness (spec §2 "in-tree simulation
/// harness (`dbsim`)"; grounded on `dbsim/db_simulator.{hpp,cpp}`). Not
/// itself a subject of the spec, but named by spec.md §1/§2 as part of the
/// repository the engine lives in.
pub struct Simulator {
    config: Config,
    servers: Vec<SimulatedServer>,
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        info!(target: "repwire::simulator", n_servers = config.n_servers, n_clients = config.n_clients, "building simulator");
        let servers = (0..config.n_servers.max(1))
            .map(|i| Self::build_server(&config, i))
            .collect();
        Simulator { config, servers }
    }

    fn build_server(config: &Config, index: usize) -> SimulatedServer {
        let server_id = server_id_for(index);
        let provider = Arc::new(MockProvider::new(server_id, server_id_for(0)));
        let storage = MockStorage::new();
        let rollback_mode = if config.rollback_mode_async { RollbackMode::Async } else { RollbackMode::Sync };
        let server_service = MockServerService::new(storage, rollback_mode);

        let mut sessions = Vec::with_capacity(config.n_clients.max(1));
        let mut client_services = Vec::with_capacity(config.n_clients.max(1));
        for c in 0..config.n_clients.max(1) {
            let client_service = Arc::new(MockClientService::new());
            let session = Arc::new(ClientSession::new(
                ClientId::new(c as u64),
                server_id,
                provider.clone(),
                server_service.clone(),
                client_service.clone(),
            ));
            sessions.push(session);
            client_services.push(client_service);
        }
        SimulatedServer { sessions, client_services, provider, server_service }
    }

    /// `db::simulator::run()`: starts every server's clients, drives each
    /// client's scripted workload to completion (with optional BF-abort
    /// injection), and collects aggregate statistics.
    pub fn run(&self) -> SimulatorStats {
        let start = Instant::now();
        let mut per_client: Vec<ClientStats> = Vec::new();

        for server in &self.servers {
            for (i, session) in server.sessions.iter().enumerate() {
                let client_service = server.client_services[i].clone();
                let driver = Driver::new(
                    session.clone(),
                    client_service,
                    server.provider.clone(),
                    self.config.clone(),
                    (i as u64 + 1) * 2654435761,
                );
                driver.run();
                per_client.push(driver.stats());
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        let mut stats = SimulatorStats { elapsed_secs: elapsed, ..SimulatorStats::default() };
        for c in per_client {
            stats.commits += c.commits;
            stats.rollbacks += c.rollbacks;
            stats.replays += c.replays;
            stats.bf_aborts_injected += c.bf_aborts_injected;
        }
        info!(target: "repwire::simulator", "{}", stats.report());
        stats
    }

    /// Status variables exposed by each simulated server's provider
    /// (`db::simulator::stop()`'s per-server `provider().status()` dump).
    pub fn provider_status(&self) -> Vec<Vec<(String, String)>> {
        self.servers.iter().map(|s| s.provider.status()).collect()
    }
}

#[cfg(test)]
#[path = "test/simulator.rs"]
mod test;
