use serde::{Deserialize, Serialize};

/// Simulator configuration (spec SPEC_FULL.md "Configuration": carried by
/// `repwire-sim`/`repwire` only, never by `repwire-core`). Grounded on
/// `dbsim/db_params.{hpp,cpp}`'s `db::params`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub n_servers: usize,
    pub n_clients: usize,
    pub n_transactions: usize,
    pub n_rows: usize,
    pub max_data_size: usize,
    pub random_data_size: bool,
    /// Fragment threshold for streaming replication; 0 disables streaming.
    pub fragment_size: u64,
    pub sync_wait: bool,
    /// How often (in transactions) to inject a BF-abort against a random
    /// in-flight client; 0 disables injection.
    pub bf_abort_freq: u64,
    pub rollback_mode_async: bool,
    pub debug_log_level: i32,
    /// Whether the workload driver runs `before_prepare`/`after_prepare`
    /// ahead of `before_commit` (grounded on `dbsim/db_client.hpp`'s
    /// `do_2pc()`, hardcoded `false` there but exposed here as a knob).
    pub two_phase_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            n_servers: 1,
            n_clients: 1,
            n_transactions: 0,
            n_rows: 1000,
            max_data_size: 8,
            random_data_size: false,
            fragment_size: 0,
            sync_wait: false,
            bf_abort_freq: 0,
            rollback_mode_async: false,
            debug_log_level: 0,
            two_phase_commit: false,
        }
    }
}

impl Config {
    /// Decodes a msgpack-encoded config file, matching `repwire`'s "sole
    /// argument is a config file path" contract (spec SPEC_FULL.md
    /// "Configuration"), using the workspace's `rmp-serde` the way
    /// `submerge-net` decodes its own wire structures.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Config, repwire_base::Error> {
        rmp_serde::from_slice(bytes).map_err(|e| repwire_base::err(e.to_string()))
    }
}

#[cfg(test)]
#[path = "test/params.rs"]
mod test;
