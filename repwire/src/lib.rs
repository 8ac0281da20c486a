//! Top-level wiring for the replication-engine simulator binary: loads a
//! [`repwire_sim::Config`] and runs it through [`repwire_sim::Simulator`].
//! Kept small deliberately (spec SPEC_FULL.md "Workspace shape": "thin
//! top-level binary that wires a config file to the simulator") — this is
//! one embedder of `repwire-core`, not the only one (a real DBMS host is
//! another, out of scope here per spec §1).

use std::path::Path;

use repwire_sim::{Config, Simulator, SimulatorStats};

/// Reads a msgpack-encoded [`Config`] from `path` and runs the simulator to
/// completion, returning its aggregate statistics.
pub fn run_from_config_file(path: &Path) -> repwire_base::Result<SimulatorStats> {
    let bytes = std::fs::read(path).map_err(|e| repwire_base::err(e.to_string()))?;
    let config = Config::from_msgpack(&bytes)?;
    tracing::info!(target: "repwire", path = %path.display(), "loaded simulator config");
    let sim = Simulator::new(config);
    Ok(sim.run())
}

#[cfg(test)]
#[path = "test/lib.rs"]
mod test;
