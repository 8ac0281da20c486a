//! In-tree DBMS simulation harness (spec §2 "in-tree simulation harness
//! (`dbsim`)"): a mock [`repwire_core::Provider`] and the four service seams,
//! plus a scripted workload driver and a top-level [`Simulator`] that wires
//! them together into a small in-process "cluster". Not itself a subject of
//! the spec (spec §1 lists the simulator among the "deliberately out of
//! scope" collaborators) but carried because the spec's own OVERVIEW lists
//! it as part of the repository.

mod driver;
mod mock_provider;
mod mock_services;
mod params;
mod simulator;

pub use driver::{server_id_for, ClientStats, Driver};
pub use mock_provider::MockProvider;
pub use mock_services::{
    MockClientService, MockHighPriorityService, MockServerService, MockStorage, MockStorageService,
    MockSyncPoints,
};
pub use params::Config;
pub use simulator::{Simulator, SimulatorStats};
