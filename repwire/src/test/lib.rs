use repwire_sim::Config;

use super::run_from_config_file;

fn scratch_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("repwire-test-{:?}-{}.msgpack", std::thread::current().id(), name))
}

#[test]
fn runs_config_file_end_to_end() {
    let config = Config { n_transactions: 5, n_rows: 20, ..Config::default() };
    let bytes = rmp_serde::to_vec(&config).unwrap();
    let path = scratch_path("ok");
    std::fs::write(&path, &bytes).unwrap();

    let stats = run_from_config_file(&path).unwrap();
    assert_eq!(stats.transactions(), 5);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_config_file_is_an_error() {
    let path = scratch_path("missing");
    assert!(run_from_config_file(&path).is_err());
}
