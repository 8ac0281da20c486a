use super::Config;

#[test]
fn default_config_is_single_server_no_streaming() {
    let cfg = Config::default();
    assert_eq!(cfg.n_servers, 1);
    assert_eq!(cfg.n_clients, 1);
    assert_eq!(cfg.fragment_size, 0);
    assert_eq!(cfg.bf_abort_freq, 0);
}

#[test]
fn round_trips_through_msgpack() {
    let cfg = Config {
        n_servers: 3,
        n_clients: 8,
        n_transactions: 100,
        fragment_size: 4096,
        bf_abort_freq: 17,
        ..Config::default()
    };
    let bytes = rmp_serde::to_vec(&cfg).unwrap();
    let decoded = Config::from_msgpack(&bytes).unwrap();
    assert_eq!(decoded.n_servers, 3);
    assert_eq!(decoded.n_clients, 8);
    assert_eq!(decoded.n_transactions, 100);
    assert_eq!(decoded.fragment_size, 4096);
    assert_eq!(decoded.bf_abort_freq, 17);
}

#[test]
fn missing_fields_fall_back_to_default() {
    let empty: std::collections::BTreeMap<String, String> = std::collections::BTreeMap::new();
    let bytes = rmp_serde::to_vec(&empty).unwrap();
    let cfg = Config::from_msgpack(&bytes).unwrap();
    assert_eq!(cfg.n_servers, 1);
    assert_eq!(cfg.n_rows, 1000);
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let err = Config::from_msgpack(&[0xff, 0x00, 0x01]);
    assert!(err.is_err());
}
