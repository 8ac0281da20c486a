use super::{MockClientService, MockServerService, MockStorage};
use repwire_core::{
    ClientId, ClientService, Flags, Gtid, RollbackMode, Seqno, ServerId, ServerService,
    StorageService, TransactionId, WsHandle, WsMeta, Xid,
};

#[test]
fn client_service_tracks_generated_bytes() {
    let svc = MockClientService::new();
    svc.generate_bytes(12);
    svc.generate_bytes(3);
    assert_eq!(svc.bytes_generated(), 15);
    svc.cleanup_transaction(TransactionId::new(1));
    assert_eq!(svc.bytes_generated(), 0);
}

#[test]
fn client_service_prepares_fragments_with_increasing_sequence() {
    let svc = MockClientService::new();
    let (f1, _) = svc.prepare_fragment_for_replication(TransactionId::new(1)).unwrap();
    let (f2, _) = svc.prepare_fragment_for_replication(TransactionId::new(1)).unwrap();
    assert_ne!(f1, f2);
}

#[test]
fn client_service_records_emergency_shutdown() {
    let svc = MockClientService::new();
    svc.emergency_shutdown("disk full");
    assert_eq!(svc.emergency_shutdowns(), vec!["disk full".to_string()]);
}

#[test]
fn server_service_boxes_storage_service() {
    let storage = MockStorage::new();
    let server = MockServerService::new(storage, RollbackMode::Sync);
    let mut boxed: Box<dyn StorageService> = server.storage_service();
    let handle = WsHandle::with_opaque(TransactionId::new(1), 1);
    boxed.start_transaction(&handle).unwrap();
    boxed
        .append_fragment(ServerId::undefined(), TransactionId::new(1), Flags::NONE, b"abc", &Xid::undefined())
        .unwrap();
    assert_eq!(server.storage().fragment_count(TransactionId::new(1)), 1);
}

#[test]
fn server_service_records_stopped_streaming_clients() {
    let storage = MockStorage::new();
    let server = MockServerService::new(storage, RollbackMode::Async);
    server.stop_streaming_client(ClientId::new(7));
    assert_eq!(server.stopped_streaming_clients(), vec![ClientId::new(7)]);
}

#[test]
fn server_service_schedules_background_rollback() {
    let storage = MockStorage::new();
    let server = MockServerService::new(storage, RollbackMode::Async);
    server.initiate_background_rollback(ClientId::new(1), TransactionId::new(9));
    assert_eq!(server.pending_rollbacks(), vec![(ClientId::new(1), TransactionId::new(9))]);
}

#[test]
fn storage_service_commit_advances_position() {
    let storage = MockStorage::new();
    let server = MockServerService::new(storage, RollbackMode::Sync);
    let mut svc = server.mock_storage_service();
    let handle = WsHandle::with_opaque(TransactionId::new(1), 1);
    svc.start_transaction(&handle).unwrap();
    let stid = repwire_core::Stid::new(ServerId::undefined(), TransactionId::new(1), ClientId::new(1));
    let gtid = Gtid::new(ServerId::new([2; 16]), Seqno::new(42));
    let meta = WsMeta::new(gtid, stid, Seqno::undefined(), Flags::COMMIT);
    svc.commit(&handle, &meta).unwrap();
    assert_eq!(server.last_committed_gtid(), meta.gtid());
}
