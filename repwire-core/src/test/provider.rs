use crate::{ClientId, Flags, Gtid, Seqno, ServerId, Stid, Status, TransactionId, WsMeta};

#[test]
fn status_display_matches_wire_names() {
    assert_eq!(Status::CertificationFailed.to_string(), "certification_failed");
    assert_eq!(Status::BfAbort.to_string(), "bf_abort");
    assert!(Status::Success.is_success());
    assert!(!Status::Fatal.is_success());
}

#[test]
fn ws_meta_from_stid_is_unordered() {
    let stid = Stid::new(ServerId::new([1; 16]), TransactionId::new(1), ClientId::new(1));
    let meta = WsMeta::from_stid(stid);
    assert!(!meta.ordered());
}

#[test]
fn ws_meta_ordered_once_gtid_assigned() {
    let stid = Stid::new(ServerId::new([1; 16]), TransactionId::new(1), ClientId::new(1));
    let gtid = Gtid::new(ServerId::new([1; 16]), Seqno::new(5));
    let meta = WsMeta::new(gtid, stid, Seqno::undefined(), Flags::COMMIT);
    assert!(meta.ordered());
    assert_eq!(meta.seqno().get(), 5);
}
