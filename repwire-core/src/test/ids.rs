use crate::{ClientId, Gtid, ServerId, Seqno, Stid, TransactionId};

#[test]
fn transaction_id_undefined_is_default() {
    assert!(TransactionId::default().is_undefined());
    assert!(TransactionId::undefined().is_undefined());
    assert!(!TransactionId::new(7).is_undefined());
}

#[test]
fn client_id_undefined_is_default() {
    assert!(ClientId::default().is_undefined());
    assert!(!ClientId::new(0).is_undefined());
}

#[test]
fn seqno_ordering_and_undefined() {
    assert!(Seqno::default().is_undefined());
    assert!(Seqno::new(3) < Seqno::new(4));
    assert!(!Seqno::new(0).is_undefined());
}

#[test]
fn gtid_undefined_tracks_seqno() {
    let g = Gtid::undefined();
    assert!(g.is_undefined());
    let g2 = Gtid::new(ServerId::new([1; 16]), Seqno::new(42));
    assert!(!g2.is_undefined());
    assert_eq!(g2.seqno().get(), 42);
}

#[test]
fn stid_roundtrips_fields() {
    let s = Stid::new(ServerId::new([9; 16]), TransactionId::new(5), ClientId::new(1));
    assert_eq!(s.transaction_id().get(), 5);
    assert_eq!(s.client_id().get(), 1);
}
