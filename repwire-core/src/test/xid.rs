use crate::Xid;

#[test]
fn null_xid_round_trips() {
    let x = Xid::null();
    assert!(x.is_null());
    assert_eq!(x.format_id(), -1);
}

#[test]
fn oversized_gtrid_is_rejected() {
    let data = vec![0u8; 200];
    assert!(Xid::new(1, 65, 0, &data).is_err());
    assert!(Xid::new(1, 64, 64, &data).is_ok());
}

#[test]
fn clear_resets_to_null() {
    let mut x = Xid::new(1, 4, 0, b"abcd").unwrap();
    assert!(!x.is_null());
    x.clear();
    assert!(x.is_null());
}
