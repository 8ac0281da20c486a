use crate::{NoSyncPoints, RollbackMode, SyncPoints};

#[test]
fn no_sync_points_is_harmless() {
    let sp = NoSyncPoints;
    sp.debug_sync("before_prepare");
    sp.debug_crash("before_prepare");
}

#[test]
fn rollback_mode_variants_are_distinct() {
    assert_ne!(RollbackMode::Sync, RollbackMode::Async);
}
