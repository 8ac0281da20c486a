//! `repwire-core`: the transaction engine, client-session engine, provider
//! abstraction, and replay/BF-abort orchestration for a synchronous
//! multi-master replication library embedded in a DBMS process (see the
//! repository's spec: C1-C7).
//!
//! The core persists nothing and owns no CLI/env/file-format surface of its
//! own; it is driven by a DBMS integration layer through the service seams
//! in [`services`] and drives a pluggable [`Provider`] in turn.

mod client_error;
mod flags;
mod ids;
mod key;
mod provider;
mod services;
mod session;
mod streaming;
mod transaction;
mod xid;

pub use client_error::{ClientError, ClientErrorKind};
pub use flags::Flags;
pub use ids::{ClientId, Gtid, Seqno, ServerId, Stid, TransactionId};
pub use key::{Key, KeyArray, KeyType};
pub use provider::{Provider, Status, WsHandle, WsMeta};
pub use services::{
    ClientService, HighPriorityService, NoSyncPoints, RollbackMode, ServerService, StorageService,
    StoredKeys, SyncPoints,
};
pub use session::{
    ClientSession, ClientSessionMode, ClientSessionState, mode_transition_allowed,
    state_transition_allowed,
};
pub use streaming::{FragmentUnit, StreamingContext};
pub use transaction::{transition_allowed, Transaction, TransactionState};
pub use xid::Xid;
