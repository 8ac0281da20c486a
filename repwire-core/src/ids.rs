use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque 64-bit transaction identity. Coordinator-local: unique only in
/// combination with the [`ServerId`] that minted it (see [`crate::Stid`]).
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        TransactionId(id)
    }

    pub fn undefined() -> Self {
        TransactionId(u64::MAX)
    }

    pub fn is_undefined(&self) -> bool {
        self.0 == u64::MAX
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque 64-bit client (session) identity, same undefined-sentinel shape
/// as [`TransactionId`].
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ClientId(u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        ClientId(id)
    }

    pub fn undefined() -> Self {
        ClientId(u64::MAX)
    }

    pub fn is_undefined(&self) -> bool {
        self.0 == u64::MAX
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 16-byte opaque identity of a cluster member. The provider hands these
/// out; the engine never interprets the bytes.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
pub struct ServerId([u8; 16]);

impl ServerId {
    pub fn new(bytes: [u8; 16]) -> Self {
        ServerId(bytes)
    }

    pub fn undefined() -> Self {
        ServerId([0; 16])
    }

    pub fn is_undefined(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Cluster-wide, signed, monotonically increasing ordering number assigned
/// by the provider at certification time.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Seqno(i64);

impl Seqno {
    pub fn new(v: i64) -> Self {
        Seqno(v)
    }

    pub fn undefined() -> Self {
        Seqno(-1)
    }

    pub fn is_undefined(&self) -> bool {
        self.0 < 0
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl Default for Seqno {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Debug for Seqno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global transaction id: a server identity plus the seqno the provider
/// assigned a write-set within that server's ordering stream.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
pub struct Gtid {
    id: ServerId,
    seqno: Seqno,
}

impl Gtid {
    pub fn new(id: ServerId, seqno: Seqno) -> Self {
        Gtid { id, seqno }
    }

    pub fn undefined() -> Self {
        Gtid {
            id: ServerId::undefined(),
            seqno: Seqno::undefined(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.seqno.is_undefined()
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn seqno(&self) -> Seqno {
        self.seqno
    }
}

impl fmt::Debug for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:?}", self.id, self.seqno)
    }
}

/// The replication-side identity of a transaction: which server coordinated
/// it, under what transaction id, on behalf of which client session.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize)]
pub struct Stid {
    server_id: ServerId,
    transaction_id: TransactionId,
    client_id: ClientId,
}

impl Stid {
    pub fn new(server_id: ServerId, transaction_id: TransactionId, client_id: ClientId) -> Self {
        Stid {
            server_id,
            transaction_id,
            client_id,
        }
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }
}

impl fmt::Debug for Stid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}",
            self.server_id, self.transaction_id, self.client_id
        )
    }
}

#[cfg(test)]
#[path = "test/ids.rs"]
mod test;
