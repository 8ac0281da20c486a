use serde::{Deserialize, Serialize};

/// Certification-key type. The certifier treats keys as opaque byte parts;
/// the type only governs whether two keys are allowed to conflict.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Shared,
    Reference,
    Update,
    Exclusive,
}

/// A certification key: 1-3 opaque key parts plus a type. Mirrors
/// `wsrep::key`, but owns its byte parts rather than borrowing them, since
/// nothing in this port requires the zero-copy discipline the C++ side
/// needed when keys pointed into DBMS-owned row buffers.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Key {
    ty: KeyType,
    parts: Vec<Vec<u8>>,
}

impl Key {
    pub fn new(ty: KeyType) -> Self {
        Key {
            ty,
            parts: Vec::with_capacity(3),
        }
    }

    /// Appends a key part. Errors if this would exceed the maximum of 3
    /// parts per key (`wsrep::key::append_key_part`).
    pub fn append_part(&mut self, part: impl Into<Vec<u8>>) -> Result<(), repwire_base::Error> {
        if self.parts.len() == 3 {
            return Err(repwire_base::err("key parts exceed maximum of 3"));
        }
        self.parts.push(part.into());
        Ok(())
    }

    pub fn ty(&self) -> KeyType {
        self.ty
    }

    pub fn parts(&self) -> &[Vec<u8>] {
        &self.parts
    }
}

pub type KeyArray = Vec<Key>;

#[cfg(test)]
#[path = "test/key.rs"]
mod test;
