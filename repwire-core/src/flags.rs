use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Write-set flags. The bit values are part of the provider's versioned
/// binary API (`wsrep::provider::flag`) and must not be renumbered.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Flags(u32);

impl Flags {
    pub const START_TRANSACTION: Flags = Flags(1 << 0);
    pub const COMMIT: Flags = Flags(1 << 1);
    pub const ROLLBACK: Flags = Flags(1 << 2);
    pub const ISOLATION: Flags = Flags(1 << 3);
    pub const PA_UNSAFE: Flags = Flags(1 << 4);
    pub const COMMUTATIVE: Flags = Flags(1 << 5);
    pub const NATIVE: Flags = Flags(1 << 6);
    pub const PREPARE: Flags = Flags(1 << 7);
    pub const SNAPSHOT: Flags = Flags(1 << 8);
    pub const IMPLICIT_DEPS: Flags = Flags(1 << 9);

    pub const NONE: Flags = Flags(0);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Flags) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    /// `commit | rollback` is illegal per spec; callers that build flags
    /// programmatically should check this before handing them to the
    /// provider.
    pub fn is_valid(self) -> bool {
        !self.contains(Flags::COMMIT.or(Flags::ROLLBACK))
    }

    fn or(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::NONE
    }
}

impl BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let named = [
            (Flags::START_TRANSACTION, "start_transaction"),
            (Flags::COMMIT, "commit"),
            (Flags::ROLLBACK, "rollback"),
            (Flags::ISOLATION, "isolation"),
            (Flags::PA_UNSAFE, "pa_unsafe"),
            (Flags::COMMUTATIVE, "commutative"),
            (Flags::NATIVE, "native"),
            (Flags::PREPARE, "prepare"),
            (Flags::SNAPSHOT, "snapshot"),
            (Flags::IMPLICIT_DEPS, "implicit_deps"),
        ];
        let mut first = true;
        for (flag, name) in named {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "test/flags.rs"]
mod test;
