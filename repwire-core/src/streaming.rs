use std::collections::BTreeSet;

use crate::{Seqno, TransactionId};

/// The unit a streaming transaction's fragment threshold is measured in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FragmentUnit {
    Bytes,
    Rows,
    Statements,
}

/// Per-transaction accounting for fragment-based (streaming) replication,
/// grounded on `transaction.cpp`'s `streaming_context_` bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct StreamingContext {
    unit: Option<FragmentUnit>,
    fragment_size: u64,
    unit_counter: u64,
    log_position: u64,
    certified_fragments: BTreeSet<(Seqno, Seqno)>,
    rolled_back: Option<TransactionId>,
}

impl StreamingContext {
    pub fn new() -> Self {
        StreamingContext::default()
    }

    pub fn enable(&mut self, unit: FragmentUnit, fragment_size: u64) {
        self.unit = Some(unit);
        self.fragment_size = fragment_size;
        self.unit_counter = 0;
    }

    pub fn disable(&mut self) {
        self.unit = None;
        self.fragment_size = 0;
        self.unit_counter = 0;
        self.log_position = 0;
        self.certified_fragments.clear();
    }

    pub fn is_streaming(&self) -> bool {
        self.unit.is_some()
    }

    pub fn fragment_unit(&self) -> Option<FragmentUnit> {
        self.unit
    }

    /// Advances the unit counter and reports whether the fragment-size
    /// threshold has been crossed. `delta` is 1 for row/statement streaming,
    /// the new byte count for byte streaming.
    pub fn advance(&mut self, delta: u64, force: bool) -> bool {
        self.unit_counter += delta;
        if force || self.unit_counter >= self.fragment_size {
            self.unit_counter = 0;
            true
        } else {
            false
        }
    }

    pub fn set_log_position(&mut self, pos: u64) {
        self.log_position = pos;
    }

    pub fn log_position(&self) -> u64 {
        self.log_position
    }

    pub fn record_certified_fragment(&mut self, certify_seqno: Seqno, apply_seqno: Seqno) {
        self.certified_fragments.insert((certify_seqno, apply_seqno));
    }

    pub fn certified_fragment_count(&self) -> usize {
        self.certified_fragments.len()
    }

    /// Marks `txn_id` as rolled back, and reports whether it was already
    /// rolled back. Streaming rollback must be idempotent.
    pub fn mark_rolled_back(&mut self, txn_id: TransactionId) -> bool {
        let already = self.rolled_back == Some(txn_id);
        self.rolled_back = Some(txn_id);
        already
    }

    pub fn is_rolled_back(&self, txn_id: TransactionId) -> bool {
        self.rolled_back == Some(txn_id)
    }

    pub fn clear_fragments(&mut self) {
        self.unit_counter = 0;
        self.log_position = 0;
        self.certified_fragments.clear();
    }
}

#[cfg(test)]
#[path = "test/streaming.rs"]
mod test;
