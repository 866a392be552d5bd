//! Open position ledger.

use serde::{Deserialize, Serialize};

use super::trade::OrderRecord;

/// Positions opened and not yet closed, in opening order.
///
/// Rows are appended on entry and removed in bulk on exit. No duplicate
/// check is made; strategies filter out contracts they already hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    positions: Vec<OrderRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a newly opened position.
    pub fn apply_entry(&mut self, record: OrderRecord) {
        self.positions.push(record);
    }

    /// Remove every row whose mask flag is set and return the removed rows.
    ///
    /// Rows beyond the end of `mask` are kept.
    pub fn apply_exit(&mut self, mask: &[bool]) -> Vec<OrderRecord> {
        debug_assert!(
            mask.len() <= self.positions.len(),
            "exit mask covers {} rows but ledger holds {}",
            mask.len(),
            self.positions.len()
        );

        let mut closed = Vec::new();
        let mut kept = Vec::with_capacity(self.positions.len());
        for (idx, position) in self.positions.drain(..).enumerate() {
            if mask.get(idx).copied().unwrap_or(false) {
                closed.push(position);
            } else {
                kept.push(position);
            }
        }
        self.positions = kept;
        closed
    }

    pub fn positions(&self) -> &[OrderRecord] {
        &self.positions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderRecord> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether any open position has a leg on `contract`.
    pub fn holds_contract(&self, contract: &str) -> bool {
        self.positions.iter().any(|p| p.holds_contract(contract))
    }
}
