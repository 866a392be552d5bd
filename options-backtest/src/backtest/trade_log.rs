//! Append-only log of executed orders.

use serde::{Deserialize, Serialize};

use super::trade::OrderRecord;

/// Every executed order (entries and exits) in execution order.
///
/// Rows are only ever appended. Nothing is unique per row except the
/// combination of date and leg contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeLog {
    records: Vec<OrderRecord>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, record: OrderRecord) {
        self.records.push(record);
    }

    pub(crate) fn extend(&mut self, records: impl IntoIterator<Item = OrderRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[OrderRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows whose first leg opens a position.
    pub fn entries(&self) -> impl Iterator<Item = &OrderRecord> {
        self.records.iter().filter(|r| r.is_entry())
    }

    /// Rows whose first leg closes a position.
    pub fn exits(&self) -> impl Iterator<Item = &OrderRecord> {
        self.records.iter().filter(|r| !r.is_entry())
    }

    /// Sum of `cost × qty` over every row.
    pub fn net_cash_flow(&self) -> rust_decimal::Decimal {
        self.records.iter().map(OrderRecord::total_price).sum()
    }
}

impl FromIterator<OrderRecord> for TradeLog {
    fn from_iter<I: IntoIterator<Item = OrderRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TradeLog {
    type Item = &'a OrderRecord;
    type IntoIter = std::slice::Iter<'a, OrderRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
