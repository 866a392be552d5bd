//! Strategy contract consumed by the backtest engine.
//!
//! A strategy decides which positions to open and close; the engine only
//! executes what it is given. Signals are plain order records:
//! - entries: candidate records, of which the engine takes at most the first
//! - exits: records to log, a mask over the current ledger rows they close,
//!   and the cash flow of each close

pub mod leg_strategy;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{Direction, Ledger, OrderRecord};
use crate::data::{OptionQuote, OptionType, OptionsSnapshot, Schema};

pub use leg_strategy::{ExitThresholds, LegStrategy, LegStrategyConfig};

/// Exit candidates for one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExitSignals {
    /// Closing records, appended to the trade log as-is.
    pub orders: Vec<OrderRecord>,
    /// One flag per ledger row; `true` rows are closed.
    pub mask: Vec<bool>,
    /// Cash flow (`cost × qty`) of each closing record.
    pub total_costs: Vec<Decimal>,
}

impl ExitSignals {
    /// No exits against a ledger of `ledger_len` rows.
    pub fn none(ledger_len: usize) -> Self {
        Self {
            orders: Vec::new(),
            mask: vec![false; ledger_len],
            total_costs: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Sum of the closing cash flows.
    pub fn total_cost(&self) -> Decimal {
        self.total_costs.iter().copied().sum()
    }
}

/// Criteria a quote must satisfy to be selected for a leg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegFilter {
    /// Underlying symbol.
    pub underlying: Option<String>,
    /// Minimum days to expiration (inclusive).
    pub min_dte: Option<i64>,
    /// Maximum days to expiration (inclusive).
    pub max_dte: Option<i64>,
    /// Minimum strike (inclusive).
    pub min_strike: Option<Decimal>,
    /// Maximum strike (inclusive).
    pub max_strike: Option<Decimal>,
}

impl LegFilter {
    pub fn matches(&self, quote: &OptionQuote) -> bool {
        let dte = quote.dte();
        self.underlying
            .as_ref()
            .map_or(true, |u| u.eq_ignore_ascii_case(&quote.underlying))
            && self.min_dte.map_or(true, |min| dte >= min)
            && self.max_dte.map_or(true, |max| dte <= max)
            && self.min_strike.map_or(true, |min| quote.strike >= min)
            && self.max_strike.map_or(true, |max| quote.strike <= max)
    }
}

/// One leg of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyLeg {
    /// Leg name, e.g. "leg_1".
    pub name: String,
    pub option_type: OptionType,
    pub direction: Direction,
    /// Quotes eligible for opening this leg.
    #[serde(default)]
    pub entry_filter: LegFilter,
    /// Quotes on which an open leg should be closed.
    #[serde(default)]
    pub exit_filter: Option<LegFilter>,
}

impl StrategyLeg {
    pub fn new(name: &str, option_type: OptionType, direction: Direction) -> Self {
        Self {
            name: name.to_string(),
            option_type,
            direction,
            entry_filter: LegFilter::default(),
            exit_filter: None,
        }
    }
}

/// A trading strategy over option legs.
pub trait Strategy {
    /// Schema the strategy was written against.
    fn schema(&self) -> &Schema;

    /// Ordered legs; their names and count define the order record shape.
    fn legs(&self) -> &[StrategyLeg];

    /// Capital the backtest starts with.
    fn initial_capital(&self) -> Decimal;

    /// Positions the strategy is willing to open this period.
    fn filter_entries(
        &self,
        snapshot: &OptionsSnapshot,
        ledger: &Ledger,
        date: NaiveDate,
    ) -> Vec<OrderRecord>;

    /// Positions the strategy wants to close this period.
    fn filter_exits(
        &self,
        snapshot: &OptionsSnapshot,
        ledger: &Ledger,
        date: NaiveDate,
    ) -> ExitSignals;
}
