//! Performance metrics module.
//!
//! Statistics derived from a trade log:
//! - Total trades, wins, losses, win rate
//! - Largest loss, profit factor, average profit
//! - Average daily and total P&L
//! - Monthly returns

pub mod calculator;

pub use calculator::{
    DailyReturn, MetricsCalculator, MonthlyReturns, MonthlyReturnsRow, RoundTrip, Summary,
    MONTH_NAMES,
};
