//! Backtesting engine for options strategies.
//!
//! This module provides the simulation loop and its bookkeeping:
//! - Order records (entries and exits of multi-leg positions)
//! - Open position ledger
//! - Append-only trade log
//! - Capital accounting and the period-by-period engine

pub mod engine;
pub mod ledger;
pub mod state;
pub mod trade;
pub mod trade_log;

pub use engine::{BacktestConfig, BacktestEngine, BacktestError, BacktestResult};
pub use ledger::Ledger;
pub use state::{EntryOutcome, SimulationState};
pub use trade::{Direction, LegFill, OrderRecord, OrderTag, Totals};
pub use trade_log::TradeLog;
