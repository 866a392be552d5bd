//! Simulation state owned by a single backtest run.
//!
//! Capital moves only together with the ledger or the trade log:
//! every executed order appends to the log and debits `cost × qty`.

use rust_decimal::Decimal;

use crate::strategy::ExitSignals;

use super::ledger::Ledger;
use super::trade::OrderRecord;
use super::trade_log::TradeLog;

/// What happened to a period's entry candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The strategy proposed nothing.
    NoCandidates,
    /// The first candidate was executed at `price`.
    Executed { price: Decimal },
    /// The first candidate needed `price` but only `capital` was available.
    InsufficientCapital { price: Decimal, capital: Decimal },
}

/// Ledger, trade log and capital of one run.
#[derive(Debug, Clone)]
pub struct SimulationState {
    ledger: Ledger,
    trade_log: TradeLog,
    capital: Decimal,
}

impl SimulationState {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            ledger: Ledger::new(),
            trade_log: TradeLog::new(),
            capital: initial_capital,
        }
    }

    /// Log every exit, drop the masked ledger rows and debit their costs.
    ///
    /// Returns the number of ledger rows closed.
    pub fn execute_exits(&mut self, signals: ExitSignals) -> usize {
        self.capital -= signals.total_cost();

        let ExitSignals { orders, mask, .. } = signals;
        self.trade_log.extend(orders);
        self.ledger.apply_exit(&mask).len()
    }

    /// Execute the first candidate only.
    ///
    /// With `stop_if_broke` the entry is skipped unless current capital
    /// covers its total price.
    pub fn execute_entry(
        &mut self,
        candidates: Vec<OrderRecord>,
        stop_if_broke: bool,
    ) -> EntryOutcome {
        let Some(entry) = candidates.into_iter().next() else {
            return EntryOutcome::NoCandidates;
        };

        let price = entry.total_price();
        if stop_if_broke && self.capital < price {
            return EntryOutcome::InsufficientCapital {
                price,
                capital: self.capital,
            };
        }

        self.ledger.apply_entry(entry.clone());
        self.trade_log.append(entry);
        self.capital -= price;
        EntryOutcome::Executed { price }
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trade_log
    }

    /// Consume the state, yielding the final ledger, log and capital.
    pub fn into_parts(self) -> (Ledger, TradeLog, Decimal) {
        (self.ledger, self.trade_log, self.capital)
    }
}
