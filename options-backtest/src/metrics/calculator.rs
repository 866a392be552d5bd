//! Performance statistics calculator.
//!
//! Derives everything from the trade log and the initial capital:
//! - running capital after every order, and its last value per date
//! - daily returns in percent
//! - round trips, matched by the first leg's contract
//! - the summary table and the monthly returns table
//!
//! Degenerate inputs (no exits, no matched trades, no losses) produce NaN,
//! infinity or `None` in the affected fields rather than a panic.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{OrderRecord, TradeLog};

/// Month column labels of the monthly returns table.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// An entry matched with its exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    /// First leg contract shared by entry and exit.
    pub contract: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    /// Entry `cost × qty` plus exit `cost × qty`; negative is a profit.
    pub net_cost: Decimal,
}

impl RoundTrip {
    /// A round trip wins when it netted a credit.
    pub fn is_win(&self) -> bool {
        self.net_cost < Decimal::ZERO
    }
}

/// Percentage change of capital from the previous date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub return_pct: f64,
}

/// Summary statistics of a trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of exit orders.
    pub total_trades: usize,
    /// Matched round trips with a net credit.
    pub wins: usize,
    /// Matched round trips with a net debit or breakeven.
    pub losses: usize,
    /// `wins / total_trades`, as a fraction.
    pub win_pct: f64,
    /// Highest round trip net cost.
    pub largest_loss: Option<Decimal>,
    /// `wins / losses` (a count ratio).
    pub profit_factor: f64,
    /// Mean round trip profit.
    pub average_profit: Option<Decimal>,
    /// Mean daily return in percent, first day excluded.
    pub average_pnl_pct: f64,
    /// Final capital as a percentage of initial capital.
    pub total_pnl_pct: f64,
}

impl Summary {
    /// Statistic labels, in table order.
    pub const LABELS: [&'static str; 9] = [
        "Total trades",
        "Number of wins",
        "Number of losses",
        "Win %",
        "Largest loss",
        "Profit factor",
        "Average profit",
        "Average P&L %",
        "Total P&L %",
    ];

    /// The nine statistics as `(label, value)`; absent values are NaN.
    pub fn rows(&self) -> [(&'static str, f64); 9] {
        let values = [
            self.total_trades as f64,
            self.wins as f64,
            self.losses as f64,
            self.win_pct,
            decimal_to_f64(self.largest_loss),
            self.profit_factor,
            decimal_to_f64(self.average_profit),
            self.average_pnl_pct,
            self.total_pnl_pct,
        ];
        std::array::from_fn(|idx| (Self::LABELS[idx], values[idx]))
    }

    /// Whether any ratio or average is undefined.
    pub fn is_degenerate(&self) -> bool {
        self.rows().iter().any(|(_, v)| !v.is_finite())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<18} {:>14}", "Statistic", "Strategy")?;
        writeln!(f, "{}", "-".repeat(33))?;
        for (label, value) in self.rows() {
            if value.is_nan() {
                writeln!(f, "{:<18} {:>14}", label, "n/a")?;
            } else {
                writeln!(f, "{:<18} {:>14.4}", label, value)?;
            }
        }
        Ok(())
    }
}

/// Daily returns of one year, bucketed by month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturnsRow {
    pub year: i32,
    /// Compounded return of each month in percent; `None` without data.
    pub months: [Option<f64>; 12],
}

/// Year × month returns table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturns {
    pub rows: Vec<MonthlyReturnsRow>,
}

impl MonthlyReturns {
    pub fn columns(&self) -> &'static [&'static str; 12] {
        &MONTH_NAMES
    }

    pub fn year(&self, year: i32) -> Option<&MonthlyReturnsRow> {
        self.rows.iter().find(|r| r.year == year)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for MonthlyReturns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6}", "Year")?;
        for name in MONTH_NAMES {
            write!(f, " {:>9}", &name[..3])?;
        }
        writeln!(f)?;
        for row in &self.rows {
            write!(f, "{:<6}", row.year)?;
            for month in row.months {
                match month {
                    Some(pct) => write!(f, " {:>9.2}", pct)?,
                    None => write!(f, " {:>9}", "-")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Capital after each order, in log order.
    pub fn capital_series(log: &TradeLog, initial_capital: Decimal) -> Vec<Decimal> {
        log.iter()
            .scan(initial_capital, |capital, record| {
                *capital -= record.total_price();
                Some(*capital)
            })
            .collect()
    }

    /// Last capital value of every date, in date order.
    pub fn daily_capital(log: &TradeLog, initial_capital: Decimal) -> Vec<(NaiveDate, Decimal)> {
        let capital = Self::capital_series(log, initial_capital);
        let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for (record, value) in log.iter().zip(capital) {
            by_date.insert(record.date(), value);
        }
        by_date.into_iter().collect()
    }

    /// Percentage change of daily capital.
    ///
    /// The first date has no prior value and is left out.
    pub fn daily_returns(log: &TradeLog, initial_capital: Decimal) -> Vec<DailyReturn> {
        Self::daily_capital(log, initial_capital)
            .windows(2)
            .map(|w| {
                let prev = decimal_to_f64(Some(w[0].1));
                let curr = decimal_to_f64(Some(w[1].1));
                DailyReturn {
                    date: w[1].0,
                    return_pct: (curr - prev) / prev * 100.0,
                }
            })
            .collect()
    }

    /// Match the entry and exit of a contract.
    ///
    /// Only the first entry and the first exit whose first leg trades
    /// `contract` are considered. Returns `None` unless both exist.
    pub fn match_round_trip(log: &TradeLog, contract: &str) -> Option<RoundTrip> {
        let on_contract = |r: &&OrderRecord| r.contract() == Some(contract);
        let entry = log.entries().find(on_contract)?;
        let exit = log.exits().find(on_contract)?;

        Some(RoundTrip {
            contract: contract.to_string(),
            entry_date: entry.date(),
            exit_date: exit.date(),
            net_cost: entry.total_price() + exit.total_price(),
        })
    }

    /// Every matched round trip, ordered by entry.
    pub fn round_trips(log: &TradeLog) -> Vec<RoundTrip> {
        let mut seen = HashSet::new();
        log.entries()
            .filter_map(|entry| entry.contract())
            .filter(|contract| seen.insert(*contract))
            .filter_map(|contract| Self::match_round_trip(log, contract))
            .collect()
    }

    /// Summary statistics of a trade log.
    pub fn summary(log: &TradeLog, initial_capital: Decimal) -> Summary {
        let trips = Self::round_trips(log);

        let total_trades = log.exits().count();
        let wins = trips.iter().filter(|t| t.is_win()).count();
        let losses = trips.len() - wins;

        let win_pct = wins as f64 / total_trades as f64;
        let profit_factor = wins as f64 / losses as f64;

        let largest_loss = trips.iter().map(|t| t.net_cost).max();
        let average_profit = if trips.is_empty() {
            None
        } else {
            let net: Decimal = trips.iter().map(|t| t.net_cost).sum();
            Some(-net / Decimal::from(trips.len()))
        };

        let daily_returns = Self::daily_returns(log, initial_capital);
        let average_pnl_pct = daily_returns.iter().map(|r| r.return_pct).sum::<f64>()
            / daily_returns.len() as f64;

        let final_capital = Self::capital_series(log, initial_capital)
            .last()
            .copied()
            .unwrap_or(initial_capital);
        let total_pnl_pct =
            decimal_to_f64(Some(final_capital)) / decimal_to_f64(Some(initial_capital)) * 100.0;

        Summary {
            total_trades,
            wins,
            losses,
            win_pct,
            largest_loss,
            profit_factor,
            average_profit,
            average_pnl_pct,
            total_pnl_pct,
        }
    }

    /// Daily returns bucketed by year and month.
    ///
    /// Each cell compounds the daily returns observed in that month.
    pub fn monthly_returns(log: &TradeLog, initial_capital: Decimal) -> MonthlyReturns {
        let mut years: BTreeMap<i32, [Option<f64>; 12]> = BTreeMap::new();

        for daily in Self::daily_returns(log, initial_capital) {
            let months = years.entry(daily.date.year()).or_insert([None; 12]);
            let cell = &mut months[daily.date.month0() as usize];
            let prior = cell.map_or(1.0, |pct| 1.0 + pct / 100.0);
            let growth = prior * (1.0 + daily.return_pct / 100.0);
            *cell = Some((growth - 1.0) * 100.0);
        }

        MonthlyReturns {
            rows: years
                .into_iter()
                .map(|(year, months)| MonthlyReturnsRow { year, months })
                .collect(),
        }
    }
}

fn decimal_to_f64(value: Option<Decimal>) -> f64 {
    value
        .and_then(|d| f64::try_from(d).ok())
        .unwrap_or(f64::NAN)
}
