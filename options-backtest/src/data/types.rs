//! Core market data types for options backtesting.
//!
//! A quote describes one option contract on one quote date. Quotes are
//! grouped into snapshots, one per simulation period.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

/// A single option quote at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Contract identifier (e.g. OCC symbol).
    pub contract: String,

    /// Underlying symbol (e.g. "SPX").
    pub underlying: String,

    /// Last underlying price at quote time.
    pub underlying_price: Decimal,

    /// Date of the quote.
    pub quote_date: NaiveDate,

    /// Option expiration date.
    pub expiration: NaiveDate,

    /// Option type (call or put).
    pub option_type: OptionType,

    /// Strike price.
    pub strike: Decimal,

    /// Bid price (per share).
    pub bid: Decimal,

    /// Ask price (per share).
    pub ask: Decimal,

    /// Trading volume.
    pub volume: i64,

    /// Open interest.
    pub open_interest: i64,
}

impl OptionQuote {
    /// Days to expiration as of the quote date.
    pub fn dte(&self) -> i64 {
        (self.expiration - self.quote_date).num_days()
    }
}

/// All quotes observed for one simulation period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsSnapshot {
    /// Period date (the quote date the snapshot was taken on).
    pub date: NaiveDate,

    /// Quotes in source order.
    pub quotes: Vec<OptionQuote>,
}

impl OptionsSnapshot {
    /// Create a snapshot for a period.
    pub fn new(date: NaiveDate, quotes: Vec<OptionQuote>) -> Self {
        Self { date, quotes }
    }

    /// Find the quote for a contract.
    pub fn quote(&self, contract: &str) -> Option<&OptionQuote> {
        self.quotes.iter().find(|q| q.contract == contract)
    }

    /// Iterate over quotes of one option type.
    pub fn of_type(&self, option_type: OptionType) -> impl Iterator<Item = &OptionQuote> {
        self.quotes
            .iter()
            .filter(move |q| q.option_type == option_type)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
