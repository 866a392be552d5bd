//! Order records for backtesting.
//!
//! An order record is one executed entry or exit of a (possibly multi-leg)
//! position: a fill per leg plus an aggregate totals block.
//!
//! Costs follow the trader's perspective: paying is positive, receiving a
//! credit is negative.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionType;

/// Direction of a strategy leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Buy premium (long the option).
    Buy,
    /// Sell premium (short the option).
    Sell,
}

/// Order action of a leg fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderTag {
    #[serde(rename = "BTO")]
    BuyToOpen,
    #[serde(rename = "STO")]
    SellToOpen,
    #[serde(rename = "BTC")]
    BuyToClose,
    #[serde(rename = "STC")]
    SellToClose,
}

impl OrderTag {
    /// Tag for opening a leg in `direction`.
    pub fn opening(direction: Direction) -> Self {
        match direction {
            Direction::Buy => Self::BuyToOpen,
            Direction::Sell => Self::SellToOpen,
        }
    }

    /// Tag for closing a leg that was opened in `direction`.
    pub fn closing(direction: Direction) -> Self {
        match direction {
            Direction::Buy => Self::SellToClose,
            Direction::Sell => Self::BuyToClose,
        }
    }

    /// Whether this order opens a position.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::BuyToOpen | Self::SellToOpen)
    }

    /// Direction of the trade itself (a sell-to-close is a sell).
    pub fn direction(&self) -> Direction {
        match self {
            Self::BuyToOpen | Self::BuyToClose => Direction::Buy,
            Self::SellToOpen | Self::SellToClose => Direction::Sell,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyToOpen => "BTO",
            Self::SellToOpen => "STO",
            Self::BuyToClose => "BTC",
            Self::SellToClose => "STC",
        }
    }
}

impl fmt::Display for OrderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fill of a single leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegFill {
    /// Strategy leg name (e.g. "leg_1").
    pub name: String,
    /// Contract identifier.
    pub contract: String,
    /// Underlying symbol.
    pub underlying: String,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Option type.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: Decimal,
    /// Signed cost per contract.
    pub cost: Decimal,
    /// Order action.
    pub order: OrderTag,
}

/// Aggregate block of an order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of leg costs.
    pub cost: Decimal,
    /// Number of contracts.
    pub qty: u32,
    /// Execution date.
    pub date: NaiveDate,
}

/// One executed entry or exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub legs: Vec<LegFill>,
    pub totals: Totals,
}

impl OrderRecord {
    /// Build a record whose total cost is the sum of its leg costs.
    pub fn new(legs: Vec<LegFill>, qty: u32, date: NaiveDate) -> Self {
        let cost = legs.iter().map(|l| l.cost).sum();
        Self {
            legs,
            totals: Totals { cost, qty, date },
        }
    }

    /// Signed cash flow of the record: `cost × qty`.
    pub fn total_price(&self) -> Decimal {
        self.totals.cost * Decimal::from(self.totals.qty)
    }

    /// The first leg, whose order tag and contract identify the record.
    pub fn first_leg(&self) -> Option<&LegFill> {
        self.legs.first()
    }

    /// Contract of the first leg.
    pub fn contract(&self) -> Option<&str> {
        self.first_leg().map(|l| l.contract.as_str())
    }

    /// Whether the record opens a position, judged by the first leg.
    pub fn is_entry(&self) -> bool {
        self.first_leg().map(|l| l.order.is_open()).unwrap_or(false)
    }

    /// Find a leg fill by leg name.
    pub fn leg(&self, name: &str) -> Option<&LegFill> {
        self.legs.iter().find(|l| l.name == name)
    }

    pub fn date(&self) -> NaiveDate {
        self.totals.date
    }

    /// Whether any leg trades `contract`.
    pub fn holds_contract(&self, contract: &str) -> bool {
        self.legs.iter().any(|l| l.contract == contract)
    }
}
