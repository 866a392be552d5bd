//! Configurable multi-leg strategy.
//!
//! Entries pair the eligible quotes of every leg positionally, after
//! ordering each leg's quotes by expiration, strike and contract, and never
//! use one contract for two legs of the same position. Exits
//! close a position when a leg's exit filter matches its current quote or
//! when the position's P&L crosses a threshold.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{Direction, LegFill, Ledger, OrderRecord, OrderTag};
use crate::data::{OptionQuote, OptionsSnapshot, Schema};

use super::{ExitSignals, Strategy, StrategyLeg};

/// Shares per option contract.
const CONTRACT_MULTIPLIER: Decimal = Decimal::ONE_HUNDRED;

/// Profit and loss exit levels, in percent of the entry cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitThresholds {
    /// Close once the position has gained this much.
    pub profit_pct: Option<f64>,
    /// Close once the position has lost this much.
    pub loss_pct: Option<f64>,
}

impl ExitThresholds {
    /// Whether `pnl_pct` crosses either level.
    pub fn triggered(&self, pnl_pct: f64) -> bool {
        self.profit_pct.map_or(false, |p| pnl_pct >= p)
            || self.loss_pct.map_or(false, |l| pnl_pct <= -l)
    }
}

fn default_quantity() -> u32 {
    1
}

/// Serializable definition of a leg strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegStrategyConfig {
    /// Capital the backtest starts with.
    pub initial_capital: Decimal,

    /// Contracts per order.
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Ordered legs.
    pub legs: Vec<StrategyLeg>,

    #[serde(default)]
    pub exit_thresholds: ExitThresholds,
}

/// A strategy built from leg definitions.
///
/// The only entry restriction besides the leg filters is that a contract is
/// not currently held. A contract closed in one period can be reopened in the
/// next, and round trip matching only pairs its first entry with its first
/// exit, so later round trips on the same contract drop out of the matched
/// statistics while their exits still count as trades.
#[derive(Debug, Clone)]
pub struct LegStrategy {
    schema: Schema,
    config: LegStrategyConfig,
}

impl LegStrategy {
    pub fn new(schema: Schema, config: LegStrategyConfig) -> Self {
        Self { schema, config }
    }

    pub fn config(&self) -> &LegStrategyConfig {
        &self.config
    }

    /// Eligible quotes of one leg, in selection order.
    fn leg_candidates<'a>(
        &self,
        leg: &StrategyLeg,
        snapshot: &'a OptionsSnapshot,
        ledger: &Ledger,
    ) -> Vec<&'a OptionQuote> {
        let mut quotes: Vec<&OptionQuote> = snapshot
            .of_type(leg.option_type)
            .filter(|q| leg.entry_filter.matches(q))
            .filter(|q| !ledger.holds_contract(&q.contract))
            .collect();
        quotes.sort_by(|a, b| {
            a.expiration
                .cmp(&b.expiration)
                .then(a.strike.cmp(&b.strike))
                .then_with(|| a.contract.cmp(&b.contract))
        });
        quotes
    }

    /// Whether a leg's exit filter selects its current quote.
    fn exit_filter_matches(&self, leg_name: &str, quote: &OptionQuote) -> bool {
        self.config
            .legs
            .iter()
            .find(|l| l.name == leg_name)
            .and_then(|l| l.exit_filter.as_ref())
            .map_or(false, |f| f.matches(quote))
    }

    /// Closing fills for a position, if every leg is quoted.
    fn closing_fills(
        &self,
        position: &OrderRecord,
        snapshot: &OptionsSnapshot,
    ) -> Option<(Vec<LegFill>, bool)> {
        let mut fills = Vec::with_capacity(position.legs.len());
        let mut filter_hit = false;

        for leg in &position.legs {
            let quote = snapshot.quote(&leg.contract)?;
            let opened = leg.order.direction();
            filter_hit |= self.exit_filter_matches(&leg.name, quote);
            fills.push(LegFill {
                name: leg.name.clone(),
                contract: leg.contract.clone(),
                underlying: leg.underlying.clone(),
                expiration: leg.expiration,
                option_type: leg.option_type,
                strike: leg.strike,
                cost: closing_cost(opened, quote),
                order: OrderTag::closing(opened),
            });
        }

        Some((fills, filter_hit))
    }
}

/// Per-contract cost of opening a leg: buy at the ask, sell at the bid.
pub fn opening_cost(direction: Direction, quote: &OptionQuote) -> Decimal {
    match direction {
        Direction::Buy => quote.ask * CONTRACT_MULTIPLIER,
        Direction::Sell => -(quote.bid * CONTRACT_MULTIPLIER),
    }
}

/// Per-contract cost of closing a leg opened in `opened`.
pub fn closing_cost(opened: Direction, quote: &OptionQuote) -> Decimal {
    match opened {
        Direction::Buy => -(quote.bid * CONTRACT_MULTIPLIER),
        Direction::Sell => quote.ask * CONTRACT_MULTIPLIER,
    }
}

/// Position P&L in percent of the absolute entry cost.
///
/// Returns `None` for a zero-cost entry.
pub fn pnl_pct(entry_cost: Decimal, exit_cost: Decimal) -> Option<f64> {
    if entry_cost.is_zero() {
        return None;
    }
    let pnl = -(entry_cost + exit_cost) / entry_cost.abs() * Decimal::ONE_HUNDRED;
    f64::try_from(pnl).ok()
}

impl Strategy for LegStrategy {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn legs(&self) -> &[StrategyLeg] {
        &self.config.legs
    }

    fn initial_capital(&self) -> Decimal {
        self.config.initial_capital
    }

    fn filter_entries(
        &self,
        snapshot: &OptionsSnapshot,
        ledger: &Ledger,
        date: NaiveDate,
    ) -> Vec<OrderRecord> {
        let per_leg: Vec<Vec<&OptionQuote>> = self
            .config
            .legs
            .iter()
            .map(|leg| self.leg_candidates(leg, snapshot, ledger))
            .collect();

        if per_leg.is_empty() {
            return Vec::new();
        }

        // Each leg walks its own candidates; a record never repeats a contract.
        let mut cursors = vec![0; per_leg.len()];
        let mut records = Vec::new();
        'records: loop {
            let mut fills: Vec<LegFill> = Vec::with_capacity(per_leg.len());
            for ((leg, quotes), cursor) in self.config.legs.iter().zip(&per_leg).zip(&mut cursors) {
                let quote = loop {
                    let Some(&quote) = quotes.get(*cursor) else {
                        break 'records;
                    };
                    *cursor += 1;
                    if !fills.iter().any(|f| f.contract == quote.contract) {
                        break quote;
                    }
                };
                fills.push(LegFill {
                    name: leg.name.clone(),
                    contract: quote.contract.clone(),
                    underlying: quote.underlying.clone(),
                    expiration: quote.expiration,
                    option_type: quote.option_type,
                    strike: quote.strike,
                    cost: opening_cost(leg.direction, quote),
                    order: OrderTag::opening(leg.direction),
                });
            }
            records.push(OrderRecord::new(fills, self.config.quantity, date));
        }
        records
    }

    fn filter_exits(
        &self,
        snapshot: &OptionsSnapshot,
        ledger: &Ledger,
        date: NaiveDate,
    ) -> ExitSignals {
        let mut signals = ExitSignals::none(ledger.len());

        for (row, position) in ledger.iter().enumerate() {
            let Some((fills, filter_hit)) = self.closing_fills(position, snapshot) else {
                continue;
            };

            let exit = OrderRecord::new(fills, position.totals.qty, date);
            let threshold_hit = pnl_pct(position.totals.cost, exit.totals.cost)
                .map_or(false, |pct| self.config.exit_thresholds.triggered(pct));

            if filter_hit || threshold_hit {
                signals.mask[row] = true;
                signals.total_costs.push(exit.total_price());
                signals.orders.push(exit);
            }
        }

        signals
    }
}
