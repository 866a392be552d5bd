//! Core backtesting engine.
//!
//! Runs the simulation loop, one period at a time in chronological order:
//! 1. Take the period's market snapshot from the data source
//! 2. Ask the strategy for exit and entry candidates against the ledger
//! 3. Execute exits (log, close ledger rows, settle capital)
//! 4. Execute at most the first entry candidate, gated on capital
//!
//! Exits settle before entries, so an entry sees the capital left after the
//! same period's exits.

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{DataSource, Granularity};
use crate::metrics::{MetricsCalculator, MonthlyReturns, Summary};
use crate::strategy::Strategy;

use super::ledger::Ledger;
use super::state::{EntryOutcome, SimulationState};
use super::trade_log::TradeLog;

/// Configuration errors detected before the first period.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BacktestError {
    #[error("No strategy configured")]
    MissingStrategy,

    #[error("No data source configured")]
    MissingData,

    #[error("Strategy schema does not match data source schema")]
    SchemaMismatch,
}

/// Configuration for backtest execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Skip entries whose total price exceeds available capital.
    #[serde(default = "default_true")]
    pub stop_if_broke: bool,

    /// Period size used by the CLI.
    #[serde(default)]
    pub granularity: Granularity,

    /// Draw a progress bar while running.
    #[serde(default)]
    pub show_progress: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            stop_if_broke: true,
            granularity: Granularity::Daily,
            show_progress: false,
        }
    }
}

/// Result of a completed backtest.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Capital at the start of the run.
    pub initial_capital: Decimal,

    /// Capital after the last period.
    pub final_capital: Decimal,

    /// Every executed order, in execution order.
    pub trade_log: TradeLog,

    /// Positions still open at the end.
    pub open_positions: Ledger,

    /// Granularity the run used.
    pub granularity: Granularity,

    /// Number of periods visited.
    pub periods: usize,

    /// First and last period dates.
    pub date_range: Option<(NaiveDate, NaiveDate)>,

    /// Entries skipped for lack of capital.
    pub skipped_entries: usize,
}

impl BacktestResult {
    /// Summary statistics of the trade log.
    pub fn summary(&self) -> Summary {
        MetricsCalculator::summary(&self.trade_log, self.initial_capital)
    }

    /// Monthly returns table of the trade log.
    pub fn monthly_returns(&self) -> MonthlyReturns {
        MetricsCalculator::monthly_returns(&self.trade_log, self.initial_capital)
    }
}

/// The main backtesting engine.
pub struct BacktestEngine {
    config: BacktestConfig,
    strategy: Option<Box<dyn Strategy>>,
    data: Option<Box<dyn DataSource>>,
}

impl BacktestEngine {
    /// Create an engine with no strategy or data attached.
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            strategy: None,
            data: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.set_strategy(strategy);
        self
    }

    pub fn with_data(mut self, data: impl DataSource + 'static) -> Self {
        self.set_data(data);
        self
    }

    pub fn set_strategy(&mut self, strategy: impl Strategy + 'static) {
        self.strategy = Some(Box::new(strategy));
    }

    pub fn set_data(&mut self, data: impl DataSource + 'static) {
        self.data = Some(Box::new(data));
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the backtest over every period of the data source.
    pub fn run(&self, granularity: Granularity) -> Result<BacktestResult, BacktestError> {
        let strategy = self.strategy.as_deref().ok_or(BacktestError::MissingStrategy)?;
        let data = self.data.as_deref().ok_or(BacktestError::MissingData)?;

        if strategy.schema() != data.schema() {
            return Err(BacktestError::SchemaMismatch);
        }

        let initial_capital = strategy.initial_capital();
        let periods = data.periods(granularity);
        let ngroups = periods.ngroups();

        info!(
            "Running backtest over {} {:?} periods with capital {}",
            ngroups, granularity, initial_capital
        );

        let progress = self.progress_bar(ngroups);
        let mut state = SimulationState::new(initial_capital);
        let mut visited = 0;
        let mut skipped_entries = 0;
        let mut first_date = None;
        let mut last_date = None;

        for snapshot in periods {
            let date = snapshot.date;
            first_date.get_or_insert(date);
            last_date = Some(date);

            let entries = strategy.filter_entries(&snapshot, state.ledger(), date);
            let exits = strategy.filter_exits(&snapshot, state.ledger(), date);

            let logged = exits.orders.len();
            let closed = state.execute_exits(exits);
            if logged > 0 || closed > 0 {
                debug!(%date, logged, closed, capital = %state.capital(), "Executed exits");
            }

            match state.execute_entry(entries, self.config.stop_if_broke) {
                EntryOutcome::Executed { price } => {
                    debug!(%date, %price, capital = %state.capital(), "Executed entry");
                }
                EntryOutcome::InsufficientCapital { price, capital } => {
                    skipped_entries += 1;
                    debug!(%date, %price, %capital, "Skipped entry, insufficient capital");
                }
                EntryOutcome::NoCandidates => {}
            }

            visited += 1;
            progress.inc(1);
        }

        progress.finish_and_clear();

        let (open_positions, trade_log, final_capital) = state.into_parts();

        info!(
            "Backtest finished: {} orders, {} open positions, final capital {}",
            trade_log.len(),
            open_positions.len(),
            final_capital
        );

        Ok(BacktestResult {
            initial_capital,
            final_capital,
            trade_log,
            open_positions,
            granularity,
            periods: visited,
            date_range: first_date.zip(last_date),
            skipped_entries,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::backtest::trade::{Direction, LegFill, OrderRecord, OrderTag};
    use crate::data::{HistoricalOptionsData, OptionQuote, OptionType, OptionsSnapshot, Schema};
    use crate::strategy::{ExitSignals, StrategyLeg};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    fn record(
        contract: &str,
        cost: Decimal,
        qty: u32,
        tag: OrderTag,
        date: NaiveDate,
    ) -> OrderRecord {
        OrderRecord::new(
            vec![LegFill {
                name: "leg_1".to_string(),
                contract: contract.to_string(),
                underlying: "SPX".to_string(),
                expiration: NaiveDate::from_ymd_opt(2020, 6, 19).unwrap(),
                option_type: OptionType::Call,
                strike: dec!(3300),
                cost,
                order: tag,
            }],
            qty,
            date,
        )
    }

    fn data(dates: &[NaiveDate]) -> HistoricalOptionsData {
        let quotes = dates.iter().map(|&date| OptionQuote {
            contract: "SPX200619C03300000".to_string(),
            underlying: "SPX".to_string(),
            underlying_price: dec!(3250),
            quote_date: date,
            expiration: NaiveDate::from_ymd_opt(2020, 6, 19).unwrap(),
            option_type: OptionType::Call,
            strike: dec!(3300),
            bid: dec!(1),
            ask: dec!(1),
            volume: 0,
            open_interest: 0,
        });
        HistoricalOptionsData::from_quotes(Schema::default(), quotes)
    }

    /// Replays predetermined entries and exits by date.
    struct ScriptedStrategy {
        schema: Schema,
        legs: Vec<StrategyLeg>,
        initial_capital: Decimal,
        entries: HashMap<NaiveDate, Vec<OrderRecord>>,
        exits: HashMap<NaiveDate, Vec<OrderRecord>>,
        /// Closes signalled through the mask and costs only.
        unlogged_exits: HashMap<NaiveDate, Vec<(String, Decimal)>>,
    }

    impl ScriptedStrategy {
        fn new(initial_capital: Decimal) -> Self {
            Self {
                schema: Schema::default(),
                legs: vec![StrategyLeg::new("leg_1", OptionType::Call, Direction::Buy)],
                initial_capital,
                entries: HashMap::new(),
                exits: HashMap::new(),
                unlogged_exits: HashMap::new(),
            }
        }

        fn entry(mut self, date: NaiveDate, record: OrderRecord) -> Self {
            self.entries.entry(date).or_default().push(record);
            self
        }

        /// Close the open position on the exit's contract.
        fn exit(mut self, date: NaiveDate, record: OrderRecord) -> Self {
            self.exits.entry(date).or_default().push(record);
            self
        }

        fn unlogged_exit(mut self, date: NaiveDate, contract: &str, total_cost: Decimal) -> Self {
            self.unlogged_exits
                .entry(date)
                .or_default()
                .push((contract.to_string(), total_cost));
            self
        }
    }

    impl Strategy for ScriptedStrategy {
        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn legs(&self) -> &[StrategyLeg] {
            &self.legs
        }

        fn initial_capital(&self) -> Decimal {
            self.initial_capital
        }

        fn filter_entries(
            &self,
            _snapshot: &OptionsSnapshot,
            _ledger: &Ledger,
            date: NaiveDate,
        ) -> Vec<OrderRecord> {
            self.entries.get(&date).cloned().unwrap_or_default()
        }

        fn filter_exits(
            &self,
            _snapshot: &OptionsSnapshot,
            ledger: &Ledger,
            date: NaiveDate,
        ) -> ExitSignals {
            let mut signals = ExitSignals::none(ledger.len());
            for exit in self.exits.get(&date).into_iter().flatten() {
                let row = ledger
                    .iter()
                    .position(|p| p.contract() == exit.contract());
                if let Some(row) = row {
                    signals.mask[row] = true;
                    signals.total_costs.push(exit.total_price());
                    signals.orders.push(exit.clone());
                }
            }
            for (contract, total_cost) in self.unlogged_exits.get(&date).into_iter().flatten() {
                let row = ledger
                    .iter()
                    .position(|p| p.contract() == Some(contract.as_str()));
                if let Some(row) = row {
                    signals.mask[row] = true;
                    signals.total_costs.push(*total_cost);
                }
            }
            signals
        }
    }

    fn engine(
        strategy: ScriptedStrategy,
        dates: &[NaiveDate],
        stop_if_broke: bool,
    ) -> BacktestEngine {
        BacktestEngine::new(BacktestConfig {
            stop_if_broke,
            ..Default::default()
        })
        .with_strategy(strategy)
        .with_data(data(dates))
    }

    #[test]
    fn test_default_config() {
        let config = BacktestConfig::default();
        assert!(config.stop_if_broke);
        assert_eq!(config.granularity, Granularity::Daily);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: BacktestConfig = toml::from_str("granularity = \"monthly\"").unwrap();
        assert!(config.stop_if_broke);
        assert_eq!(config.granularity, Granularity::Monthly);
    }

    #[test]
    fn test_missing_collaborators() {
        let no_strategy = BacktestEngine::new(BacktestConfig::default()).with_data(data(&[day(2)]));
        assert_eq!(
            no_strategy.run(Granularity::Daily).unwrap_err(),
            BacktestError::MissingStrategy
        );

        let no_data = BacktestEngine::new(BacktestConfig::default())
            .with_strategy(ScriptedStrategy::new(dec!(1000)));
        assert_eq!(
            no_data.run(Granularity::Daily).unwrap_err(),
            BacktestError::MissingData
        );
    }

    #[test]
    fn test_schema_mismatch() {
        let mut strategy = ScriptedStrategy::new(dec!(1000));
        strategy.schema = Schema {
            contract: "symbol".to_string(),
            ..Schema::default()
        };

        let err = engine(strategy, &[day(2)], true)
            .run(Granularity::Daily)
            .unwrap_err();
        assert_eq!(err, BacktestError::SchemaMismatch);
    }

    #[test]
    fn test_round_trip_scenario() {
        let strategy = ScriptedStrategy::new(dec!(1000))
            .entry(day(1), record("C1", dec!(100), 1, OrderTag::BuyToOpen, day(1)))
            .exit(day(3), record("C1", dec!(-150), 1, OrderTag::SellToClose, day(3)));

        let result = engine(strategy, &[day(1), day(2), day(3)], false)
            .run(Granularity::Daily)
            .unwrap();

        assert_eq!(result.trade_log.len(), 2);
        assert_eq!(result.final_capital, dec!(1050));
        assert!(result.open_positions.is_empty());
        assert_eq!(result.periods, 3);
        assert_eq!(result.date_range, Some((day(1), day(3))));

        let capital = MetricsCalculator::capital_series(&result.trade_log, result.initial_capital);
        assert_eq!(capital, vec![dec!(900), dec!(1050)]);

        let summary = result.summary();
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 0);
    }

    #[test]
    fn test_insufficient_capital_scenario() {
        let strategy = ScriptedStrategy::new(dec!(50))
            .entry(day(1), record("C1", dec!(100), 1, OrderTag::BuyToOpen, day(1)));

        let result = engine(strategy, &[day(1)], true)
            .run(Granularity::Daily)
            .unwrap();

        assert!(result.trade_log.is_empty());
        assert!(result.open_positions.is_empty());
        assert_eq!(result.final_capital, dec!(50));
        assert_eq!(result.skipped_entries, 1);
    }

    #[test]
    fn test_gating_uses_quantity() {
        // cost 30 fits but 30 × 4 does not
        let strategy = ScriptedStrategy::new(dec!(100))
            .entry(day(1), record("C1", dec!(30), 4, OrderTag::BuyToOpen, day(1)));

        let result = engine(strategy, &[day(1)], true)
            .run(Granularity::Daily)
            .unwrap();
        assert!(result.trade_log.is_empty());
    }

    #[test]
    fn test_only_first_candidate_is_executed() {
        let strategy = ScriptedStrategy::new(dec!(1000))
            .entry(day(1), record("C1", dec!(10), 1, OrderTag::BuyToOpen, day(1)))
            .entry(day(1), record("C2", dec!(20), 1, OrderTag::BuyToOpen, day(1)))
            .entry(day(1), record("C3", dec!(30), 1, OrderTag::BuyToOpen, day(1)));

        let result = engine(strategy, &[day(1)], true)
            .run(Granularity::Daily)
            .unwrap();

        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.open_positions.positions()[0].contract(), Some("C1"));
        assert_eq!(result.trade_log.len(), 1);
        assert_eq!(result.final_capital, dec!(990));
    }

    #[test]
    fn test_first_candidate_is_not_replaced_when_unaffordable() {
        // The cheaper second candidate is never considered.
        let strategy = ScriptedStrategy::new(dec!(25))
            .entry(day(1), record("C1", dec!(30), 1, OrderTag::BuyToOpen, day(1)))
            .entry(day(1), record("C2", dec!(10), 1, OrderTag::BuyToOpen, day(1)));

        let result = engine(strategy, &[day(1)], true)
            .run(Granularity::Daily)
            .unwrap();
        assert!(result.trade_log.is_empty());
        assert_eq!(result.final_capital, dec!(25));
    }

    #[test]
    fn test_two_exits_in_one_period() {
        let strategy = ScriptedStrategy::new(dec!(1000))
            .entry(day(1), record("C1", dec!(100), 1, OrderTag::BuyToOpen, day(1)))
            .entry(day(2), record("C2", dec!(200), 1, OrderTag::BuyToOpen, day(2)))
            .exit(day(3), record("C1", dec!(-120), 1, OrderTag::SellToClose, day(3)))
            .exit(day(3), record("C2", dec!(-180), 1, OrderTag::SellToClose, day(3)));

        let result = engine(strategy, &[day(1), day(2), day(3)], true)
            .run(Granularity::Daily)
            .unwrap();

        assert_eq!(result.trade_log.len(), 4);
        assert_eq!(result.trade_log.exits().count(), 2);
        assert!(result
            .trade_log
            .exits()
            .all(|r| r.date() == day(3)));
        assert!(result.open_positions.is_empty());
        // 1000 - 100 - 200 + 120 + 180
        assert_eq!(result.final_capital, dec!(1000));
    }

    #[test]
    fn test_exits_settle_before_entries() {
        // Day 2 entry is only affordable with the day 2 exit's credit.
        let strategy = ScriptedStrategy::new(dec!(100))
            .entry(day(1), record("C1", dec!(100), 1, OrderTag::BuyToOpen, day(1)))
            .exit(day(2), record("C1", dec!(-110), 1, OrderTag::SellToClose, day(2)))
            .entry(day(2), record("C2", dec!(105), 1, OrderTag::BuyToOpen, day(2)));

        let result = engine(strategy, &[day(1), day(2)], true)
            .run(Granularity::Daily)
            .unwrap();

        assert_eq!(result.trade_log.len(), 3);
        assert_eq!(result.trade_log.records()[1].contract(), Some("C1"));
        assert!(!result.trade_log.records()[1].is_entry());
        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.final_capital, dec!(5));
    }

    #[test]
    fn test_mask_only_exits_are_applied() {
        let strategy = ScriptedStrategy::new(dec!(1000))
            .entry(day(1), record("C1", dec!(100), 1, OrderTag::BuyToOpen, day(1)))
            .unlogged_exit(day(2), "C1", dec!(-130));

        let result = engine(strategy, &[day(1), day(2)], true)
            .run(Granularity::Daily)
            .unwrap();

        assert!(result.open_positions.is_empty());
        assert_eq!(result.trade_log.len(), 1);
        assert_eq!(result.final_capital, dec!(1030));
    }

    #[test]
    fn test_capital_conservation() {
        let strategy = ScriptedStrategy::new(dec!(500))
            .entry(day(1), record("C1", dec!(-75), 2, OrderTag::SellToOpen, day(1)))
            .entry(day(2), record("C2", dec!(40), 3, OrderTag::BuyToOpen, day(2)))
            .exit(day(3), record("C1", dec!(30), 2, OrderTag::BuyToClose, day(3)))
            .entry(day(4), record("C3", dec!(1000), 1, OrderTag::BuyToOpen, day(4)));

        let result = engine(strategy, &[day(1), day(2), day(3), day(4)], true)
            .run(Granularity::Daily)
            .unwrap();

        assert_eq!(
            result.final_capital,
            result.initial_capital - result.trade_log.net_cash_flow()
        );
        assert_eq!(result.trade_log.len(), 3);
        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.skipped_entries, 1);
    }

    #[test]
    fn test_monthly_granularity_visits_month_starts() {
        let dates = [
            day(2),
            day(3),
            NaiveDate::from_ymd_opt(2020, 2, 3).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 4).unwrap(),
        ];
        let strategy = ScriptedStrategy::new(dec!(1000))
            .entry(day(3), record("C1", dec!(10), 1, OrderTag::BuyToOpen, day(3)));

        let result = engine(strategy, &dates, true)
            .run(Granularity::Monthly)
            .unwrap();

        assert_eq!(result.periods, 2);
        assert_eq!(result.granularity, Granularity::Monthly);
        // Jan 3 is not a period in monthly mode.
        assert!(result.trade_log.is_empty());
    }

    #[test]
    fn test_runs_are_independent() {
        let strategy = ScriptedStrategy::new(dec!(1000))
            .entry(day(1), record("C1", dec!(100), 1, OrderTag::BuyToOpen, day(1)));
        let engine = engine(strategy, &[day(1)], true);

        let first = engine.run(Granularity::Daily).unwrap();
        let second = engine.run(Granularity::Daily).unwrap();

        assert_eq!(first.final_capital, second.final_capital);
        assert_eq!(second.trade_log.len(), 1);
    }
}
