pub mod backtest;
pub mod config;
pub mod data;
pub mod metrics;
pub mod strategy;

// Re-export commonly used types
pub use backtest::{
    BacktestConfig, BacktestEngine, BacktestError, BacktestResult, Direction, Ledger, OrderRecord,
    OrderTag, TradeLog,
};
pub use config::{ConfigError, RunConfig};
pub use data::{
    DataLoader, DataSource, Granularity, HistoricalOptionsData, OptionQuote, OptionType,
    OptionsSnapshot, Schema,
};
pub use metrics::{MetricsCalculator, MonthlyReturns, Summary};
pub use strategy::{ExitSignals, LegStrategy, LegStrategyConfig, Strategy, StrategyLeg};
