//! Run configuration loaded from TOML.
//!
//! ```toml
//! [backtest]
//! stop_if_broke = true
//! granularity = "daily"
//!
//! [strategy]
//! initial_capital = 100000
//! quantity = 1
//!
//! [[strategy.legs]]
//! name = "leg_1"
//! option_type = "put"
//! direction = "sell"
//!
//! [schema]
//! contract = "symbol"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::BacktestConfig;
use crate::data::Schema;
use crate::strategy::{LegStrategy, LegStrategyConfig};

/// Errors reading a run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything needed to run a backtest from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub backtest: BacktestConfig,

    pub strategy: LegStrategyConfig,

    /// Column names of the data file.
    #[serde(default)]
    pub schema: Schema,
}

impl RunConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Check the strategy definition is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let strategy = &self.strategy;

        if strategy.legs.is_empty() {
            return Err(ConfigError::Invalid("strategy has no legs".to_string()));
        }
        if strategy.quantity == 0 {
            return Err(ConfigError::Invalid("quantity must be positive".to_string()));
        }
        if strategy.initial_capital < Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "initial capital {} is negative",
                strategy.initial_capital
            )));
        }

        let mut names = HashSet::new();
        for leg in &strategy.legs {
            if !names.insert(leg.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate leg name '{}'", leg.name)));
            }
        }

        let thresholds = [
            strategy.exit_thresholds.profit_pct,
            strategy.exit_thresholds.loss_pct,
        ];
        if thresholds.into_iter().flatten().any(|pct| !pct.is_finite() || pct < 0.0) {
            return Err(ConfigError::Invalid(
                "exit thresholds must be non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Strategy bound to this configuration's schema.
    pub fn build_strategy(&self) -> LegStrategy {
        LegStrategy::new(self.schema.clone(), self.strategy.clone())
    }
}

impl std::str::FromStr for RunConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: RunConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
