//! Column schema shared by data sources and strategies.
//!
//! A strategy is written against a schema and can only be run on data that
//! was loaded with the same one.

use serde::{Deserialize, Serialize};

/// Mapping from logical option fields to source column names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub contract: String,
    pub underlying: String,
    pub underlying_price: String,
    pub quote_date: String,
    pub expiration: String,
    pub option_type: String,
    pub strike: String,
    pub bid: String,
    pub ask: String,
    pub volume: String,
    pub open_interest: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            contract: "optionroot".to_string(),
            underlying: "underlying".to_string(),
            underlying_price: "underlying_last".to_string(),
            quote_date: "quotedate".to_string(),
            expiration: "expiration".to_string(),
            option_type: "type".to_string(),
            strike: "strike".to_string(),
            bid: "bid".to_string(),
            ask: "ask".to_string(),
            volume: "volume".to_string(),
            open_interest: "openinterest".to_string(),
        }
    }
}

impl Schema {
    /// Columns that must be present in a source file.
    pub fn required_columns(&self) -> [&str; 9] {
        [
            self.contract.as_str(),
            self.underlying.as_str(),
            self.underlying_price.as_str(),
            self.quote_date.as_str(),
            self.expiration.as_str(),
            self.option_type.as_str(),
            self.strike.as_str(),
            self.bid.as_str(),
            self.ask.as_str(),
        ]
    }

    /// Columns read when present, defaulting to zero otherwise.
    pub fn optional_columns(&self) -> [&str; 2] {
        [self.volume.as_str(), self.open_interest.as_str()]
    }
}
