//! Historical options data: quote types, column schema, data sources and loading.

pub mod loader;
pub mod schema;
pub mod source;
pub mod types;

pub use loader::{DataLoader, LoaderError};
pub use schema::Schema;
pub use source::{DataSource, Granularity, HistoricalOptionsData, Periods};
pub use types::{OptionQuote, OptionType, OptionsSnapshot};
