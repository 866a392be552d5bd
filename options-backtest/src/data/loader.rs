//! Data loader for historical options quotes stored as CSV.
//!
//! One row per option contract per quote date. Column names are resolved
//! through a [`Schema`], so files from different vendors can be loaded by
//! overriding the mapping.

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use super::schema::Schema;
use super::source::HistoricalOptionsData;
use super::types::{OptionQuote, OptionType};

/// Date formats accepted in date columns.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV data loader.
pub struct DataLoader {
    schema: Schema,
}

impl DataLoader {
    /// Create a loader that reads columns named by `schema`.
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Read a CSV file into a DataFrame.
    pub fn load_dataframe(&self, path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }

    /// Load a CSV file into an in-memory data source.
    pub fn load_csv(&self, path: &Path) -> Result<HistoricalOptionsData, LoaderError> {
        let df = self.load_dataframe(path)?;
        let (quotes, skipped) = self.dataframe_to_quotes(&df)?;

        if skipped > 0 {
            warn!("Skipped {} malformed rows in {}", skipped, path.display());
        }
        info!("Loaded {} quotes from {}", quotes.len(), path.display());

        if quotes.is_empty() {
            return Err(LoaderError::InvalidData(format!(
                "No usable quotes in {}",
                path.display()
            )));
        }

        Ok(HistoricalOptionsData::from_quotes(self.schema.clone(), quotes))
    }

    /// Convert DataFrame rows into quotes.
    ///
    /// Returns the parsed quotes and the number of rows skipped because a
    /// required field was null or unparseable.
    pub fn dataframe_to_quotes(
        &self,
        df: &DataFrame,
    ) -> Result<(Vec<OptionQuote>, usize), LoaderError> {
        for required in self.schema.required_columns() {
            if df.column(required).is_err() {
                return Err(LoaderError::MissingColumn(required.to_string()));
            }
        }

        let s = &self.schema;
        let contract_col = string_column(df, &s.contract)?;
        let underlying_col = string_column(df, &s.underlying)?;
        let quote_date_col = string_column(df, &s.quote_date)?;
        let expiration_col = string_column(df, &s.expiration)?;
        let type_col = string_column(df, &s.option_type)?;
        let underlying_price_col = float_column(df, &s.underlying_price)?;
        let strike_col = float_column(df, &s.strike)?;
        let bid_col = float_column(df, &s.bid)?;
        let ask_col = float_column(df, &s.ask)?;
        let [volume_name, oi_name] = s.optional_columns();
        let volume_col = optional_int_column(df, volume_name)?;
        let oi_col = optional_int_column(df, oi_name)?;

        let contracts = contract_col.str()?;
        let underlyings = underlying_col.str()?;
        let quote_dates = quote_date_col.str()?;
        let expirations = expiration_col.str()?;
        let types = type_col.str()?;
        let underlying_prices = underlying_price_col.f64()?;
        let strikes = strike_col.f64()?;
        let bids = bid_col.f64()?;
        let asks = ask_col.f64()?;
        let volumes = volume_col.as_ref().map(|c| c.i64()).transpose()?;
        let open_interests = oi_col.as_ref().map(|c| c.i64()).transpose()?;

        let mut quotes = Vec::with_capacity(df.height());
        let mut skipped = 0;

        for idx in 0..df.height() {
            let row = (|| {
                Some(OptionQuote {
                    contract: contracts.get(idx)?.trim().to_string(),
                    underlying: underlyings.get(idx)?.trim().to_string(),
                    underlying_price: to_decimal(underlying_prices.get(idx))?,
                    quote_date: parse_date(quote_dates.get(idx)?)?,
                    expiration: parse_date(expirations.get(idx)?)?,
                    option_type: OptionType::parse(types.get(idx)?)?,
                    strike: to_decimal(strikes.get(idx))?,
                    bid: to_decimal(bids.get(idx))?,
                    ask: to_decimal(asks.get(idx))?,
                    volume: volumes.and_then(|c| c.get(idx)).unwrap_or(0),
                    open_interest: open_interests.and_then(|c| c.get(idx)).unwrap_or(0),
                })
            })();

            match row {
                Some(quote) => quotes.push(quote),
                None => skipped += 1,
            }
        }

        Ok((quotes, skipped))
    }
}

fn string_column(df: &DataFrame, name: &str) -> Result<Column, LoaderError> {
    Ok(df.column(name)?.cast(&DataType::String)?)
}

fn float_column(df: &DataFrame, name: &str) -> Result<Column, LoaderError> {
    Ok(df.column(name)?.cast(&DataType::Float64)?)
}

fn optional_int_column(df: &DataFrame, name: &str) -> Result<Option<Column>, LoaderError> {
    match df.column(name) {
        Ok(col) => Ok(Some(col.cast(&DataType::Int64)?)),
        Err(_) => Ok(None),
    }
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value
        .filter(|v| v.is_finite())
        .and_then(Decimal::from_f64)
        .map(|d| d.normalize())
}

/// Parse a date column value, tolerating a trailing time component.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split([' ', 'T']).next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}
