//! Historical data sources and their period iterators.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::schema::Schema;
use super::types::{OptionQuote, OptionsSnapshot};

/// Simulation step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One period per quote date.
    #[default]
    Daily,
    /// One period per calendar month.
    Monthly,
}

/// Chronological sequence of period snapshots.
///
/// `ngroups` is known up front so callers can size progress bars.
pub struct Periods<'a> {
    groups: Box<dyn Iterator<Item = OptionsSnapshot> + 'a>,
    ngroups: usize,
}

impl<'a> Periods<'a> {
    pub fn new<I>(groups: I) -> Self
    where
        I: ExactSizeIterator<Item = OptionsSnapshot> + 'a,
    {
        let ngroups = groups.len();
        Self {
            groups: Box::new(groups),
            ngroups,
        }
    }

    /// Total number of periods.
    pub fn ngroups(&self) -> usize {
        self.ngroups
    }
}

impl Iterator for Periods<'_> {
    type Item = OptionsSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        self.groups.next()
    }
}

/// A source of historical options snapshots.
pub trait DataSource {
    /// Schema the data was loaded with.
    fn schema(&self) -> &Schema;

    /// One snapshot per quote date, in increasing date order.
    fn iter_dates(&self) -> Periods<'_>;

    /// One snapshot per calendar month, in increasing order.
    fn iter_months(&self) -> Periods<'_>;

    /// Periods for a granularity.
    fn periods(&self, granularity: Granularity) -> Periods<'_> {
        match granularity {
            Granularity::Daily => self.iter_dates(),
            Granularity::Monthly => self.iter_months(),
        }
    }
}

/// In-memory options history grouped by quote date.
#[derive(Debug, Clone, Default)]
pub struct HistoricalOptionsData {
    schema: Schema,
    by_date: BTreeMap<NaiveDate, Vec<OptionQuote>>,
}

impl HistoricalOptionsData {
    /// Group quotes by quote date, keeping source order within a date.
    pub fn from_quotes(schema: Schema, quotes: impl IntoIterator<Item = OptionQuote>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<OptionQuote>> = BTreeMap::new();
        for quote in quotes {
            by_date.entry(quote.quote_date).or_default().push(quote);
        }
        Self { schema, by_date }
    }

    /// All quote dates.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.by_date.keys().copied().collect()
    }

    /// First quote date of every calendar month.
    pub fn month_starts(&self) -> Vec<NaiveDate> {
        let mut starts: Vec<NaiveDate> = Vec::new();
        for date in self.by_date.keys() {
            let same_month = starts
                .last()
                .map(|d| d.year() == date.year() && d.month() == date.month())
                .unwrap_or(false);
            if !same_month {
                starts.push(*date);
            }
        }
        starts
    }

    /// Total number of quotes.
    pub fn total_quotes(&self) -> usize {
        self.by_date.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    fn snapshot(&self, date: NaiveDate) -> OptionsSnapshot {
        let quotes = self.by_date.get(&date).cloned().unwrap_or_default();
        OptionsSnapshot::new(date, quotes)
    }
}

impl DataSource for HistoricalOptionsData {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn iter_dates(&self) -> Periods<'_> {
        Periods::new(
            self.by_date
                .iter()
                .map(|(date, quotes)| OptionsSnapshot::new(*date, quotes.clone())),
        )
    }

    fn iter_months(&self) -> Periods<'_> {
        Periods::new(
            self.month_starts()
                .into_iter()
                .map(move |date| self.snapshot(date)),
        )
    }
}
