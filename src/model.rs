use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::{AsRef, Deref, Display, Into};
use serde::{Deserialize, Serialize};

use crate::multiple::MultipleEstimate;

pub type Price = f64;

pub type Year = i32;

/// Placeholder for descriptive fields the data source did not provide.
pub const UNKNOWN: &str = "unknown";

fn unknown() -> String {
    UNKNOWN.to_owned()
}

/// Ticker symbol, trimmed and uppercased.
#[derive(
    Default, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Deref, AsRef, Into,
    Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// `None` when nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let ticker = Self::from(raw.to_owned());
        (!ticker.0.is_empty()).then_some(ticker)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Ticker {
    fn from(raw: String) -> Self {
        Self(raw.trim().to_uppercase())
    }
}

impl From<&str> for Ticker {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

/// Where a forecast year's growth rate came from.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthSource {
    #[display(fmt = "user")]
    User,
    /// Implied by a revenue figure the user entered for the year.
    #[display(fmt = "user revenue")]
    UserRevenue,
    #[display(fmt = "estimate")]
    Estimate,
    #[default]
    #[display(fmt = "default")]
    Default,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearForecast {
    pub year: Year,
    /// Fractional, 0.15 = 15%.
    pub growth: f64,
    pub growth_source: GrowthSource,
    /// Unrounded.
    pub projected_revenue: f64,
    /// 0 when not computable.
    pub target_price: Price,
    /// Target from the previous analysis of the same ticker, if any.
    #[serde(default)]
    pub previous_target_price: Option<Price>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub ticker: Ticker,
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(default = "unknown")]
    pub currency: String,
    #[serde(default = "unknown")]
    pub sector: String,
    #[serde(default)]
    pub current_price: Option<Price>,
    /// 0 means unavailable.
    #[serde(default)]
    pub shares_outstanding: f64,
    #[serde(default)]
    pub trailing_revenue: Option<f64>,
    #[serde(default)]
    pub trailing_eps: Option<f64>,
    #[serde(default)]
    pub multiples: MultipleEstimate,
    #[serde(default)]
    pub forecasts: Vec<YearForecast>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyRecord {
    pub fn new(ticker: Ticker, updated_at: DateTime<Utc>) -> Self {
        Self {
            ticker,
            name: unknown(),
            currency: unknown(),
            sector: unknown(),
            current_price: None,
            shares_outstanding: 0.0,
            trailing_revenue: None,
            trailing_eps: None,
            multiples: MultipleEstimate::default(),
            forecasts: Vec::new(),
            updated_at,
        }
    }

    pub fn forecast(&self, year: Year) -> Option<&YearForecast> {
        self.forecasts.iter().find(|f| f.year == year)
    }

    /// Target price for `year`; `None` when the year is not forecast or the
    /// target was not computable.
    pub fn target_price(&self, year: Year) -> Option<Price> {
        self.forecast(year)
            .map(|f| f.target_price)
            .filter(|target| *target > 0.0)
    }
}

/// One trailing quarter as delivered by the market-data source.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterSnapshot {
    pub period_end: NaiveDate,
    pub close: Price,
    /// Revenue of this quarter alone.
    #[serde(default)]
    pub revenue: Option<f64>,
    /// Trailing EPS as of this quarter.
    #[serde(default)]
    pub eps: Option<f64>,
}

/// Already-fetched market data for one ticker. Absent fields are `None`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: Ticker,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub current_price: Option<Price>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
    #[serde(default)]
    pub trailing_revenue: Option<f64>,
    #[serde(default)]
    pub trailing_eps: Option<f64>,
    /// Chronological, oldest first.
    #[serde(default)]
    pub quarters: Vec<QuarterSnapshot>,
    /// Analyst revenue estimates per fiscal year.
    #[serde(default)]
    pub revenue_estimates: BTreeMap<Year, f64>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Ticker-keyed company collection in insertion order.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CompanyRecord>", into = "Vec<CompanyRecord>")]
pub struct CompanyBook {
    records: Vec<CompanyRecord>,
}

impl CompanyBook {
    /// Replaces the row with the same ticker in place, or appends.
    pub fn upsert(&mut self, record: CompanyRecord) -> Upsert {
        match self.records.iter_mut().find(|r| r.ticker == record.ticker) {
            Some(existing) => {
                *existing = record;
                Upsert::Replaced
            }
            None => {
                self.records.push(record);
                Upsert::Inserted
            }
        }
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&CompanyRecord> {
        self.records.iter().find(|r| &r.ticker == ticker)
    }

    pub fn records(&self) -> &[CompanyRecord] {
        &self.records
    }

    pub fn tickers(&self) -> impl Iterator<Item = &Ticker> {
        self.records.iter().map(|r| &r.ticker)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<CompanyRecord>> for CompanyBook {
    fn from(records: Vec<CompanyRecord>) -> Self {
        let mut book = Self::default();
        for record in records {
            book.upsert(record);
        }
        book
    }
}

impl From<CompanyBook> for Vec<CompanyRecord> {
    fn from(book: CompanyBook) -> Self {
        book.records
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{CompanyBook, CompanyRecord, Ticker, Upsert, YearForecast};

    fn record(ticker: &str, name: &str) -> CompanyRecord {
        let mut record = CompanyRecord::new(
            Ticker::from(ticker),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 0).unwrap(),
        );
        record.name = name.to_owned();
        record
    }

    #[test]
    fn unittest_ticker_normalization() {
        assert_eq!(Ticker::from(" aapl ").as_str(), "AAPL");
        assert_eq!(Ticker::parse("msft").map(|t| t.to_string()), Some("MSFT".to_owned()));
        assert_eq!(Ticker::parse("   "), None);
    }

    #[test]
    fn unittest_upsert_replaces_in_place() {
        let mut book = CompanyBook::default();
        assert_eq!(book.upsert(record("a", "first")), Upsert::Inserted);
        assert_eq!(book.upsert(record("b", "second")), Upsert::Inserted);
        assert_eq!(book.upsert(record("A", "replaced")), Upsert::Replaced);

        assert_eq!(book.len(), 2);
        assert_eq!(book.records()[0].name, "replaced");
        assert_eq!(book.records()[1].ticker, Ticker::from("B"));
    }

    #[test]
    fn unittest_target_price_zero_is_missing() {
        let mut r = record("x", "x");
        r.forecasts.push(YearForecast {
            year: 2025,
            target_price: 0.0,
            ..Default::default()
        });
        r.forecasts.push(YearForecast {
            year: 2026,
            target_price: 12.5,
            ..Default::default()
        });

        assert_eq!(r.target_price(2025), None);
        assert_eq!(r.target_price(2026), Some(12.5));
        assert_eq!(r.target_price(2030), None);
    }

    #[test]
    fn unittest_book_deserialize_dedups() -> eyre::Result<()> {
        let json = serde_json::to_string(&vec![record("a", "1"), record("a", "2")])?;
        let book: CompanyBook = serde_json::from_str(&json)?;

        assert_eq!(book.len(), 1);
        assert_eq!(book.records()[0].name, "2");
        Ok(())
    }
}
