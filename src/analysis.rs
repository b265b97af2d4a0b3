//! Per-company pipeline: multiple estimation, revenue projection and
//! target prices, producing one complete [`CompanyRecord`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::{izip, Itertools};
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    loader::MarketDataSource,
    model::{
        CompanyBook, CompanyRecord, GrowthSource, MarketSnapshot, Price, QuarterSnapshot, Ticker,
        Upsert, Year, YearForecast, UNKNOWN,
    },
    multiple::{estimate_multiple, MultipleObservation},
    projection::{implied_growth, project_revenue_with, resolve_growth, target_price},
    utils::trailing_twelve_months,
};

/// A required input the market data did not provide. The affected values
/// fall back to their zero sentinel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissingInput {
    #[error("current price is missing")]
    Price,
    #[error("shares outstanding is missing")]
    SharesOutstanding,
    #[error("trailing revenue is missing")]
    Revenue,
    #[error("trailing EPS is missing")]
    Eps,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid ticker {0:?}")]
    InvalidTicker(String),
}

/// A fully populated record and the inputs that had to be substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub record: CompanyRecord,
    pub missing: Vec<MissingInput>,
}

impl Analysis {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// User input for one analysis, per forecast year.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Assumptions {
    /// Fractional growth rates.
    pub growth: BTreeMap<Year, f64>,
    /// Revenue figures that replace the projection for their year.
    pub revenue: BTreeMap<Year, f64>,
}

impl Assumptions {
    pub fn with_growth(mut self, year: Year, rate: f64) -> Self {
        self.growth.insert(year, rate);
        self
    }

    pub fn with_revenue(mut self, year: Year, revenue: f64) -> Self {
        self.revenue.insert(year, revenue);
        self
    }

    /// The user input a stored record was analyzed with.
    pub fn from_record(record: &CompanyRecord) -> Self {
        record
            .forecasts
            .iter()
            .fold(Self::default(), |assumptions, forecast| match forecast.growth_source {
                GrowthSource::User => assumptions.with_growth(forecast.year, forecast.growth),
                GrowthSource::UserRevenue => {
                    assumptions.with_revenue(forecast.year, forecast.projected_revenue)
                }
                GrowthSource::Estimate | GrowthSource::Default => assumptions,
            })
    }
}

impl From<BTreeMap<Year, f64>> for Assumptions {
    fn from(growth: BTreeMap<Year, f64>) -> Self {
        Self {
            growth,
            ..Default::default()
        }
    }
}

/// Outcome of [`CompanyAnalyzer::refresh_all`].
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RefreshReport {
    pub updated: Vec<Ticker>,
    /// Tickers whose stored record was left as it was.
    pub skipped: Vec<Ticker>,
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// TTM revenue for the quarter at `end` (inclusive), when the four quarters
/// ending there all carry revenue.
fn ttm_at(quarters: &[QuarterSnapshot], end: usize) -> Option<f64> {
    let revenues: Vec<f64> = quarters[..=end]
        .iter()
        .rev()
        .take(4)
        .map_while(|q| q.revenue)
        .collect();

    trailing_twelve_months(&revenues)
}

pub struct CompanyAnalyzer {
    config: EngineConfig,
}

impl CompanyAnalyzer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the full pipeline for one snapshot.
    ///
    /// `growth` holds user-entered rates per year. `previous` is the last
    /// record stored for the same ticker; its targets become this record's
    /// previous targets.
    pub fn analyze(
        &self,
        snapshot: &MarketSnapshot,
        growth: &BTreeMap<Year, f64>,
        previous: Option<&CompanyRecord>,
        at: DateTime<Utc>,
    ) -> Result<Analysis, AnalysisError> {
        self.analyze_with(snapshot, &Assumptions::from(growth.clone()), previous, at)
    }

    /// [`analyze`](Self::analyze) with user-entered revenue figures as well.
    ///
    /// A year with a revenue figure uses it instead of the compounded one and
    /// records the growth it implies; later years compound from it. Figures
    /// that are negative or not finite are ignored.
    pub fn analyze_with(
        &self,
        snapshot: &MarketSnapshot,
        assumptions: &Assumptions,
        previous: Option<&CompanyRecord>,
        at: DateTime<Utc>,
    ) -> Result<Analysis, AnalysisError> {
        let ticker = Ticker::parse(snapshot.ticker.as_str())
            .ok_or_else(|| AnalysisError::InvalidTicker(snapshot.ticker.to_string()))?;
        let mut missing = Vec::new();

        let price = snapshot.current_price.filter(|p| p.is_finite() && *p >= 0.0);
        if price.is_none() {
            missing.push(MissingInput::Price);
        }

        let shares = positive(snapshot.shares_outstanding);
        if shares.is_none() {
            missing.push(MissingInput::SharesOutstanding);
        }

        let revenue = positive(snapshot.trailing_revenue).or_else(|| {
            snapshot
                .quarters
                .len()
                .checked_sub(1)
                .and_then(|last| positive(ttm_at(&snapshot.quarters, last)))
        });
        if revenue.is_none() {
            missing.push(MissingInput::Revenue);
        }

        let eps = snapshot.trailing_eps.filter(|e| e.is_finite());
        if self.config.include_pe && eps.is_none() {
            missing.push(MissingInput::Eps);
        }

        for gap in &missing {
            warn!(%ticker, "{gap}, using sentinel");
        }

        let multiples = estimate_multiple(
            &self.observations(snapshot, price, revenue, shares, eps),
            self.config.include_pe,
        );

        let base_revenue = revenue.unwrap_or_default();
        let shares_outstanding = shares.unwrap_or_default();
        let resolved = resolve_growth(
            &self.config.horizon,
            base_revenue,
            &assumptions.growth,
            &snapshot.revenue_estimates,
            self.config.default_growth,
        );

        for (year, revenue) in &assumptions.revenue {
            if !revenue.is_finite() || *revenue < 0.0 {
                warn!(%ticker, year, revenue, "ignoring revenue figure");
            }
        }
        let fixed = self
            .config
            .horizon
            .iter()
            .map(|year| {
                assumptions
                    .revenue
                    .get(year)
                    .copied()
                    .filter(|r| r.is_finite() && *r >= 0.0)
            })
            .collect_vec();

        let projected = project_revenue_with(
            base_revenue,
            &resolved.iter().map(|(rate, _)| *rate).collect_vec(),
            &fixed,
        );
        let prior = std::iter::once(base_revenue).chain(projected.iter().copied());
        let previous = previous.filter(|p| p.ticker == ticker);

        let forecasts = izip!(&self.config.horizon, resolved, fixed, prior, projected.iter().copied())
            .map(|(year, resolved, fixed, prior, projected_revenue)| {
                let (growth, growth_source) = match fixed {
                    Some(revenue) => (
                        implied_growth(prior, revenue).unwrap_or_default(),
                        GrowthSource::UserRevenue,
                    ),
                    None => resolved,
                };

                YearForecast {
                    year: *year,
                    growth,
                    growth_source,
                    projected_revenue,
                    target_price: target_price(
                        projected_revenue,
                        multiples.ps_average,
                        shares_outstanding,
                    ),
                    previous_target_price: previous
                        .and_then(|p| p.forecast(*year))
                        .map(|f| f.target_price),
                }
            })
            .collect_vec();

        debug!(
            %ticker,
            ps_average = multiples.ps_average,
            pe_average = multiples.pe_average,
            targets = %forecasts.iter().map(|f| format!("{}={}", f.year, f.target_price)).join(","),
            "analysis complete"
        );

        let descriptive = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN)
                .to_owned()
        };

        let record = CompanyRecord {
            name: descriptive(&snapshot.name),
            currency: descriptive(&snapshot.currency),
            sector: descriptive(&snapshot.sector),
            current_price: price,
            shares_outstanding,
            trailing_revenue: revenue,
            trailing_eps: eps,
            multiples,
            forecasts,
            ..CompanyRecord::new(ticker, at)
        };

        Ok(Analysis { record, missing })
    }

    /// Analyzes `snapshot` against the book's current row for the ticker and
    /// writes the result back as a whole-row replace.
    pub fn update(
        &self,
        book: &mut CompanyBook,
        snapshot: &MarketSnapshot,
        growth: &BTreeMap<Year, f64>,
        at: DateTime<Utc>,
    ) -> Result<(Analysis, Upsert), AnalysisError> {
        let analysis = self.analyze(snapshot, growth, book.get(&snapshot.ticker), at)?;
        let upsert = book.upsert(analysis.record.clone());

        Ok((analysis, upsert))
    }

    /// Re-analyzes every company in the book from fresh market data, keeping
    /// the growth rates and revenue figures each one was entered with.
    ///
    /// A ticker without a snapshot keeps its stored record and is reported
    /// as skipped.
    pub fn refresh_all(
        &self,
        book: &mut CompanyBook,
        source: &impl MarketDataSource,
        at: DateTime<Utc>,
    ) -> RefreshReport {
        let mut report = RefreshReport::default();

        for ticker in book.tickers().cloned().collect_vec() {
            let mut snapshot = match source.snapshot(&ticker) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(%ticker, error = %e, "no market data, keeping stored record");
                    report.skipped.push(ticker);
                    continue;
                }
            };
            snapshot.ticker = ticker.clone();

            let previous = book.get(&ticker);
            let assumptions = previous.map(Assumptions::from_record).unwrap_or_default();
            match self.analyze_with(&snapshot, &assumptions, previous, at) {
                Ok(analysis) => {
                    book.upsert(analysis.record);
                    report.updated.push(ticker);
                }
                Err(e) => {
                    warn!(%ticker, error = %e, "analysis failed, keeping stored record");
                    report.skipped.push(ticker);
                }
            }
        }

        info!(
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            "refresh complete"
        );
        report
    }

    /// The current observation followed by the trailing quarters inside the
    /// configured window.
    fn observations(
        &self,
        snapshot: &MarketSnapshot,
        price: Option<Price>,
        revenue: Option<f64>,
        shares: Option<f64>,
        eps: Option<f64>,
    ) -> Vec<MultipleObservation> {
        let shares = shares.unwrap_or_default();
        let current = MultipleObservation {
            price: price.unwrap_or_default(),
            revenue,
            shares,
            eps,
        };

        let quarters = &snapshot.quarters;
        let window_start = quarters.len().saturating_sub(self.config.quarter_window);
        let trailing = (window_start..quarters.len()).map(|ix| MultipleObservation {
            price: quarters[ix].close,
            revenue: ttm_at(quarters, ix).or(revenue),
            shares,
            eps: quarters[ix].eps,
        });

        std::iter::once(current).chain(trailing).collect()
    }
}
