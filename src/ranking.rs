//! Ranks companies by how far their target price for one forecast year sits
//! above the market price.

use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    model::{CompanyRecord, Price, Ticker, Year},
    utils::round2,
};

pub trait ValuationMetric {
    fn kind(&self) -> MetricKind;
    fn score(&self, price: Price, target: Price) -> f64;
}

/// `(target − price) / price × 100`, rounded to 2 decimals.
pub fn undervaluation_pct(price: Price, target: Price) -> f64 {
    round2((target - price) / price * 100.0)
}

pub struct UndervaluationPct;

impl ValuationMetric for UndervaluationPct {
    fn kind(&self) -> MetricKind {
        MetricKind::UndervaluationPct
    }

    fn score(&self, price: Price, target: Price) -> f64 {
        undervaluation_pct(price, target)
    }
}

/// Absolute distance to the target in currency units.
pub struct Upside;

impl ValuationMetric for Upside {
    fn kind(&self) -> MetricKind {
        MetricKind::Upside
    }

    fn score(&self, price: Price, target: Price) -> f64 {
        round2(target - price)
    }
}

#[derive(
    Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    #[display(fmt = "undervaluation %")]
    UndervaluationPct,
    #[display(fmt = "upside")]
    Upside,
}

impl ValuationMetric for MetricKind {
    fn kind(&self) -> MetricKind {
        *self
    }

    fn score(&self, price: Price, target: Price) -> f64 {
        match self {
            MetricKind::UndervaluationPct => UndervaluationPct.score(price, target),
            MetricKind::Upside => Upside.score(price, target),
        }
    }
}

/// What a ranked view was computed for. A navigator cursor belongs to one
/// identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewIdentity {
    pub year: Year,
    pub metric: MetricKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry<'a> {
    pub company: &'a CompanyRecord,
    pub current_price: Price,
    pub target_price: Price,
    pub undervaluation_pct: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedView<'a> {
    identity: ViewIdentity,
    entries: Vec<RankedEntry<'a>>,
}

impl<'a> RankedView<'a> {
    pub fn identity(&self) -> ViewIdentity {
        self.identity
    }

    pub fn entries(&self) -> &[RankedEntry<'a>] {
        &self.entries
    }

    pub fn get(&self, position: usize) -> Option<&RankedEntry<'a>> {
        self.entries.get(position)
    }

    pub fn position(&self, ticker: &Ticker) -> Option<usize> {
        self.entries.iter().position(|e| &e.company.ticker == ticker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn rankable(company: &CompanyRecord, year: Year) -> Option<(Price, Price)> {
    let price = company
        .current_price
        .filter(|p| p.is_finite() && *p > 0.0)?;
    let target = company.target_price(year).filter(|t| t.is_finite())?;

    Some((price, target))
}

/// Ranks `companies` for `year`, best score first.
///
/// Companies without a positive price or a target for `year` are left out.
/// Equal scores keep their order in `companies`.
pub fn rank<'a, M>(companies: &'a [CompanyRecord], year: Year, metric: &M) -> RankedView<'a>
where
    M: ValuationMetric,
{
    let entries = companies
        .iter()
        .filter_map(|company| {
            let (current_price, target_price) = rankable(company, year)?;
            Some(RankedEntry {
                company,
                current_price,
                target_price,
                undervaluation_pct: undervaluation_pct(current_price, target_price),
                score: metric.score(current_price, target_price),
            })
        })
        .sorted_by(|a, b| b.score.total_cmp(&a.score))
        .collect_vec();

    info!(
        year,
        metric = %metric.kind(),
        ranked = entries.len(),
        excluded = companies.len() - entries.len(),
        "ranked companies"
    );

    RankedView {
        identity: ViewIdentity {
            year,
            metric: metric.kind(),
        },
        entries,
    }
}

/// Ranks by undervaluation percentage.
pub fn rank_by_valuation(companies: &[CompanyRecord], year: Year) -> RankedView<'_> {
    rank(companies, year, &UndervaluationPct)
}
