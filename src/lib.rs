//! Price-to-sales valuation: multiples, revenue projection, target prices,
//! and a ranked, bounded browsing view over tracked companies.

pub mod analysis;
pub mod config;
pub mod loader;
pub mod model;
pub mod multiple;
pub mod navigator;
pub mod projection;
pub mod ranking;
pub mod suggestion;
pub mod utils;

pub use analysis::{Analysis, AnalysisError, Assumptions, CompanyAnalyzer, MissingInput, RefreshReport};
pub use model::{CompanyBook, CompanyRecord, MarketSnapshot, Price, Ticker, Year};
pub use multiple::estimate_multiple;
pub use navigator::{BrowseSession, Navigator};
pub use projection::{project_revenue, target_price};
pub use ranking::{rank, rank_by_valuation, MetricKind, RankedView};
