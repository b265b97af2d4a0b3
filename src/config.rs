use std::{fs, path::Path, path::PathBuf};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use crate::{model::Year, ranking::MetricKind};

/// Parameters of the valuation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Forecast years, chronological.
    pub horizon: Vec<Year>,
    /// Growth used when neither the user nor analyst estimates give one.
    pub default_growth: f64,
    /// Trailing quarters that contribute to the average multiple.
    pub quarter_window: usize,
    pub include_pe: bool,
    pub metric: MetricKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon: vec![2025, 2026, 2027],
            default_growth: 0.15,
            quarter_window: 4,
            include_pe: true,
            metric: MetricKind::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_horizon(mut self, value: Vec<Year>) -> Self {
        self.horizon = value;
        self
    }

    pub fn with_default_growth(mut self, value: f64) -> Self {
        self.default_growth = value;
        self
    }

    pub fn with_quarter_window(mut self, value: usize) -> Self {
        self.quarter_window = value;
        self
    }

    pub fn with_include_pe(mut self, value: bool) -> Self {
        self.include_pe = value;
        self
    }

    pub fn with_metric(mut self, value: MetricKind) -> Self {
        self.metric = value;
        self
    }

    /// First horizon year, the default ranking year.
    pub fn first_year(&self) -> Option<Year> {
        self.horizon.first().copied()
    }
}

/// Settings of the command line driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store_path: PathBuf,
    /// Directory of `<TICKER>.json` market snapshots.
    pub snapshot_dir: PathBuf,
    pub session_path: PathBuf,
    pub log_level: String,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./data/companies.json"),
            snapshot_dir: PathBuf::from("./data/snapshots"),
            session_path: PathBuf::from("./data/session.json"),
            log_level: "info".to_owned(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).wrap_err_with(|| format!("parsing config {}", path.display()))
    }

    pub fn with_store_path(mut self, value: impl Into<PathBuf>) -> Self {
        self.store_path = value.into();
        self
    }

    pub fn with_log_level(mut self, value: impl Into<String>) -> Self {
        self.log_level = value.into();
        self
    }
}
