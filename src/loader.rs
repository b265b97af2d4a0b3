use std::{
    cell::RefCell,
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use eyre::{eyre, WrapErr};
use tracing::info;

use crate::model::{CompanyBook, CompanyRecord, MarketSnapshot, Ticker, Upsert};

/// Persistent company rows, keyed by ticker, in insertion order.
pub trait CompanyStore {
    fn load(&self) -> eyre::Result<CompanyBook>;

    /// Whole-row replace of the record's ticker, or append.
    fn save(&self, record: &CompanyRecord) -> eyre::Result<Upsert>;
}

/// Already-fetched market data per ticker.
pub trait MarketDataSource {
    fn snapshot(&self, ticker: &Ticker) -> eyre::Result<MarketSnapshot>;
}

/// All rows in one JSON array file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, book: &CompanyBook) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("json.tmp");
        let mut writer = BufWriter::new(File::create(&staging)?);
        serde_json::to_writer_pretty(&mut writer, book)?;
        writer.flush()?;
        fs::rename(&staging, &self.path)?;

        Ok(())
    }
}

impl CompanyStore for JsonFileStore {
    fn load(&self) -> eyre::Result<CompanyBook> {
        if !self.path.exists() {
            return Ok(CompanyBook::default());
        }

        let context = || format!("reading companies from {}", self.path.display());
        let reader = BufReader::new(File::open(&self.path).wrap_err_with(context)?);
        serde_json::from_reader(reader).wrap_err_with(context)
    }

    fn save(&self, record: &CompanyRecord) -> eyre::Result<Upsert> {
        let mut book = self.load()?;
        let upsert = book.upsert(record.clone());

        self.write(&book)
            .wrap_err_with(|| format!("writing companies to {}", self.path.display()))?;
        info!(ticker = %record.ticker, ?upsert, path = %self.path.display(), "company saved");

        Ok(upsert)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    book: RefCell<CompanyBook>,
}

impl CompanyStore for MemoryStore {
    fn load(&self) -> eyre::Result<CompanyBook> {
        Ok(self.book.borrow().clone())
    }

    fn save(&self, record: &CompanyRecord) -> eyre::Result<Upsert> {
        Ok(self.book.borrow_mut().upsert(record.clone()))
    }
}

/// Reads `<dir>/<TICKER>.json`.
pub struct JsonSnapshotSource {
    dir: PathBuf,
}

impl JsonSnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MarketDataSource for JsonSnapshotSource {
    fn snapshot(&self, ticker: &Ticker) -> eyre::Result<MarketSnapshot> {
        let path = self.dir.join(format!("{ticker}.json"));
        let reader = BufReader::new(
            File::open(&path).wrap_err_with(|| format!("no snapshot for {ticker}"))?,
        );
        let mut snapshot: MarketSnapshot = serde_json::from_reader(reader)
            .wrap_err_with(|| format!("parsing snapshot {}", path.display()))?;

        if snapshot.ticker.is_empty() {
            snapshot.ticker = ticker.clone();
        }

        Ok(snapshot)
    }
}

#[derive(Default)]
pub struct StaticSource {
    snapshots: HashMap<Ticker, MarketSnapshot>,
}

impl StaticSource {
    pub fn with_snapshot(mut self, snapshot: MarketSnapshot) -> Self {
        self.snapshots.insert(snapshot.ticker.clone(), snapshot);
        self
    }
}

impl MarketDataSource for StaticSource {
    fn snapshot(&self, ticker: &Ticker) -> eyre::Result<MarketSnapshot> {
        self.snapshots
            .get(ticker)
            .cloned()
            .ok_or_else(|| eyre!("no snapshot for {ticker}"))
    }
}
