use std::{fs, path::Path, path::PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use eyre::{eyre, WrapErr};
use itertools::Itertools;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stock_valuation::{
    config::AppConfig,
    loader::{CompanyStore, JsonFileStore, JsonSnapshotSource, MarketDataSource},
    model::{Ticker, Year},
    navigator::{BrowseSession, Navigator},
    rank,
    ranking::{RankedEntry, RankedView},
    suggestion::suggest_for_session,
    Assumptions, CompanyAnalyzer,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json", env = "STOCK_VALUATION_CONFIG")]
    config: PathBuf,

    /// Overrides the configured company store.
    #[arg(long)]
    store: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a ticker from its snapshot and save it.
    Update {
        ticker: String,
        /// Growth for one forecast year, e.g. `2026=0.15`. Repeatable.
        #[arg(long = "growth", value_parser = parse_year_value)]
        growth: Vec<(Year, f64)>,
        /// Revenue for one forecast year, replacing the projection, e.g.
        /// `2027=1250000000`. Repeatable.
        #[arg(long = "revenue", value_parser = parse_year_value)]
        revenue: Vec<(Year, f64)>,
    },
    /// Re-analyze every stored company from its snapshot, keeping the
    /// growth rates and revenues entered for it.
    UpdateAll,
    /// Print the ranked view.
    Rank {
        #[arg(long)]
        year: Option<Year>,
    },
    /// Move through the ranked view one company at a time.
    Browse {
        #[arg(value_enum, default_value_t = Step::Current)]
        step: Step,
        #[arg(long)]
        year: Option<Year>,
    },
    /// Suggest a purchase of the best-ranked company.
    Suggest {
        #[arg(long)]
        capital: f64,
        #[arg(long)]
        year: Option<Year>,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug)]
enum Step {
    Previous,
    Current,
    Next,
}

fn parse_year_value(raw: &str) -> Result<(Year, f64), String> {
    let (year, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected YEAR=VALUE, got {raw:?}"))?;
    let year = year.trim().parse().map_err(|e| format!("year: {e}"))?;
    let value: f64 = value.trim().parse().map_err(|e| format!("value: {e}"))?;
    if !value.is_finite() {
        return Err(format!("value must be a finite number, got {value}"));
    }

    Ok((year, value))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_session(path: &Path) -> eyre::Result<BrowseSession> {
    if !path.exists() {
        return Ok(BrowseSession::default());
    }

    let text = fs::read_to_string(path)?;
    match serde_json::from_str(&text) {
        Ok(session) => Ok(session),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "discarding unreadable session");
            Ok(BrowseSession::default())
        }
    }
}

fn save_session(path: &Path, session: &BrowseSession) -> eyre::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(session)?)
        .wrap_err_with(|| format!("writing session {}", path.display()))
}

fn print_entry(position: usize, total: usize, entry: &RankedEntry) {
    let company = entry.company;
    let currency = &company.currency;

    println!("[{}/{}] {} ({})", position + 1, total, company.name, company.ticker);
    println!("  current price: {:.2} {currency}", entry.current_price);
    println!("  P/S average:   {:.2}", company.multiples.ps_average);
    if company.multiples.pe_average > 0.0 {
        println!("  P/E average:   {:.2}", company.multiples.pe_average);
    }
    println!("  shares:        {}", company.shares_outstanding);
    for forecast in &company.forecasts {
        let previous = forecast
            .previous_target_price
            .map(|p| format!(" (was {p:.2})"))
            .unwrap_or_default();
        println!(
            "  {}: revenue {:.2}, growth {:.2}% ({}), target {:.2} {currency}{previous}",
            forecast.year,
            forecast.projected_revenue,
            forecast.growth * 100.0,
            forecast.growth_source,
            forecast.target_price,
        );
    }
    println!("  undervaluation: {:.2}%", entry.undervaluation_pct);
}

fn print_view(view: &RankedView) {
    let identity = view.identity();
    println!("ranked by {} for {}", identity.metric, identity.year);

    for (ix, entry) in view.entries().iter().enumerate() {
        println!(
            "{:>3}. {:<8} {:>10.2} -> {:>10.2}  {:>8.2}",
            ix + 1,
            entry.company.ticker,
            entry.current_price,
            entry.target_price,
            entry.score
        );
    }
}

fn ranking_year(config: &AppConfig, year: Option<Year>) -> eyre::Result<Year> {
    year.or_else(|| config.engine.first_year())
        .ok_or_else(|| eyre!("no forecast year configured"))
}

fn update(
    config: &AppConfig,
    store: &impl CompanyStore,
    ticker: &str,
    assumptions: Assumptions,
) -> eyre::Result<()> {
    let ticker = Ticker::parse(ticker).ok_or_else(|| eyre!("empty ticker"))?;
    let source = JsonSnapshotSource::new(&config.snapshot_dir);
    let snapshot = source.snapshot(&ticker)?;

    let book = store.load()?;
    let analyzer = CompanyAnalyzer::new(config.engine.clone());
    let analysis = analyzer.analyze_with(&snapshot, &assumptions, book.get(&ticker), Utc::now())?;

    if !analysis.is_complete() {
        println!(
            "{ticker}: substituted missing inputs: {}",
            analysis.missing.iter().join(", ")
        );
    }

    let upsert = store.save(&analysis.record)?;
    info!(%ticker, ?upsert, "updated");
    println!("{ticker} {upsert:?}");

    Ok(())
}

fn update_all(config: &AppConfig, store: &impl CompanyStore) -> eyre::Result<()> {
    let source = JsonSnapshotSource::new(&config.snapshot_dir);
    let analyzer = CompanyAnalyzer::new(config.engine.clone());

    let mut book = store.load()?;
    let report = analyzer.refresh_all(&mut book, &source, Utc::now());

    for ticker in &report.updated {
        if let Some(record) = book.get(ticker) {
            store.save(record)?;
        }
    }

    println!("updated: {}", report.updated.iter().join(", "));
    if !report.skipped.is_empty() {
        println!("skipped: {}", report.skipped.iter().join(", "));
    }

    Ok(())
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(store) = cli.store {
        config = config.with_store_path(store);
    }
    if let Some(level) = cli.log_level {
        config = config.with_log_level(level);
    }

    init_logging(&config.log_level);

    let store = JsonFileStore::new(&config.store_path);

    match cli.command {
        Command::Update {
            ticker,
            growth,
            revenue,
        } => {
            let assumptions = Assumptions {
                growth: growth.into_iter().collect(),
                revenue: revenue.into_iter().collect(),
            };
            update(&config, &store, &ticker, assumptions)?
        }
        Command::UpdateAll => update_all(&config, &store)?,
        Command::Rank { year } => {
            let book = store.load()?;
            let view = rank(book.records(), ranking_year(&config, year)?, &config.engine.metric);
            print_view(&view);
        }
        Command::Browse { step, year } => {
            let book = store.load()?;
            let view = rank(book.records(), ranking_year(&config, year)?, &config.engine.metric);
            let mut session = load_session(&config.session_path)?;

            let mut navigator = Navigator::attach(&mut session, &view);
            let entry = match step {
                Step::Previous => navigator.previous(),
                Step::Current => navigator.current(),
                Step::Next => navigator.next(),
            };
            match entry {
                Some(entry) => print_entry(navigator.position(), navigator.len(), entry),
                None => println!("no companies with complete valuation data"),
            }

            save_session(&config.session_path, &session)?;
        }
        Command::Suggest { capital, year } => {
            let book = store.load()?;
            let view = rank(book.records(), ranking_year(&config, year)?, &config.engine.metric);
            let mut session = load_session(&config.session_path)?;

            match suggest_for_session(&mut session, &view, capital) {
                Some(suggestion) => println!("{suggestion}"),
                None => println!("no companies with complete valuation data"),
            }

            save_session(&config.session_path, &session)?;
        }
    }

    Ok(())
}
