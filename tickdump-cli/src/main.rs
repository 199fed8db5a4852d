//! Tickdump CLI: download, inspect and aggregate commands.
//!
//! Commands:
//! - `download`: fetch one or more days of trades and quotes per symbol and
//!   write one compressed archive per (symbol, day)
//! - `inspect`: read an archive back and print what it holds
//! - `aggregate`: fold an archive's trades into one-second bars

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use tickdump_core::aggregate::{aggregate_seconds, write_csv, write_json};
use tickdump_core::data::read_archive;
use tickdump_core::domain::{is_chronological, EventKind};
use tickdump_runner::{
    DayDriver, DownloadConfig, DriverError, FetchFailurePolicy, LogProgress, SourceKind,
};

#[derive(Parser)]
#[command(
    name = "tickdump",
    version,
    about = "Tickdump: per-symbol trade and quote archives from the Polygon REST API"
)]
struct Cli {
    /// Log filter, e.g. `info` or `tickdump_runner=debug`. RUST_LOG wins when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download trading days and write one archive per symbol.
    Download {
        /// Path to a TOML config file. Without one, defaults plus flags are used.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Trading day (YYYY-MM-DD). Repeat for several; replaces the config's list.
        #[arg(long = "day")]
        days: Vec<String>,

        /// Comma-separated symbols. Skips the ticker listing.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Maximum symbols in flight at once.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Directory archives are written under.
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// `abort` or `skip-symbol`.
        #[arg(long)]
        on_fetch_failure: Option<FetchFailurePolicy>,

        /// Polygon API key.
        #[arg(long, env = "POLYGON_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Use the seeded offline generator instead of the REST API.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Read an archive and print its contents summary.
    Inspect {
        /// Archive file (`{symbol}-{day}.msgpack.lz4`).
        archive: PathBuf,
    },
    /// Fold an archive's trades into one-second bars.
    Aggregate {
        /// Archive file (`{symbol}-{day}.msgpack.lz4`).
        archive: PathBuf,

        #[arg(long, value_enum, default_value_t = BarFormat::Json)]
        format: BarFormat,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BarFormat {
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Download {
            config,
            days,
            symbols,
            concurrency,
            output_root,
            on_fetch_failure,
            api_key,
            synthetic,
            seed,
        } => {
            let overrides = DownloadOverrides {
                days,
                symbols,
                concurrency,
                output_root,
                on_fetch_failure,
                api_key,
                synthetic,
                seed,
            };
            run_download(config.as_deref(), overrides)
        }
        Commands::Inspect { archive } => run_inspect(&archive),
        Commands::Aggregate {
            archive,
            format,
            output,
        } => run_aggregate(&archive, format, output.as_deref()),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("bad --log-level '{level}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

struct DownloadOverrides {
    days: Vec<String>,
    symbols: Vec<String>,
    concurrency: Option<usize>,
    output_root: Option<PathBuf>,
    on_fetch_failure: Option<FetchFailurePolicy>,
    api_key: Option<String>,
    synthetic: bool,
    seed: Option<u64>,
}

impl DownloadOverrides {
    fn apply(self, config: &mut DownloadConfig) {
        if !self.days.is_empty() {
            config.download.days = self.days;
        }
        if !self.symbols.is_empty() {
            config.universe.symbols = self.symbols;
        }
        if let Some(c) = self.concurrency {
            config.download.concurrency = c;
        }
        if let Some(root) = self.output_root {
            config.download.output_root = root;
        }
        if let Some(policy) = self.on_fetch_failure {
            config.download.on_fetch_failure = policy;
        }
        // The config file's key is only a fallback for the flag / env var.
        if self.api_key.is_some() {
            config.api.api_key = self.api_key;
        }
        if self.synthetic {
            config.api.source = SourceKind::Synthetic;
        }
        if let Some(seed) = self.seed {
            config.api.seed = seed;
        }
    }
}

fn run_download(config_path: Option<&Path>, overrides: DownloadOverrides) -> Result<()> {
    let mut config = match config_path {
        Some(path) => DownloadConfig::from_file(path)?,
        None => DownloadConfig::default(),
    };
    overrides.apply(&mut config);
    if config.download.days.is_empty() {
        bail!("no trading days: pass --day YYYY-MM-DD or set [download].days");
    }

    let driver = DayDriver::from_config(&config)?;
    let errors = driver.errors();
    let result = driver.run(&LogProgress);

    println!("error count: {}", errors.count());
    match result {
        Ok(summary) => {
            for day in &summary.days {
                let manifest = day
                    .manifest
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "skipped".to_string());
                println!(
                    "{}: {} written, {} failed, {} skipped ({manifest})",
                    day.day, day.counts.succeeded, day.counts.failed, day.counts.skipped
                );
            }
            Ok(())
        }
        Err(err @ DriverError::Aborted { .. }) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

fn run_inspect(path: &Path) -> Result<()> {
    let archive = read_archive(path).with_context(|| format!("reading {}", path.display()))?;

    println!("symbol:  {}", archive.symbol());
    println!("day:     {}", archive.day());
    println!("events:  {}", archive.len());
    println!("trades:  {}", archive.count_of(EventKind::Trade));
    println!("quotes:  {}", archive.count_of(EventKind::Quote));
    if let (Some(first), Some(last)) = (archive.first_timestamp(), archive.last_timestamp()) {
        println!("first T: {first} ({})", format_nanos(first));
        println!("last T:  {last} ({})", format_nanos(last));
    }
    let ordered = is_chronological(archive.events());
    println!("ordered: {}", if ordered { "yes" } else { "NO" });
    if !ordered {
        std::process::exit(1);
    }
    Ok(())
}

fn format_nanos(nanos: i64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(nanos).to_rfc3339()
}

fn run_aggregate(path: &Path, format: BarFormat, output: Option<&Path>) -> Result<()> {
    let archive = read_archive(path).with_context(|| format!("reading {}", path.display()))?;
    let bars = aggregate_seconds(archive.events());

    let writer: Box<dyn Write> = match output {
        Some(out) => Box::new(BufWriter::new(
            File::create(out).with_context(|| format!("creating {}", out.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    match format {
        BarFormat::Json => write_json(writer, &bars)?,
        BarFormat::Csv => write_csv(writer, &bars)?,
    }

    if let Some(out) = output {
        eprintln!("{} bars written to {}", bars.len(), out.display());
    }
    Ok(())
}
