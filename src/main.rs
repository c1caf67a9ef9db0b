//! BIN resolver CLI
//!
//! Resolves card numbers to their issuing bank.
//!
//! # Usage
//!
//! ```bash
//! # One-off batch against a local dataset (.json or .zip)
//! bin-resolver check --dataset bins.json cards.csv > results.csv
//!
//! # Keep a dataset refreshed from a remote archive and resolve stdin lines
//! bin-resolver watch --source-url https://example.com/bin_info.zip
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use bin_resolver::{
    BatchValidator, DatasetRefresher, HttpArchiveFetcher, LocalDatasetFetcher, MatchPolicy,
    RangeResolver, RangeStore, RefreshConfig, Result, ServiceError,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "bin-resolver",
    version,
    about = "Resolve payment card numbers to their issuing bank"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve every card number in a CSV file against a local dataset
    Check(CheckArgs),
    /// Refresh a remote dataset periodically and resolve card numbers read from stdin
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Dataset file: a JSON array of ranges, or a zip archive containing one
    #[arg(short, long, value_name = "PATH")]
    dataset: PathBuf,

    /// Name of the JSON payload inside a zip dataset
    #[arg(long, value_name = "NAME", default_value = bin_resolver::config::DEFAULT_DATASET_FILE_NAME)]
    dataset_file_name: String,

    /// How candidates sharing a BIN are examined
    #[arg(long, value_enum, default_value_t = PolicyArg::First)]
    policy: PolicyArg,

    /// CSV file with a `card_number` column
    #[arg(value_name = "INPUT")]
    input: PathBuf,
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// JSON configuration file; flags below override its values
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Remote dataset archive URL
    #[arg(long, value_name = "URL")]
    source_url: Option<String>,

    /// Directory for downloaded and extracted files
    #[arg(long, value_name = "PATH")]
    work_dir: Option<PathBuf>,

    /// Minutes between refreshes
    #[arg(long, value_name = "MINUTES")]
    interval_mins: Option<u64>,

    /// Seconds before a download is abandoned
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,

    /// How candidates sharing a BIN are examined
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Check only the first range stored for a BIN
    First,
    /// Check every range stored for a BIN
    Any,
}

impl From<PolicyArg> for MatchPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::First => MatchPolicy::FirstCandidate,
            PolicyArg::Any => MatchPolicy::AnyCandidate,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Watch(args) => run_watch(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_check(args: CheckArgs) -> Result<()> {
    let input = File::open(&args.input)?;

    let extract_dir = std::env::temp_dir().join(format!("bin-resolver-{}", process::id()));
    let fetcher = LocalDatasetFetcher::new(&args.dataset, &extract_dir, args.dataset_file_name);
    let loaded = load_into_store(&fetcher);
    let _ = std::fs::remove_dir_all(&extract_dir);

    let resolver = RangeResolver::with_policy(Arc::new(loaded?), args.policy.into());
    let validator = BatchValidator::new(resolver);

    let results = validator.process_csv(BufReader::new(input))?;
    let stdout = io::stdout();
    BatchValidator::write_output(&results, stdout.lock())?;
    Ok(())
}

fn load_into_store(fetcher: &LocalDatasetFetcher) -> Result<RangeStore> {
    use bin_resolver::DatasetFetcher;

    let records = fetcher.fetch()?;
    Ok(RangeStore::with_records(records)?)
}

fn run_watch(args: WatchArgs) -> Result<()> {
    let config = watch_config(args)?;
    config.validate()?;

    let store = Arc::new(RangeStore::new());
    let fetcher = HttpArchiveFetcher::new(config.clone())?;
    let refresher = Arc::new(DatasetRefresher::new(fetcher, Arc::clone(&store)));
    let handle = refresher.spawn(config.interval(), config.refresh_on_start)?;

    let validator = BatchValidator::new(RangeResolver::with_policy(store, config.match_policy));
    let mut writer = csv::Writer::from_writer(io::stdout());

    for line in io::stdin().lock().lines() {
        let line = line?;
        let card_number = line.trim();
        if card_number.is_empty() {
            continue;
        }
        writer.serialize(validator.check(card_number))?;
        writer.flush()?;
    }

    info!("Input closed, stopping refresher");
    handle.stop();
    Ok(())
}

fn watch_config(args: WatchArgs) -> Result<RefreshConfig> {
    let mut config = match &args.config {
        Some(path) => RefreshConfig::from_json_file(path)?,
        None => RefreshConfig::default(),
    };

    if let Some(url) = args.source_url {
        config.source_url = url;
    }
    if let Some(dir) = args.work_dir {
        config.work_dir = dir;
    }
    if let Some(minutes) = args.interval_mins {
        config.interval_secs = minutes
            .checked_mul(60)
            .ok_or_else(|| ServiceError::Config("interval is too large".to_string()))?;
    }
    if let Some(seconds) = args.timeout_secs {
        config.fetch_timeout_secs = seconds;
    }
    if let Some(policy) = args.policy {
        config.match_policy = policy.into();
    }

    Ok(config)
}
