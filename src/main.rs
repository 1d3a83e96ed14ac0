//! # Traffic Ledger CLI (`traffic`)
//!
//! The `traffic` binary turns a directory of dated raw traffic snapshots
//! into per-repo time series and per-date diff reports.
//!
//! ## Usage
//!
//! ```bash
//! traffic --config ./config/traffic.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `traffic init` | Create the storage directories |
//! | `traffic ingest` | Merge pending snapshots and write their diff reports |
//! | `traffic status` | Show processed, pending and skipped snapshot counts |
//! | `traffic report` | Show a diff report (latest by default) |
//! | `traffic series <repo> <metric>` | Print one merged series |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest everything new under ./log/settings_standard/raw
//! traffic --data-dir ./log/settings_standard ingest
//!
//! # See what would be ingested
//! traffic ingest --dry-run
//!
//! # Star history of one repo as JSON
//! traffic series octo/widgets stars --json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use traffic_ledger::{config, ingest, init, progress, show, status};

/// Traffic Ledger CLI: append-only history of repository traffic.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file, or `--data-dir` to run against a storage root without one.
#[derive(Parser)]
#[command(
    name = "traffic",
    about = "Traffic Ledger: per-repo traffic time series and daily diff reports",
    version,
    long_about = "Traffic Ledger ingests dated snapshots of repository traffic metrics \
    (stars, forks, clones, views) into append-only per-repo time series and records, \
    for every snapshot, which repos appeared or disappeared and how their stars and \
    forks changed."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/traffic.toml")]
    config: PathBuf,

    /// Storage root; overrides `storage.root` and makes the config file optional.
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Set the logging level for diagnostic output.
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Progress output on stderr: `off`, `human` or `json`.
    /// Defaults to `human` when stderr is a terminal, otherwise `off`.
    #[arg(long, global = true, value_name = "MODE")]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the raw, series and report directories.
    ///
    /// Idempotent: existing directories and their contents are left alone.
    Init,

    /// Ingest pending snapshots.
    ///
    /// Every raw snapshot dated after the last processed one is merged into
    /// the per-repo series, oldest first, and gets a diff report. An
    /// interrupted run is resumed by running again.
    Ingest {
        /// List pending snapshots without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show storage paths and ingest progress.
    Status,

    /// Show a diff report.
    Report {
        /// Report date (YYYY-MM-DD). Defaults to the latest report.
        #[arg(long)]
        date: Option<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print one merged series of a repo.
    Series {
        /// Repo identifier, e.g. `octo/widgets`.
        entity: String,

        /// Metric name, e.g. `stars` or `views_daily`.
        metric: String,

        /// Print the series as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let progress_mode = match cli.progress.as_deref() {
        Some(mode) => mode.parse()?,
        None => progress::ProgressMode::default_for_tty(),
    };

    let cfg = config::resolve(&cli.config, cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Init => {
            init::run_init(&cfg)?;
            println!("Storage initialized at {}", cfg.storage.root.display());
        }
        Commands::Ingest { dry_run } => {
            let reporter = progress_mode.reporter();
            ingest::run_ingest(&cfg, dry_run, reporter.as_ref())?;
        }
        Commands::Status => {
            status::run_status(&cfg)?;
        }
        Commands::Report { date, json } => {
            show::run_report(&cfg, date.as_deref(), json)?;
        }
        Commands::Series {
            entity,
            metric,
            json,
        } => {
            show::run_series(&cfg, &entity, &metric, json)?;
        }
    }

    Ok(())
}
