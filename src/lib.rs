pub mod command;
pub mod config;
pub mod entities;
pub mod error;
pub mod extract;
pub mod lang;
pub mod net;
pub mod persistence;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod tables;
pub mod telemetry;

use clap::Parser;
use std::path::{Path, PathBuf};

pub use config::{AppConfig, ConfigError};
pub use error::{CommandError, ExtractError, FormatError, FormatErrorKind};
pub use extract::{Extractor, Phase, PhaseOutcome, PhaseStats, PhaseStatus, RunReport};
pub use lang::{LanguageError, LanguageTable};
pub use net::packet::{PacketReader, PacketWriter, ReadError};
pub use net::record::{Direction, RawRecord, RecordReader};
pub use persistence::memory::MemoryStore;
pub use persistence::store::{StoreError, WorldStore};

const DEFAULT_CONFIG: &str = "parselog.yaml";

/// Replays a captured packet log into the world store.
#[derive(Debug, Parser)]
#[command(name = "parselog", version)]
struct Cli {
    /// Log name, resolved against the log directory with the log extension.
    name: String,
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    log_directory: Option<PathBuf>,
    /// Store snapshot to load and write back.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Append diagnostics to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => AppConfig::load(Path::new(DEFAULT_CONFIG))?,
        None => AppConfig::default(),
    };
    if let Some(dir) = &cli.log_directory {
        config.log_directory = dir.clone();
    }
    if let Some(store) = &cli.store {
        config.store_file = store.clone();
    }
    Ok(config)
}

pub fn run(args: &[String]) -> Result<(), String> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            print!("{}", err);
            return Ok(());
        }
        Err(err) => return Err(err.to_string()),
    };
    telemetry::logging::init(cli.log_file.as_deref())?;
    let config = load_config(&cli).map_err(|err| err.to_string())?;
    let worker = command::start(config, &cli.name).map_err(|err| format!("parselog: {}", err))?;
    let report = worker
        .join()
        .map_err(|_| "parselog: replay worker panicked".to_string())?;
    if report.succeeded() {
        Ok(())
    } else {
        Err(format!("parselog: replay of {} incomplete", report.log.display()))
    }
}
