use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,parselog=info";

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Filter from `RUST_LOG`, falling back to phase summaries and warnings.
pub fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber once. Events go to stderr, or are appended
/// to `log_file` when one is given.
pub fn init(log_file: Option<&Path>) -> Result<(), String> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false);
    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| format!("open log {} failed: {}", path.display(), err))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| format!("log system init failed: {}", err))?;
    let _ = INITIALIZED.set(());
    Ok(())
}
