use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::CommandError;
use crate::extract::{Extractor, PhaseStatus, RunReport};
use crate::lang::LanguageTable;
use crate::persistence::memory::MemoryStore;

/// Validates a run for the log named `name` and starts it on a worker thread.
/// Returns as soon as the worker is running; its result is logged and also
/// available through the handle.
pub fn start(config: AppConfig, name: &str) -> Result<JoinHandle<RunReport>, CommandError> {
    let log = config.log_path(name);
    if !log.is_file() {
        return Err(CommandError::MissingLog(log));
    }
    if !config.language_file.is_file() {
        return Err(CommandError::MissingLanguage(config.language_file.clone()));
    }
    let lang = LanguageTable::load(&config.language_file)?;
    let store = MemoryStore::open(&config.store_file)?;
    let mut extractor = Extractor::new(config, lang, store)?;

    thread::Builder::new()
        .name(format!("parselog-{}", name))
        .spawn(move || run_logged(&mut extractor, log))
        .map_err(CommandError::Spawn)
}

fn run_logged(extractor: &mut Extractor<MemoryStore>, log: PathBuf) -> RunReport {
    info!(log = %log.display(), "replay started");
    let report = extractor.run(&log);
    for outcome in &report.phases {
        match outcome.status {
            PhaseStatus::Completed => {
                info!(phase = outcome.stats.phase.name(), counters = %outcome.stats, "phase summary")
            }
            PhaseStatus::Failed => warn!(
                phase = outcome.stats.phase.name(),
                error = outcome.error.as_deref().unwrap_or(""),
                "phase failed"
            ),
            PhaseStatus::Skipped => warn!(phase = outcome.stats.phase.name(), "phase skipped"),
        }
    }
    info!(succeeded = report.succeeded(), "replay finished");
    report
}
