use std::path::PathBuf;
use thiserror::Error;

use crate::net::packet::ReadError;
use crate::persistence::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatErrorKind {
    MissingCode,
    BadCode,
    MissingLength,
    BadLength,
    BadHexToken,
    TruncatedBody,
    OverlongBody,
    TruncatedRecord,
}

/// A record that cannot be read as declared. Aborts the phase that hit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("log format error at line {line}: {kind:?} ({detail})")]
pub struct FormatError {
    pub line: u64,
    pub kind: FormatErrorKind,
    pub detail: String,
}

impl FormatError {
    pub fn new(line: u64, kind: FormatErrorKind, detail: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            detail: detail.into(),
        }
    }

    pub fn truncated_record(line: u64, opcode: u8, err: ReadError) -> Self {
        Self::new(
            line,
            FormatErrorKind::TruncatedRecord,
            format!("opcode 0x{opcode:02X}: {err}"),
        )
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("log i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no client version record found in log")]
    VersionNotFound,

    #[error("client version {found} is below the minimum supported version {minimum}")]
    VersionUnsupported { found: u16, minimum: u16 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExtractError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors after which later phases cannot read the log either.
    pub fn stops_run(&self) -> bool {
        matches!(
            self,
            ExtractError::Format(_)
                | ExtractError::Io { .. }
                | ExtractError::VersionNotFound
                | ExtractError::VersionUnsupported { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("log file {0} does not exist")]
    MissingLog(PathBuf),

    #[error("language file {0} does not exist")]
    MissingLanguage(PathBuf),

    #[error("language file could not be loaded: {0}")]
    Language(#[from] crate::lang::LanguageError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("worker thread could not be started: {0}")]
    Spawn(#[source] std::io::Error),
}
