use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::version::{FieldWidth, ProtocolProfile, ProtocolTable};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse failed for {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config has no protocol profiles")]
    NoProfiles,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneOffset {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_directory: PathBuf,
    pub log_extension: String,
    pub language_file: PathBuf,
    pub report_file: PathBuf,
    pub store_file: PathBuf,
    pub minimum_version: u16,
    pub protocol_profiles: Vec<ProtocolProfile>,
    pub zone_offsets: BTreeMap<u8, ZoneOffset>,
    pub bind_radius: u16,
    pub aggro_level: u8,
    pub aggro_range: u16,
    pub item_cache_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_directory: PathBuf::from("logs"),
            log_extension: "log".to_string(),
            language_file: PathBuf::from("pl.english.lang"),
            report_file: PathBuf::from("MissingSpells.txt"),
            store_file: PathBuf::from("world.yaml"),
            minimum_version: 171,
            protocol_profiles: vec![
                ProtocolProfile {
                    from: 171,
                    equipment_effect: FieldWidth::Word,
                    npc_spawn_padding: 3,
                },
                ProtocolProfile {
                    from: 176,
                    equipment_effect: FieldWidth::Byte,
                    npc_spawn_padding: 3,
                },
            ],
            zone_offsets: BTreeMap::new(),
            bind_radius: 750,
            aggro_level: 0,
            aggro_range: 500,
            item_cache_capacity: 1024,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn protocol_table(&self) -> Result<ProtocolTable, ConfigError> {
        ProtocolTable::new(self.protocol_profiles.clone()).ok_or(ConfigError::NoProfiles)
    }

    /// `<log_directory>/<name>.<log_extension>`
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.log_directory
            .join(format!("{}.{}", name, self.log_extension))
    }

    pub fn zone_offset(&self, zone: u8) -> ZoneOffset {
        self.zone_offsets.get(&zone).copied().unwrap_or_default()
    }
}
