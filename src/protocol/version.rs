use serde::{Deserialize, Serialize};

use crate::net::packet::{PacketReader, ReadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidth {
    Byte,
    Word,
}

impl FieldWidth {
    pub fn read(self, reader: &mut PacketReader<'_>) -> Result<u16, ReadError> {
        match self {
            FieldWidth::Byte => Ok(reader.read_u8()? as u16),
            FieldWidth::Word => reader.read_u16(),
        }
    }
}

/// Field layout rules that hold from `from` up to the next profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolProfile {
    pub from: u16,
    pub equipment_effect: FieldWidth,
    pub npc_spawn_padding: usize,
}

#[derive(Debug, Clone)]
pub struct ProtocolTable {
    profiles: Vec<ProtocolProfile>,
}

impl ProtocolTable {
    pub fn new(mut profiles: Vec<ProtocolProfile>) -> Option<Self> {
        if profiles.is_empty() {
            return None;
        }
        profiles.sort_by_key(|profile| profile.from);
        Some(Self { profiles })
    }

    /// Versions below the first entry fall back to it.
    pub fn profile_for(&self, version: u16) -> ProtocolProfile {
        let mut chosen = self.profiles[0];
        for profile in &self.profiles {
            if profile.from <= version {
                chosen = *profile;
            }
        }
        chosen
    }
}

/// Packed client version: three digits read as one number (1.76 -> 176).
pub fn version_from_digits(major: u8, minor: u8, build: u8) -> u16 {
    major as u16 * 100 + minor as u16 * 10 + build as u16
}
