use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_DAMAGE_TYPE: i32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spell {
    pub spell_id: u32,
    pub name: String,
    pub spell_type: String,
    pub power: i32,
    pub cast_time: i32,
    pub damage_type: i32,
    pub damage: i32,
    pub duration: i32,
    pub value: i32,
    pub radius: i32,
}

/// Places a spell on a spell line at a given level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSpell {
    pub id: String,
    pub line_id: u32,
    pub spell_id: u32,
    pub level: i32,
}

/// Spell description decoded from an item tooltip, used to find an existing spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellCandidate {
    pub spell_type: String,
    pub level: i32,
    pub damage_type: i32,
    pub damage: i32,
    pub duration: i32,
    pub value: i32,
    pub radius: i32,
}

impl SpellCandidate {
    pub fn new(spell_type: impl Into<String>) -> Self {
        Self {
            spell_type: spell_type.into(),
            level: 0,
            damage_type: DEFAULT_DAMAGE_TYPE,
            damage: 0,
            duration: 0,
            value: 0,
            radius: 0,
        }
    }

    pub fn matches(&self, spell: &Spell) -> bool {
        spell.spell_type == self.spell_type
            && spell.power == 0
            && spell.cast_time == 0
            && spell.damage_type == self.damage_type
            && spell.damage == self.damage
            && spell.duration == self.duration
            && spell.value == self.value
            && spell.radius == self.radius
    }
}

impl fmt::Display for SpellCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Level = {}, Type = '{}', Power = 0, CastTime = 0, DamageType = {}, Damage = {}, Duration = {}, Value = {}, Radius = {}",
            self.level,
            self.spell_type,
            self.damage_type,
            self.damage,
            self.duration,
            self.value,
            self.radius
        )
    }
}
