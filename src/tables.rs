//! Embedded model-id and label tables used when building item templates
//! and decoding tooltip text.

use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::error;

use crate::entities::item::item_slot;
use crate::lang::LanguageTable;

#[derive(Debug, Default, Deserialize)]
struct ModelGroup {
    slot: i32,
    #[allow(dead_code)]
    name: String,
    models: Vec<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelTablesFile {
    item_slots: Vec<ModelGroup>,
    armor_slots: Vec<ModelGroup>,
    poison_models: Vec<u16>,
    craft_material_models: Vec<u16>,
    dye_models: Vec<u16>,
    steed_models: Vec<u16>,
}

#[derive(Debug, Default)]
pub struct ModelTables {
    item_slots: Vec<(i32, HashSet<u16>)>,
    armor_slots: Vec<(i32, HashSet<u16>)>,
    poison: HashSet<u16>,
    craft_material: HashSet<u16>,
    dye: HashSet<u16>,
    steed: HashSet<u16>,
}

impl ModelTables {
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let file: ModelTablesFile = serde_yaml::from_str(text)?;
        let groups = |groups: Vec<ModelGroup>| {
            groups
                .into_iter()
                .map(|group| (group.slot, group.models.into_iter().collect()))
                .collect()
        };
        Ok(Self {
            item_slots: groups(file.item_slots),
            armor_slots: groups(file.armor_slots),
            poison: file.poison_models.into_iter().collect(),
            craft_material: file.craft_material_models.into_iter().collect(),
            dye: file.dye_models.into_iter().collect(),
            steed: file.steed_models.into_iter().collect(),
        })
    }

    /// Slot for generic and magical items; unknown models are generic.
    pub fn item_slot(&self, model: u16) -> i32 {
        self.item_slots
            .iter()
            .find(|(_, models)| models.contains(&model))
            .map(|(slot, _)| *slot)
            .unwrap_or(item_slot::GENERIC)
    }

    pub fn armor_slot(&self, model: u16) -> i32 {
        self.armor_slots
            .iter()
            .find(|(_, models)| models.contains(&model))
            .map(|(slot, _)| *slot)
            .unwrap_or(item_slot::UNKNOWN_ARMOR)
    }

    pub fn is_poison(&self, model: u16) -> bool {
        self.poison.contains(&model)
    }

    pub fn is_craft_material(&self, model: u16) -> bool {
        self.craft_material.contains(&model)
    }

    pub fn is_dye(&self, model: u16) -> bool {
        self.dye.contains(&model)
    }

    pub fn is_steed(&self, model: u16) -> bool {
        self.steed.contains(&model)
    }
}

#[derive(Debug, Default, Deserialize)]
struct DyeColor {
    color: i32,
    keys: Vec<String>,
}

/// Ordered language key -> property id tables. The first entry whose label
/// matches wins.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PropertyLabels {
    stats_and_skills: Vec<(String, u16)>,
    focus: Vec<(String, u16)>,
    resists: Vec<(String, u16)>,
    damage_types: Vec<(String, u16)>,
    dye_colors: Vec<DyeColor>,
}

fn lookup(table: &[(String, u16)], lang: &LanguageTable, name: &str) -> Option<u16> {
    table
        .iter()
        .find(|(key, _)| lang.equals(key, name))
        .map(|(_, id)| *id)
}

impl PropertyLabels {
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn stat(&self, lang: &LanguageTable, name: &str) -> Option<u16> {
        lookup(&self.stats_and_skills, lang, name)
    }

    /// Focus lines name either a magic focus or a plain stat/skill.
    pub fn focus(&self, lang: &LanguageTable, name: &str) -> Option<u16> {
        lookup(&self.focus, lang, name).or_else(|| self.stat(lang, name))
    }

    pub fn resist(&self, lang: &LanguageTable, name: &str) -> Option<u16> {
        lookup(&self.resists, lang, name)
    }

    pub fn damage_type(&self, lang: &LanguageTable, name: &str) -> Option<u16> {
        lookup(&self.damage_types, lang, name)
    }

    /// Dye colour from the item name, 0 when no colour label occurs in it.
    pub fn dye_color(&self, lang: &LanguageTable, name: &str) -> i32 {
        self.dye_colors
            .iter()
            .find(|dye| dye.keys.iter().any(|key| lang.found_in(key, name)))
            .map(|dye| dye.color)
            .unwrap_or(0)
    }
}

pub fn models() -> &'static ModelTables {
    static TABLES: OnceLock<ModelTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        const YAML: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/item_models.yaml"));
        ModelTables::parse(YAML).unwrap_or_else(|err| {
            error!(error = %err, "embedded item model table is malformed");
            ModelTables::default()
        })
    })
}

pub fn labels() -> &'static PropertyLabels {
    static TABLES: OnceLock<PropertyLabels> = OnceLock::new();
    TABLES.get_or_init(|| {
        const YAML: &str =
            include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/property_labels.yaml"));
        PropertyLabels::parse(YAML).unwrap_or_else(|err| {
            error!(error = %err, "embedded property label table is malformed");
            PropertyLabels::default()
        })
    })
}
