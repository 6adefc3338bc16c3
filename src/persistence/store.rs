use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::entities::item::{ItemTemplate, MerchantItem};
use crate::entities::npc::{Mob, NpcEquipment};
use crate::entities::spell::{LineSpell, Spell};
use crate::entities::world::{BindPoint, WorldObject, ZonePoint};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store snapshot i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store snapshot {path} is malformed: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{kind} '{key}' already exists")]
    Conflict { kind: &'static str, key: String },
    #[error("{kind} '{key}' does not exist")]
    NotFound { kind: &'static str, key: String },
}

/// Every table the extractor reads or writes, keyed by record key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldTables {
    pub mobs: BTreeMap<String, Mob>,
    pub npc_equipment: BTreeMap<String, NpcEquipment>,
    pub merchant_items: BTreeMap<String, MerchantItem>,
    pub item_templates: BTreeMap<String, ItemTemplate>,
    pub world_objects: BTreeMap<String, WorldObject>,
    pub zone_points: BTreeMap<String, ZonePoint>,
    pub bind_points: BTreeMap<String, BindPoint>,
    pub spells: BTreeMap<String, Spell>,
    pub line_spells: BTreeMap<String, LineSpell>,
}

pub trait Record: Clone + fmt::Debug + 'static {
    const KIND: &'static str;

    fn key(&self) -> String;
    fn table(tables: &WorldTables) -> &BTreeMap<String, Self>;
    fn table_mut(tables: &mut WorldTables) -> &mut BTreeMap<String, Self>;
}

macro_rules! record {
    ($ty:ty, $kind:literal, $table:ident, |$r:ident| $key:expr) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;

            fn key(&self) -> String {
                let $r = self;
                $key
            }

            fn table(tables: &WorldTables) -> &BTreeMap<String, Self> {
                &tables.$table
            }

            fn table_mut(tables: &mut WorldTables) -> &mut BTreeMap<String, Self> {
                &mut tables.$table
            }
        }
    };
}

record!(Mob, "mob", mobs, |r| r.id.clone());
record!(NpcEquipment, "npc equipment", npc_equipment, |r| r.id.clone());
record!(MerchantItem, "merchant item", merchant_items, |r| r.id.clone());
record!(ItemTemplate, "item template", item_templates, |r| r.id_nb.clone());
record!(WorldObject, "world object", world_objects, |r| r.id.clone());
record!(ZonePoint, "zone point", zone_points, |r| r.id.clone());
record!(BindPoint, "bind point", bind_points, |r| r.id.clone());
record!(Spell, "spell", spells, |r| r.spell_id.to_string());
record!(LineSpell, "line spell", line_spells, |r| r.id.clone());

/// Synchronous keyed store the extraction phases persist into.
pub trait WorldStore {
    fn find<T, P>(&self, predicate: P) -> Result<Option<T>, StoreError>
    where
        T: Record,
        P: Fn(&T) -> bool;

    fn find_all<T, P>(&self, predicate: P) -> Result<Vec<T>, StoreError>
    where
        T: Record,
        P: Fn(&T) -> bool;

    fn get<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError>;

    fn insert<T: Record>(&mut self, record: T) -> Result<(), StoreError>;

    fn update<T: Record>(&mut self, record: T) -> Result<(), StoreError>;

    fn delete<T: Record>(&mut self, key: &str) -> Result<bool, StoreError>;

    fn all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.find_all(|_: &T| true)
    }

    fn exists<T: Record>(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get::<T>(key)?.is_some())
    }

    /// Inserts or replaces by key. Returns true when the row was new.
    fn upsert<T: Record>(&mut self, record: T) -> Result<bool, StoreError> {
        if self.exists::<T>(&record.key())? {
            self.update(record)?;
            Ok(false)
        } else {
            self.insert(record)?;
            Ok(true)
        }
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
