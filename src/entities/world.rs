use serde::{Deserialize, Serialize};

use crate::entities::Realm;

pub const STATIC_ITEM_CLASS: &str = "DOL.GS.GameStaticItem";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldObject {
    pub id: String,
    pub class_name: String,
    pub name: String,
    pub region: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub heading: u16,
    pub model: u16,
    pub emblem: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonePoint {
    pub id: String,
    pub zone_point_id: u16,
    pub realm: Realm,
    pub target_region: u16,
    pub target_x: u32,
    pub target_y: u32,
    pub target_z: u16,
    pub target_heading: u16,
}

impl ZonePoint {
    pub fn new(zone_point_id: u16, realm: Realm) -> Self {
        Self {
            id: format!("{}-{}", zone_point_id, realm.id()),
            zone_point_id,
            realm,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindPoint {
    pub id: String,
    pub region: u16,
    pub realm: Realm,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub radius: u16,
}
