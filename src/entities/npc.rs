use serde::{Deserialize, Serialize};

use crate::entities::Realm;

/// Flag bits stored on a mob row.
pub mod flags {
    pub const GHOST: u8 = 0x01;
    pub const STEALTH: u8 = 0x02;
    pub const DONT_SHOW_NAME: u8 = 0x04;
    pub const CANT_TARGET: u8 = 0x08;
    pub const PEACE: u8 = 0x10;
    pub const FLYING: u8 = 0x20;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NpcClass {
    #[default]
    Npc,
    VaultKeeper,
    Healer,
    Blacksmith,
    Enchanter,
    Merchant,
    StableMaster,
}

impl NpcClass {
    pub fn class_name(self) -> &'static str {
        match self {
            NpcClass::Npc => "DOL.GS.GameNPC",
            NpcClass::VaultKeeper => "DOL.GS.GameVaultKeeper",
            NpcClass::Healer => "DOL.GS.GameHealer",
            NpcClass::Blacksmith => "DOL.GS.Blacksmith",
            NpcClass::Enchanter => "DOL.GS.Enchanter",
            NpcClass::Merchant => "DOL.GS.GameMerchant",
            NpcClass::StableMaster => "DOL.GS.GameStableMaster",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mob {
    pub id: String,
    pub class: NpcClass,
    pub name: String,
    pub guild: String,
    pub region: u16,
    pub realm: Realm,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub heading: u16,
    pub speed: u16,
    pub model: u16,
    pub size: u8,
    pub level: u8,
    pub flags: u8,
    pub max_stick: u8,
    pub aggro_level: u8,
    pub aggro_range: u16,
    pub equipment_template: Option<String>,
    pub items_list_template: Option<String>,
}

impl Mob {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// One worn item of an equipment template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcEquipment {
    pub id: String,
    pub template_id: String,
    pub slot: u8,
    pub model: u16,
    pub color: u16,
    pub effect: u16,
}
