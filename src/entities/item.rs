use serde::{Deserialize, Serialize};

use crate::entities::Realm;

/// Object type ids carried in the merchant item record.
pub mod object_type {
    pub const GENERIC_ITEM: u8 = 0;
    pub const GENERIC_WEAPON: u8 = 1;
    pub const CRUSHING_WEAPON: u8 = 2;
    pub const SLASHING_WEAPON: u8 = 3;
    pub const THRUST_WEAPON: u8 = 4;
    pub const FIRED: u8 = 5;
    pub const TWO_HANDED_WEAPON: u8 = 6;
    pub const POLEARM_WEAPON: u8 = 7;
    pub const STAFF: u8 = 8;
    pub const LONGBOW: u8 = 9;
    pub const CROSSBOW: u8 = 10;
    pub const SWORD: u8 = 11;
    pub const HAMMER: u8 = 12;
    pub const AXE: u8 = 13;
    pub const SPEAR: u8 = 14;
    pub const COMPOSITE_BOW: u8 = 15;
    pub const THROWN: u8 = 16;
    pub const LEFT_AXE: u8 = 17;
    pub const RECURVED_BOW: u8 = 18;
    pub const BLADES: u8 = 19;
    pub const BLUNT: u8 = 20;
    pub const PIERCING: u8 = 21;
    pub const LARGE_WEAPONS: u8 = 22;
    pub const CELTIC_SPEAR: u8 = 23;
    pub const FLEXIBLE: u8 = 24;
    pub const HAND_TO_HAND: u8 = 25;
    pub const SCYTHE: u8 = 26;
    pub const GENERIC_ARMOR: u8 = 31;
    pub const CLOTH: u8 = 32;
    pub const LEATHER: u8 = 33;
    pub const STUDDED: u8 = 34;
    pub const CHAIN: u8 = 35;
    pub const PLATE: u8 = 36;
    pub const REINFORCED: u8 = 37;
    pub const SCALE: u8 = 38;
    pub const MAGICAL: u8 = 41;
    pub const SHIELD: u8 = 42;
    pub const ARROW: u8 = 43;
    pub const BOLT: u8 = 44;
    pub const INSTRUMENT: u8 = 45;
    pub const POISON: u8 = 46;
}

/// Item slot ids stored in `ItemTemplate::item_type`.
pub mod item_slot {
    pub const RIGHT_HAND: i32 = 10;
    pub const LEFT_HAND: i32 = 11;
    pub const TWO_HANDED: i32 = 12;
    pub const DISTANCE: i32 = 13;
    pub const GENERIC: i32 = 40;
    pub const UNKNOWN_ARMOR: i32 = -1;
}

pub const BONUS_SLOTS: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBonus {
    pub property: u16,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemTemplate {
    pub id_nb: String,
    pub name: String,
    pub realm: Realm,
    pub level: u8,
    pub object_type: u8,
    pub item_type: i32,
    pub model: u16,
    pub price: i64,
    pub weight: u16,
    pub pack_size: u16,
    pub max_count: u16,
    pub dps_af: i32,
    pub spd_abs: i32,
    pub damage_type: u8,
    pub hand: u8,
    pub color: i32,
    pub quality: i32,
    pub durability: i32,
    pub max_durability: i32,
    pub condition: i32,
    pub max_condition: i32,
    /// Bonus 1-5 followed by the extra bonus.
    pub bonuses: [ItemBonus; BONUS_SLOTS],
    pub charges: i32,
    pub max_charges: i32,
    pub spell_id: u32,
    pub proc_spell_id: u32,
}

impl Default for ItemTemplate {
    fn default() -> Self {
        Self {
            id_nb: String::new(),
            name: String::new(),
            realm: Realm::None,
            level: 0,
            object_type: object_type::GENERIC_ITEM,
            item_type: 0,
            model: 0,
            price: 0,
            weight: 0,
            pack_size: 1,
            max_count: 1,
            dps_af: 0,
            spd_abs: 0,
            damage_type: 0,
            hand: 0,
            color: 0,
            quality: 85,
            durability: 100,
            max_durability: 100,
            condition: 50000,
            max_condition: 50000,
            bonuses: [ItemBonus::default(); BONUS_SLOTS],
            charges: 0,
            max_charges: 0,
            spell_id: 0,
            proc_spell_id: 0,
        }
    }
}

impl ItemTemplate {
    pub fn catalog_key(&self) -> CatalogKey {
        CatalogKey {
            name: self.name.clone(),
            realm: self.realm,
            level: self.level,
            object_type: self.object_type,
            model: self.model,
            price: self.price,
        }
    }

    pub fn has_spell(&self) -> bool {
        self.spell_id != 0 || self.proc_spell_id != 0
    }
}

/// Fields a merchant listing must match for an existing template to be reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogKey {
    pub name: String,
    pub realm: Realm,
    pub level: u8,
    pub object_type: u8,
    pub model: u16,
    pub price: i64,
}

/// One slot of a merchant trade list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantItem {
    pub id: String,
    pub list_id: String,
    pub item_template: String,
    pub page: u8,
    pub slot: u8,
}
