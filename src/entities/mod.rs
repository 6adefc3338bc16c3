pub mod item;
pub mod npc;
pub mod spell;
pub mod world;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Realm {
    #[default]
    None,
    Albion,
    Midgard,
    Hibernia,
}

impl Realm {
    pub fn from_id(id: u8) -> Self {
        match id {
            1 => Realm::Albion,
            2 => Realm::Midgard,
            3 => Realm::Hibernia,
            _ => Realm::None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Realm::None => 0,
            Realm::Albion => 1,
            Realm::Midgard => 2,
            Realm::Hibernia => 3,
        }
    }

    /// Character names on the realm-select screen carry a realm suffix.
    /// Names without one say nothing about the realm.
    pub fn from_account_name(name: &str) -> Option<Self> {
        if name.ends_with("-S") {
            Some(Realm::Albion)
        } else if name.ends_with("-N") {
            Some(Realm::Midgard)
        } else if name.ends_with("-H") {
            Some(Realm::Hibernia)
        } else {
            None
        }
    }
}
