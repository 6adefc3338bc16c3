pub mod decode;
pub mod delve;
pub mod version;

use std::collections::HashMap;

use crate::entities::Realm;
use crate::error::FormatError;
use crate::net::packet::{PacketReader, ReadError};
use crate::net::record::{Direction, RawRecord};
use crate::reconcile::equipment::EquipmentItem;
use version::ProtocolProfile;

// Client -> server.
pub const OPCODE_CLIENT_VERSION: u8 = 0xf4;
pub const OPCODE_CHARACTER_SELECT: u8 = 0xfc;
pub const OPCODE_PLAYER_MOVE: u8 = 0xa9;
pub const OPCODE_ZONE_JUMP: u8 = 0x90;
pub const OPCODE_INTERACT: u8 = 0x7a;

// Server -> client.
pub const OPCODE_PLAYER_POSITION: u8 = 0x20;
pub const OPCODE_NPC_SPAWN: u8 = 0xda;
pub const OPCODE_NPC_EQUIPMENT: u8 = 0x15;
pub const OPCODE_OBJECT_SPAWN: u8 = 0xd9;
pub const OPCODE_EMOTE: u8 = 0xf9;
pub const OPCODE_MERCHANT_PAGE: u8 = 0x17;
pub const OPCODE_DELVE: u8 = 0xc4;
pub const OPCODE_RIDE: u8 = 0xc8;

pub const EMOTE_BIND: u8 = 0x2c;
pub const OBJECT_FLAG_DOOR: u8 = 0x04;
pub const OBJECT_TYPE_LOOT: u16 = 0x04;

/// Zone-relative player position from a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerMove {
    pub zone: u8,
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPosition {
    pub oid: u16,
    pub region: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub heading: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcSpawn {
    pub oid: u16,
    pub speed: u16,
    pub heading: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub model: u16,
    pub size: u8,
    pub level: u8,
    /// Stored mob flag bits.
    pub flags: u8,
    pub realm: Realm,
    pub has_equipment: bool,
    pub max_stick: u8,
    pub name: String,
    pub guild: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcEquipmentUpdate {
    pub oid: u16,
    pub active_weapon: u8,
    pub items: Vec<EquipmentItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpawn {
    pub emblem: u16,
    pub heading: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
    pub model: u16,
    pub object_type: u16,
    pub name: String,
    pub flag: u8,
}

impl ObjectSpawn {
    pub fn is_door(&self) -> bool {
        self.flag == OBJECT_FLAG_DOOR
    }

    pub fn is_loot(&self) -> bool {
        self.object_type & OBJECT_TYPE_LOOT != 0
    }
}

/// One row of a merchant window page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantListing {
    pub slot: u8,
    pub level: u8,
    pub value1: u8,
    pub spd_abs: u8,
    pub hand: u8,
    pub damage_type: u8,
    pub object_type: u8,
    pub can_use: bool,
    pub weight: u16,
    pub price: u32,
    pub model: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantPage {
    pub page: u8,
    pub items: Vec<MerchantListing>,
}

/// Tooltip for a named item; `text` holds the undecoded line stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelveInfo {
    pub item_name: String,
    pub text: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ClientVersion(u16),
    /// `None` when the account name carries no realm suffix.
    RealmSelected(Option<Realm>),
    PlayerMoved(PlayerMove),
    ZoneJumpRequested { zone_point_id: u16 },
    Interact { npc_oid: u16 },
    PlayerPosition(PlayerPosition),
    NpcSpawned(NpcSpawn),
    NpcEquipment(NpcEquipmentUpdate),
    ObjectSpawned(ObjectSpawn),
    Emote { oid: u16, emote: u8 },
    MerchantPage(MerchantPage),
    Delve(DelveInfo),
    Ride { steed_oid: u16, riding: bool },
}

pub type Decoder = fn(&mut PacketReader<'_>, &ProtocolProfile) -> Result<Event, ReadError>;

/// (direction, opcode) -> decoder for every record the phases understand.
pub struct DecoderTable {
    decoders: HashMap<(Direction, u8), Decoder>,
}

impl DecoderTable {
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        use Direction::{Incoming, Outgoing};
        let mut table = Self::empty();
        table.register(Outgoing, OPCODE_CLIENT_VERSION, decode::parse_client_version);
        table.register(Outgoing, OPCODE_CHARACTER_SELECT, decode::parse_character_select);
        table.register(Outgoing, OPCODE_PLAYER_MOVE, decode::parse_player_move);
        table.register(Outgoing, OPCODE_ZONE_JUMP, decode::parse_zone_jump);
        table.register(Outgoing, OPCODE_INTERACT, decode::parse_interact);
        table.register(Incoming, OPCODE_PLAYER_POSITION, decode::parse_player_position);
        table.register(Incoming, OPCODE_NPC_SPAWN, decode::parse_npc_spawn);
        table.register(Incoming, OPCODE_NPC_EQUIPMENT, decode::parse_npc_equipment);
        table.register(Incoming, OPCODE_OBJECT_SPAWN, decode::parse_object_spawn);
        table.register(Incoming, OPCODE_EMOTE, decode::parse_emote);
        table.register(Incoming, OPCODE_MERCHANT_PAGE, decode::parse_merchant_page);
        table.register(Incoming, OPCODE_DELVE, decode::parse_delve);
        table.register(Incoming, OPCODE_RIDE, decode::parse_ride);
        table
    }

    pub fn register(&mut self, direction: Direction, opcode: u8, decoder: Decoder) {
        self.decoders.insert((direction, opcode), decoder);
    }

    pub fn handles(&self, direction: Direction, opcode: u8) -> bool {
        self.decoders.contains_key(&(direction, opcode))
    }

    /// `Ok(None)` for records without a decoder. A body shorter than its
    /// layout is a truncated-record format error.
    pub fn decode(
        &self,
        record: &RawRecord,
        profile: &ProtocolProfile,
    ) -> Result<Option<Event>, FormatError> {
        let Some(decoder) = self.decoders.get(&(record.direction, record.opcode)) else {
            return Ok(None);
        };
        let mut reader = PacketReader::new(&record.body);
        decoder(&mut reader, profile)
            .map(Some)
            .map_err(|err| FormatError::truncated_record(record.line, record.opcode, err))
    }
}

impl Default for DecoderTable {
    fn default() -> Self {
        Self::standard()
    }
}
