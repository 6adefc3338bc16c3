use crate::entities::npc::flags;
use crate::entities::Realm;
use crate::net::packet::{PacketReader, ReadError};
use crate::protocol::version::{version_from_digits, ProtocolProfile};
use crate::protocol::{
    DelveInfo, Event, MerchantListing, MerchantPage, NpcEquipmentUpdate, NpcSpawn, ObjectSpawn,
    PlayerMove, PlayerPosition,
};
use crate::reconcile::equipment::EquipmentItem;

const ACCOUNT_NAME_WIDTH: usize = 24;
const LOGIN_TRAILER: usize = 90;

const SPAWN_STEALTH: u8 = 0x01;
const SPAWN_HAS_EQUIPMENT: u8 = 0x02;
const SPAWN_FLYING: u8 = 0x20;
const SPAWN_REALM_MASK: u8 = 0xc0;
const SPAWN2_CANT_TARGET: u8 = 0x01;
const SPAWN2_HIDE_NAME: u8 = 0x02;
const SPAWN2_STEALTH: u8 = 0x04;

const MODEL_MASK: u16 = 0x1fff;
const MODEL_HAS_WIDE_COLOR: u16 = 0x8000;
const MODEL_HAS_COLOR: u16 = 0x4000;
const MODEL_HAS_EFFECT: u16 = 0x2000;
const FIRST_WEAPON_SLOT: u8 = 10;
const LAST_WEAPON_SLOT: u8 = 13;

pub fn parse_client_version(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    reader.skip(2)?;
    let major = reader.read_u8()?;
    let minor = reader.read_u8()?;
    let build = reader.read_u8()?;
    reader.skip(LOGIN_TRAILER)?;
    Ok(Event::ClientVersion(version_from_digits(major, minor, build)))
}

pub fn parse_character_select(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    let account = reader.read_fixed_string(ACCOUNT_NAME_WIDTH)?;
    Ok(Event::RealmSelected(Realm::from_account_name(&account)))
}

pub fn parse_player_move(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    reader.skip(4)?;
    let z = reader.read_u16()?;
    let x = reader.read_u16()?;
    let y = reader.read_u16()?;
    let zone = reader.read_u8()?;
    Ok(Event::PlayerMoved(PlayerMove { zone, x, y, z }))
}

pub fn parse_zone_jump(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    let zone_point_id = reader.read_u16()?;
    reader.skip(2)?;
    Ok(Event::ZoneJumpRequested { zone_point_id })
}

pub fn parse_interact(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    reader.skip(10)?;
    let npc_oid = reader.read_u16()?;
    Ok(Event::Interact { npc_oid })
}

pub fn parse_player_position(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    let oid = reader.read_u16()?;
    let z = reader.read_u16()?;
    let x = reader.read_u32()?;
    let y = reader.read_u32()?;
    let heading = reader.read_u16()?;
    reader.skip(6)?;
    let region = reader.read_u16()?;
    reader.skip(2)?;
    Ok(Event::PlayerPosition(PlayerPosition {
        oid,
        region,
        x,
        y,
        z,
        heading,
    }))
}

pub fn parse_npc_spawn(
    reader: &mut PacketReader<'_>,
    profile: &ProtocolProfile,
) -> Result<Event, ReadError> {
    let oid = reader.read_u16()?;
    let speed = reader.read_u16()?;
    let heading = reader.read_u16()?;
    let z = reader.read_u16()?;
    let x = reader.read_u32()?;
    let y = reader.read_u32()?;
    reader.skip(2)?;
    let model = reader.read_u16()?;
    let size = reader.read_u8()?;
    let level = reader.read_u8()?;

    let spawn_flags = reader.read_u8()?;
    let max_stick = reader.read_u8()?;
    let spawn_flags2 = reader.read_u8()?;
    reader.skip(profile.npc_spawn_padding)?;
    let name = reader.read_pascal_string()?;
    let guild = reader.read_pascal_string()?;
    reader.skip(1)?;

    let mut stored = 0u8;
    if spawn_flags & SPAWN_STEALTH != 0 {
        stored |= flags::STEALTH;
    }
    if spawn_flags & SPAWN_FLYING != 0 {
        stored |= flags::FLYING;
    }
    if spawn_flags2 & SPAWN2_CANT_TARGET != 0 {
        stored |= flags::CANT_TARGET;
    }
    if spawn_flags2 & SPAWN2_HIDE_NAME != 0 {
        stored |= flags::DONT_SHOW_NAME;
    }
    if spawn_flags2 & SPAWN2_STEALTH != 0 {
        stored |= flags::STEALTH;
    }

    Ok(Event::NpcSpawned(NpcSpawn {
        oid,
        speed,
        heading,
        x,
        y,
        z,
        model,
        size,
        level,
        flags: stored,
        realm: Realm::from_id((spawn_flags & SPAWN_REALM_MASK) >> 6),
        has_equipment: spawn_flags & SPAWN_HAS_EQUIPMENT != 0,
        max_stick,
        name,
        guild,
    }))
}

fn parse_equipment_item(
    reader: &mut PacketReader<'_>,
    profile: &ProtocolProfile,
) -> Result<EquipmentItem, ReadError> {
    let slot = reader.read_u8()?;
    let raw_model = reader.read_u16()?;
    if !(FIRST_WEAPON_SLOT..=LAST_WEAPON_SLOT).contains(&slot) {
        // model extension
        reader.skip(1)?;
    }
    let color = if raw_model & MODEL_HAS_WIDE_COLOR != 0 {
        reader.read_u16()?
    } else if raw_model & MODEL_HAS_COLOR != 0 {
        reader.read_u8()? as u16
    } else {
        0
    };
    let effect = if raw_model & MODEL_HAS_EFFECT != 0 {
        profile.equipment_effect.read(reader)?
    } else {
        0
    };
    Ok(EquipmentItem {
        slot,
        model: raw_model & MODEL_MASK,
        color,
        effect,
    })
}

pub fn parse_npc_equipment(
    reader: &mut PacketReader<'_>,
    profile: &ProtocolProfile,
) -> Result<Event, ReadError> {
    let oid = reader.read_u16()?;
    // cloak and quiver state
    reader.skip(1)?;
    reader.skip(2)?;
    let active_weapon = reader.read_u8()?;
    let count = reader.read_u8()?;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(parse_equipment_item(reader, profile)?);
    }
    Ok(Event::NpcEquipment(NpcEquipmentUpdate {
        oid,
        active_weapon,
        items,
    }))
}

pub fn parse_object_spawn(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    // object id
    reader.skip(2)?;
    let emblem = reader.read_u16()?;
    let heading = reader.read_u16()?;
    let z = reader.read_u16()?;
    let x = reader.read_u32()?;
    let y = reader.read_u32()?;
    let model = reader.read_u16()?;
    let object_type = reader.read_u16()?;
    reader.skip(4)?;
    let name = reader.read_pascal_string()?;
    let flag = reader.read_u8()?;
    Ok(Event::ObjectSpawned(ObjectSpawn {
        emblem,
        heading,
        x,
        y,
        z,
        model,
        object_type,
        name,
        flag,
    }))
}

pub fn parse_emote(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    let oid = reader.read_u16()?;
    let emote = reader.read_u8()?;
    Ok(Event::Emote { oid, emote })
}

fn parse_merchant_listing(reader: &mut PacketReader<'_>) -> Result<MerchantListing, ReadError> {
    let slot = reader.read_u8()?;
    let level = reader.read_u8()?;
    let value1 = reader.read_u8()?;
    let spd_abs = reader.read_u8()?;
    let hand = reader.read_u8()? >> 6;
    let damage_and_type = reader.read_u8()?;
    let can_use = reader.read_u8()? == 0;
    let weight = reader.read_u16()?;
    let price = reader.read_u32()?;
    let model = reader.read_u16()?;
    let name = reader.read_pascal_string()?;
    Ok(MerchantListing {
        slot,
        level,
        value1,
        spd_abs,
        hand,
        damage_type: damage_and_type >> 6,
        object_type: damage_and_type & 0x3f,
        can_use,
        weight,
        price,
        model,
        name,
    })
}

pub fn parse_merchant_page(
    reader: &mut PacketReader<'_>,
    _: &ProtocolProfile,
) -> Result<Event, ReadError> {
    let count = reader.read_u8()?;
    // window type
    reader.skip(1)?;
    let page = reader.read_u8()?;
    reader.skip(1)?;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(parse_merchant_listing(reader)?);
    }
    Ok(Event::MerchantPage(MerchantPage { page, items }))
}

pub fn parse_delve(reader: &mut PacketReader<'_>, _: &ProtocolProfile) -> Result<Event, ReadError> {
    let item_name = reader.read_pascal_string()?;
    let text = reader.rest().to_vec();
    Ok(Event::Delve(DelveInfo { item_name, text }))
}

pub fn parse_ride(reader: &mut PacketReader<'_>, _: &ProtocolProfile) -> Result<Event, ReadError> {
    // rider oid
    reader.skip(2)?;
    let steed_oid = reader.read_u16()?;
    let riding = reader.read_u8()? != 0;
    Ok(Event::Ride { steed_oid, riding })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::net::packet::PacketWriter;

    fn profile(version: u16) -> ProtocolProfile {
        AppConfig::default().protocol_table().unwrap().profile_for(version)
    }

    fn decode(
        parse: fn(&mut PacketReader<'_>, &ProtocolProfile) -> Result<Event, ReadError>,
        body: &[u8],
        version: u16,
    ) -> Result<Event, ReadError> {
        let mut reader = PacketReader::new(body);
        parse(&mut reader, &profile(version))
    }

    fn login_body(major: u8, minor: u8, build: u8) -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.write_zeros(2)
            .write_u8(major)
            .write_u8(minor)
            .write_u8(build)
            .write_zeros(LOGIN_TRAILER);
        w.into_vec()
    }

    #[test]
    fn client_version_digits() {
        let event = decode(parse_client_version, &login_body(1, 7, 6), 176).unwrap();
        assert_eq!(event, Event::ClientVersion(176));
        let event = decode(parse_client_version, &login_body(1, 7, 0), 176).unwrap();
        assert_eq!(event, Event::ClientVersion(170));
    }

    #[test]
    fn client_version_requires_trailer() {
        let mut body = login_body(1, 7, 6);
        body.truncate(20);
        assert!(decode(parse_client_version, &body, 176).is_err());
    }

    #[test]
    fn character_select_realm_suffix() {
        let mut w = PacketWriter::new();
        w.write_fixed_string("hero-N", ACCOUNT_NAME_WIDTH);
        assert_eq!(
            decode(parse_character_select, w.as_slice(), 176).unwrap(),
            Event::RealmSelected(Some(Realm::Midgard))
        );
        let mut w = PacketWriter::new();
        w.write_fixed_string("hero", ACCOUNT_NAME_WIDTH);
        assert_eq!(
            decode(parse_character_select, w.as_slice(), 176).unwrap(),
            Event::RealmSelected(None)
        );
    }

    #[test]
    fn player_move_and_position() {
        let mut w = PacketWriter::new();
        w.write_zeros(4).write_u16(10).write_u16(2000).write_u16(3000).write_u8(7);
        assert_eq!(
            decode(parse_player_move, w.as_slice(), 176).unwrap(),
            Event::PlayerMoved(PlayerMove {
                zone: 7,
                x: 2000,
                y: 3000,
                z: 10
            })
        );

        let mut w = PacketWriter::new();
        w.write_u16(44)
            .write_u16(120)
            .write_u32(500_000)
            .write_u32(600_000)
            .write_u16(2048)
            .write_zeros(6)
            .write_u16(27)
            .write_zeros(2);
        assert_eq!(
            decode(parse_player_position, w.as_slice(), 176).unwrap(),
            Event::PlayerPosition(PlayerPosition {
                oid: 44,
                region: 27,
                x: 500_000,
                y: 600_000,
                z: 120,
                heading: 2048
            })
        );
    }

    #[test]
    fn zone_jump_and_interact() {
        let mut w = PacketWriter::new();
        w.write_u16(301).write_zeros(2);
        assert_eq!(
            decode(parse_zone_jump, w.as_slice(), 176).unwrap(),
            Event::ZoneJumpRequested { zone_point_id: 301 }
        );
        let mut w = PacketWriter::new();
        w.write_zeros(10).write_u16(88);
        assert_eq!(
            decode(parse_interact, w.as_slice(), 176).unwrap(),
            Event::Interact { npc_oid: 88 }
        );
    }

    fn npc_spawn_body(oid: u16, spawn_flags: u8, spawn_flags2: u8, name: &str, guild: &str) -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.write_u16(oid)
            .write_u16(0)
            .write_u16(1024)
            .write_u16(80)
            .write_u32(31_000)
            .write_u32(32_000)
            .write_zeros(2)
            .write_u16(12)
            .write_u8(50)
            .write_u8(20)
            .write_u8(spawn_flags)
            .write_u8(4)
            .write_u8(spawn_flags2)
            .write_zeros(3)
            .write_pascal_string(name)
            .write_pascal_string(guild)
            .write_u8(0);
        w.into_vec()
    }

    #[test]
    fn npc_spawn_flags_and_realm() {
        let body = npc_spawn_body(9, 0x40 | 0x20 | 0x02, 0x01 | 0x02, "Guard", "Town Guard");
        let Event::NpcSpawned(spawn) = decode(parse_npc_spawn, &body, 176).unwrap() else {
            panic!("expected npc spawn");
        };
        assert_eq!(spawn.oid, 9);
        assert_eq!(spawn.realm, Realm::Albion);
        assert!(spawn.has_equipment);
        assert_eq!(spawn.flags, flags::FLYING | flags::CANT_TARGET | flags::DONT_SHOW_NAME);
        assert_eq!((spawn.x, spawn.y, spawn.z), (31_000, 32_000, 80));
        assert_eq!(spawn.model, 12);
        assert_eq!(spawn.max_stick, 4);
        assert_eq!(spawn.name, "Guard");
        assert_eq!(spawn.guild, "Town Guard");
    }

    #[test]
    fn npc_spawn_stealth_from_either_byte() {
        let body = npc_spawn_body(1, 0x01, 0, "a", "");
        let Event::NpcSpawned(first) = decode(parse_npc_spawn, &body, 176).unwrap() else {
            panic!("expected npc spawn");
        };
        let body = npc_spawn_body(1, 0, 0x04, "a", "");
        let Event::NpcSpawned(second) = decode(parse_npc_spawn, &body, 176).unwrap() else {
            panic!("expected npc spawn");
        };
        assert_eq!(first.flags, flags::STEALTH);
        assert_eq!(second.flags, flags::STEALTH);
        assert_eq!(first.realm, Realm::None);
    }

    fn equipment_body(effect_word: bool) -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.write_u16(9).write_u8(0).write_zeros(2).write_u8(0xff).write_u8(3);
        // right hand, plain model, no extension byte
        w.write_u8(10).write_u16(4);
        // torso, wide color and effect, extension byte
        w.write_u8(25).write_u16(0x8000 | 0x2000 | 90).write_u8(1).write_u16(300);
        if effect_word {
            w.write_u16(0x0102);
        } else {
            w.write_u8(7);
        }
        // left hand, narrow color
        w.write_u8(11).write_u16(0x4000 | 61).write_u8(14);
        w.into_vec()
    }

    #[test]
    fn equipment_effect_width_follows_version() {
        let Event::NpcEquipment(old) = decode(parse_npc_equipment, &equipment_body(true), 171).unwrap()
        else {
            panic!("expected equipment");
        };
        assert_eq!(old.items[1].effect, 0x0102);

        let Event::NpcEquipment(new) = decode(parse_npc_equipment, &equipment_body(false), 176).unwrap()
        else {
            panic!("expected equipment");
        };
        assert_eq!(new.oid, 9);
        assert_eq!(new.active_weapon, 0xff);
        assert_eq!(
            new.items,
            vec![
                EquipmentItem {
                    slot: 10,
                    model: 4,
                    color: 0,
                    effect: 0
                },
                EquipmentItem {
                    slot: 25,
                    model: 90,
                    color: 300,
                    effect: 7
                },
                EquipmentItem {
                    slot: 11,
                    model: 61,
                    color: 14,
                    effect: 0
                },
            ]
        );
    }

    #[test]
    fn equipment_with_wrong_width_overruns() {
        // a 1.76 body read with the 1.71 layout runs short
        assert!(decode(parse_npc_equipment, &equipment_body(false), 171).is_err());
    }

    #[test]
    fn object_spawn_door_and_loot() {
        let mut w = PacketWriter::new();
        w.write_u16(1)
            .write_u16(3)
            .write_u16(90)
            .write_u16(10)
            .write_u32(100)
            .write_u32(200)
            .write_u16(55)
            .write_u16(0x14)
            .write_zeros(4)
            .write_pascal_string("Bag of Coins")
            .write_u8(0x04);
        let Event::ObjectSpawned(object) = decode(parse_object_spawn, w.as_slice(), 176).unwrap() else {
            panic!("expected object");
        };
        assert_eq!(object.emblem, 3);
        assert_eq!((object.x, object.y, object.z, object.heading), (100, 200, 10, 90));
        assert_eq!(object.model, 55);
        assert!(object.is_door());
        assert!(object.is_loot());
        assert_eq!(object.name, "Bag of Coins");
    }

    #[test]
    fn merchant_page_items() {
        let mut w = PacketWriter::new();
        w.write_u8(1).write_u8(0).write_u8(2).write_u8(0);
        w.write_u8(5)
            .write_u8(10)
            .write_u8(16)
            .write_u8(37)
            .write_u8(0x40)
            .write_u8((2 << 6) | 3)
            .write_u8(0)
            .write_u16(30)
            .write_u32(1200)
            .write_u16(4)
            .write_pascal_string("Short Sword");
        let Event::MerchantPage(page) = decode(parse_merchant_page, w.as_slice(), 176).unwrap() else {
            panic!("expected merchant page");
        };
        assert_eq!(page.page, 2);
        let item = &page.items[0];
        assert_eq!(item.slot, 5);
        assert_eq!(item.hand, 1);
        assert_eq!(item.damage_type, 2);
        assert_eq!(item.object_type, 3);
        assert!(item.can_use);
        assert_eq!(item.price, 1200);
        assert_eq!(item.name, "Short Sword");
    }

    #[test]
    fn delve_keeps_text_after_name() {
        let mut w = PacketWriter::new();
        w.write_pascal_string("Dirk").write_bytes(&[1, 1, b'x', 0]);
        assert_eq!(
            decode(parse_delve, w.as_slice(), 176).unwrap(),
            Event::Delve(DelveInfo {
                item_name: "Dirk".to_string(),
                text: vec![1, 1, b'x', 0]
            })
        );
    }

    #[test]
    fn ride_record() {
        let mut w = PacketWriter::new();
        w.write_u16(1).write_u16(77).write_u8(1);
        assert_eq!(
            decode(parse_ride, w.as_slice(), 176).unwrap(),
            Event::Ride {
                steed_oid: 77,
                riding: true
            }
        );
    }
}
