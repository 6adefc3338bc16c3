use std::io::BufRead;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::entities::npc::{Mob, NpcClass};
use crate::extract::{Pass, PhaseContext};
use crate::lang::LanguageTable;
use crate::net::record::Direction;
use crate::persistence::store::WorldStore;
use crate::protocol::{Event, NpcSpawn, OPCODE_NPC_EQUIPMENT};
use crate::reconcile::equipment::{equipment_cache, persist_equipment, EquipmentSet};
use crate::reconcile::signature::structural_id;
use crate::reconcile::TemplateCache;

pub const MOBS: &str = "mobs";
pub const MOBS_CREATED: &str = "mobs_created";
pub const MOBS_UPDATED: &str = "mobs_updated";
pub const EQUIPMENT_CREATED: &str = "equipment_created";
pub const EQUIPMENT_REUSED: &str = "equipment_reused";
pub const EQUIPMENT_ITEMS: &str = "equipment_items";

/// Guild labels that name a service class exactly.
const SERVICE_CLASSES: [(&str, NpcClass); 4] = [
    ("vault_keeper_string", NpcClass::VaultKeeper),
    ("healer_string", NpcClass::Healer),
    ("smith_string", NpcClass::Blacksmith),
    ("enchanter_string", NpcClass::Enchanter),
];

pub fn class_for_guild(lang: &LanguageTable, guild: &str) -> Option<NpcClass> {
    SERVICE_CLASSES
        .iter()
        .find(|(key, _)| lang.equals(key, guild))
        .map(|(_, class)| *class)
}

pub fn mob_id(region: u16, spawn: &NpcSpawn) -> String {
    structural_id("mob", |b| {
        b.u16(region)
            .u32(spawn.x)
            .u32(spawn.y)
            .u16(spawn.z)
            .u16(spawn.model);
    })
}

pub fn run<R: BufRead, S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
) -> Result<(), ExtractError> {
    let mut templates = equipment_cache(&*ctx.store)?;
    while let Some((_, event)) = pass.next_event()? {
        match event {
            Event::PlayerPosition(position) => ctx.session.observe_position(&position),
            Event::NpcSpawned(spawn) => {
                if !ctx.session.first_sighting(spawn.oid) {
                    continue;
                }
                let equipment = if spawn.has_equipment {
                    equipment_follow_up(pass, spawn.oid)?
                } else {
                    None
                };
                record_mob(ctx, &mut templates, &spawn, equipment)?;
            }
            _ => {}
        }
    }
    let stats = templates.stats();
    debug!(preloaded = stats.preloaded, "equipment templates known before the pass");
    Ok(())
}

/// Equipment arrives in the record right after the spawn. Anything else there
/// goes back to the reader untouched.
fn equipment_follow_up<R: BufRead>(
    pass: &mut Pass<'_, R>,
    oid: u16,
) -> Result<Option<EquipmentSet>, ExtractError> {
    let Some(record) = pass.next_record()? else {
        return Ok(None);
    };
    if !record.is(Direction::Incoming, OPCODE_NPC_EQUIPMENT) {
        pass.push_back(record);
        return Ok(None);
    }
    match pass.decode(&record)? {
        Some(Event::NpcEquipment(update)) if update.oid == oid => {
            let mut set = EquipmentSet::new();
            for item in update.items {
                set.add(item);
            }
            Ok(Some(set))
        }
        _ => {
            pass.push_back(record);
            Ok(None)
        }
    }
}

fn record_mob<S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    templates: &mut TemplateCache,
    spawn: &NpcSpawn,
    equipment: Option<EquipmentSet>,
) -> Result<(), ExtractError> {
    let region = ctx.session.region_or_default();
    ctx.stats.bump(MOBS);

    let existing = ctx.store.find(|mob: &Mob| {
        mob.region == region
            && mob.x == spawn.x
            && mob.y == spawn.y
            && mob.z == spawn.z
            && mob.model == spawn.model
    })?;
    let is_new = existing.is_none();
    let mut mob = existing.unwrap_or_else(|| Mob {
        id: mob_id(region, spawn),
        ..Mob::default()
    });

    mob.name = spawn.name.clone();
    mob.guild = spawn.guild.clone();
    mob.region = region;
    mob.realm = spawn.realm;
    mob.x = spawn.x;
    mob.y = spawn.y;
    mob.z = spawn.z;
    mob.heading = spawn.heading;
    mob.speed = spawn.speed;
    mob.model = spawn.model;
    mob.size = spawn.size;
    mob.level = spawn.level;
    mob.flags = spawn.flags;
    mob.max_stick = spawn.max_stick;
    mob.aggro_level = ctx.config.aggro_level;
    mob.aggro_range = ctx.config.aggro_range;
    if let Some(class) = class_for_guild(ctx.lang, &spawn.guild) {
        mob.class = class;
    }

    mob.equipment_template = match equipment {
        Some(set) if !set.is_empty() => {
            let resolution = templates.reconcile(&mut *ctx.store, &set, |store, id| {
                persist_equipment(store, &set, id)
            })?;
            if resolution.is_created() {
                ctx.stats.bump(EQUIPMENT_CREATED);
                ctx.stats.add(EQUIPMENT_ITEMS, set.len() as u64);
            } else {
                ctx.stats.bump(EQUIPMENT_REUSED);
            }
            Some(resolution.template_id().to_string())
        }
        Some(_) => {
            warn!(oid = spawn.oid, name = %spawn.name, "empty equipment record");
            None
        }
        None => None,
    };

    if is_new {
        ctx.store.insert(mob)?;
        ctx.stats.bump(MOBS_CREATED);
    } else {
        ctx.store.update(mob)?;
        ctx.stats.bump(MOBS_UPDATED);
    }
    Ok(())
}
