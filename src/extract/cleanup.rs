use std::io::BufRead;
use tracing::debug;

use crate::entities::npc::Mob;
use crate::entities::world::WorldObject;
use crate::error::ExtractError;
use crate::extract::{Pass, PhaseContext};
use crate::persistence::store::WorldStore;
use crate::protocol::{Event, NpcSpawn, ObjectSpawn};
use crate::tables;

pub const STEEDS_DELETED: &str = "steeds_deleted";
pub const PETS_DELETED: &str = "pets_deleted";
pub const PLACEHOLDERS_DELETED: &str = "placeholders_deleted";
pub const OBJECTS_DELETED: &str = "objects_deleted";

/// Model the server uses for invisible placeholder creatures.
pub const PLACEHOLDER_MODEL: u16 = 666;

/// A steed standing still, waiting for a rider.
struct ParkedSteed {
    oid: u16,
    region: u16,
    spawn: NpcSpawn,
}

pub fn run<R: BufRead, S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
) -> Result<(), ExtractError> {
    let mut parked: Option<ParkedSteed> = None;
    while let Some((_, event)) = pass.next_event()? {
        match event {
            Event::PlayerPosition(position) => ctx.session.observe_position(&position),
            Event::NpcSpawned(spawn) => {
                let region = ctx.session.region_or_default();
                if tables::models().is_steed(spawn.model) {
                    if spawn.speed == 0 {
                        parked = Some(ParkedSteed {
                            oid: spawn.oid,
                            region,
                            spawn,
                        });
                    } else {
                        let deleted = delete_steed(&mut *ctx.store, region, &spawn)?;
                        ctx.stats.add(STEEDS_DELETED, deleted);
                    }
                } else if is_pet(ctx, &spawn.guild) {
                    let deleted = delete_mobs(&mut *ctx.store, |mob| mob.guild == spawn.guild)?;
                    ctx.stats.add(PETS_DELETED, deleted);
                } else if spawn.model == PLACEHOLDER_MODEL {
                    let placeholder = ctx.store.find(|mob: &Mob| mob.model == PLACEHOLDER_MODEL)?;
                    if let Some(mob) = placeholder {
                        if ctx.store.delete::<Mob>(&mob.id)? {
                            ctx.stats.bump(PLACEHOLDERS_DELETED);
                        }
                    }
                }
            }
            Event::Ride { steed_oid, riding } => {
                if !riding || parked.as_ref().map(|steed| steed.oid) != Some(steed_oid) {
                    continue;
                }
                if let Some(steed) = parked.take() {
                    let deleted = delete_steed(&mut *ctx.store, steed.region, &steed.spawn)?;
                    ctx.stats.add(STEEDS_DELETED, deleted);
                }
            }
            Event::ObjectSpawned(object) => {
                if !is_transient(ctx, &object) {
                    continue;
                }
                let region = ctx.session.region_or_default();
                let deleted = delete_objects(&mut *ctx.store, region, &object)?;
                ctx.stats.add(OBJECTS_DELETED, deleted);
            }
            _ => {}
        }
    }
    Ok(())
}

fn is_pet<S>(ctx: &PhaseContext<'_, S>, guild: &str) -> bool {
    let label = ctx.lang.get("pet_string");
    !label.is_empty() && guild.ends_with(label)
}

/// Graves, dropped coins and loot piles.
fn is_transient<S>(ctx: &PhaseContext<'_, S>, object: &ObjectSpawn) -> bool {
    object.is_loot()
        || ctx.lang.found_in("grave_string", &object.name)
        || ctx.lang.found_in("bag_of_coins_string", &object.name)
}

fn delete_mobs<S, P>(store: &mut S, predicate: P) -> Result<u64, ExtractError>
where
    S: WorldStore,
    P: Fn(&Mob) -> bool,
{
    let mut deleted = 0;
    for mob in store.find_all(predicate)? {
        if store.delete::<Mob>(&mob.id)? {
            debug!(id = %mob.id, name = %mob.name, "mob removed");
            deleted += 1;
        }
    }
    Ok(deleted)
}

fn delete_steed<S: WorldStore>(
    store: &mut S,
    region: u16,
    spawn: &NpcSpawn,
) -> Result<u64, ExtractError> {
    delete_mobs(store, |mob| {
        mob.name == spawn.name
            && mob.guild == spawn.guild
            && mob.region == region
            && mob.realm == spawn.realm
            && mob.x == spawn.x
            && mob.y == spawn.y
            && mob.z == spawn.z
            && mob.heading == spawn.heading
            && mob.model == spawn.model
            && mob.level == spawn.level
            && mob.size == spawn.size
            && mob.speed == spawn.speed
    })
}

fn delete_objects<S: WorldStore>(
    store: &mut S,
    region: u16,
    object: &ObjectSpawn,
) -> Result<u64, ExtractError> {
    let mut deleted = 0;
    let matching = store.find_all(|stored: &WorldObject| {
        stored.name == object.name
            && stored.x == object.x
            && stored.y == object.y
            && stored.z == object.z
            && stored.heading == object.heading
            && stored.region == region
    })?;
    for stored in matching {
        if store.delete::<WorldObject>(&stored.id)? {
            deleted += 1;
        }
    }
    Ok(deleted)
}
