use std::io::BufRead;

use crate::entities::world::{WorldObject, STATIC_ITEM_CLASS};
use crate::error::ExtractError;
use crate::extract::{Pass, PhaseContext};
use crate::persistence::store::WorldStore;
use crate::protocol::{Event, ObjectSpawn};
use crate::reconcile::signature::structural_id;

pub const OBJECTS: &str = "objects";
pub const DOORS_SKIPPED: &str = "doors_skipped";
pub const CREATED: &str = "created";
pub const UPDATED: &str = "updated";

pub fn object_id(region: u16, object: &ObjectSpawn) -> String {
    structural_id("world object", |b| {
        b.u16(region)
            .u32(object.x)
            .u32(object.y)
            .u16(object.z)
            .u16(object.heading);
    })
}

pub fn run<R: BufRead, S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
) -> Result<(), ExtractError> {
    while let Some((_, event)) = pass.next_event()? {
        match event {
            Event::PlayerPosition(position) => ctx.session.observe_position(&position),
            Event::ObjectSpawned(object) => {
                if object.is_door() {
                    ctx.stats.bump(DOORS_SKIPPED);
                    continue;
                }
                record_object(ctx, &object)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn record_object<S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    object: &ObjectSpawn,
) -> Result<(), ExtractError> {
    let region = ctx.session.region_or_default();
    ctx.stats.bump(OBJECTS);
    let existing = ctx.store.find(|stored: &WorldObject| {
        stored.region == region
            && stored.x == object.x
            && stored.y == object.y
            && stored.z == object.z
            && stored.heading == object.heading
    })?;
    match existing {
        Some(mut stored) => {
            stored.name = object.name.clone();
            stored.model = object.model;
            stored.emblem = object.emblem;
            ctx.store.update(stored)?;
            ctx.stats.bump(UPDATED);
        }
        None => {
            ctx.store.insert(WorldObject {
                id: object_id(region, object),
                class_name: STATIC_ITEM_CLASS.to_string(),
                name: object.name.clone(),
                region,
                x: object.x,
                y: object.y,
                z: object.z,
                heading: object.heading,
                model: object.model,
                emblem: object.emblem,
            })?;
            ctx.stats.bump(CREATED);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::extract::fixture::{LogBuilder, Object};
    use crate::extract::{Phase, PhaseStats};
    use crate::lang::LanguageTable;
    use crate::net::record::RecordReader;
    use crate::persistence::memory::MemoryStore;
    use crate::protocol::DecoderTable;
    use std::io::Cursor;
    use std::path::Path;

    fn run_log(store: &mut MemoryStore, text: &str) -> PhaseStats {
        let config = AppConfig::default();
        let lang = LanguageTable::default();
        let decoders = DecoderTable::standard();
        let profile = config.protocol_table().unwrap().profile_for(176);
        let reader = RecordReader::new(Cursor::new(text.as_bytes().to_vec()));
        let mut pass =
            Pass::new(Path::new("mem.log"), reader, &decoders, profile, Phase::WorldObjects)
                .unwrap();
        let mut ctx = PhaseContext::new(store, &config, &lang, Phase::WorldObjects);
        run(&mut ctx, &mut pass).unwrap();
        ctx.stats
    }

    fn well() -> Object {
        Object {
            heading: 90,
            x: 31_000,
            y: 42_000,
            z: 300,
            model: 1432,
            name: "well",
            ..Object::default()
        }
    }

    #[test]
    fn second_pass_finds_the_stored_object() {
        let text = LogBuilder::new()
            .position(1, 27, 0, 0, 0, 0)
            .object(&well())
            .finish();
        let mut store = MemoryStore::new();
        let first = run_log(&mut store, &text);
        assert_eq!(first.get(CREATED), 1);

        let second = run_log(&mut store, &text);
        assert_eq!(second.get(CREATED), 0);
        assert_eq!(second.get(UPDATED), 1);
        assert_eq!(store.count::<WorldObject>(), 1);
        let stored = store.all::<WorldObject>().unwrap().remove(0);
        assert_eq!(stored.class_name, STATIC_ITEM_CLASS);
        assert_eq!(stored.region, 27);
    }

    #[test]
    fn doors_are_not_stored() {
        let text = LogBuilder::new()
            .position(1, 27, 0, 0, 0, 0)
            .object(&Object {
                flag: 0x04,
                ..well()
            })
            .finish();
        let mut store = MemoryStore::new();
        let stats = run_log(&mut store, &text);
        assert_eq!(stats.get(DOORS_SKIPPED), 1);
        assert_eq!(store.count::<WorldObject>(), 0);
    }

    #[test]
    fn same_spot_in_another_region_is_a_new_object() {
        let text = LogBuilder::new()
            .position(1, 27, 0, 0, 0, 0)
            .object(&well())
            .position(1, 28, 0, 0, 0, 0)
            .object(&well())
            .finish();
        let mut store = MemoryStore::new();
        let stats = run_log(&mut store, &text);
        assert_eq!(stats.get(CREATED), 2);
    }
}
