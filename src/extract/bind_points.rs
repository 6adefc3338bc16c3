use std::io::BufRead;

use crate::entities::world::BindPoint;
use crate::entities::Realm;
use crate::error::ExtractError;
use crate::extract::{Pass, PhaseContext};
use crate::persistence::store::WorldStore;
use crate::protocol::{Event, EMOTE_BIND};
use crate::reconcile::signature::structural_id;
use crate::session::PlayerState;

pub const BIND_POINTS: &str = "bind_points";
pub const CREATED: &str = "created";

pub fn bind_point_id(region: u16, realm: Realm, player: &PlayerState) -> String {
    structural_id("bind point", |b| {
        b.u32(player.x)
            .u32(player.y)
            .u16(player.z)
            .u16(region)
            .u8(realm.id());
    })
}

pub fn run<R: BufRead, S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
) -> Result<(), ExtractError> {
    while let Some((_, event)) = pass.next_event()? {
        match event {
            Event::RealmSelected(Some(realm)) => ctx.session.select_realm(realm),
            Event::PlayerPosition(position) => ctx.session.observe_position(&position),
            Event::PlayerMoved(movement) => {
                let offset = ctx.config.zone_offset(movement.zone);
                ctx.session.apply_move(&movement, offset);
            }
            Event::Emote { oid, emote } if emote == EMOTE_BIND => {
                let Some(player) = ctx.session.player() else {
                    continue;
                };
                if player.oid != oid {
                    continue;
                }
                record_bind(ctx, &player)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn record_bind<S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    player: &PlayerState,
) -> Result<(), ExtractError> {
    let region = ctx.session.region_or_default();
    let realm = ctx.session.realm();
    ctx.stats.bump(BIND_POINTS);
    let known = ctx.store.find(|bind: &BindPoint| {
        bind.x == player.x
            && bind.y == player.y
            && bind.z == player.z
            && bind.region == region
            && bind.realm == realm
    })?;
    if known.is_none() {
        ctx.store.insert(BindPoint {
            id: bind_point_id(region, realm, player),
            region,
            realm,
            x: player.x,
            y: player.y,
            z: player.z,
            radius: ctx.config.bind_radius,
        })?;
        ctx.stats.bump(CREATED);
    }
    Ok(())
}
