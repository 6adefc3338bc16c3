use std::io::BufRead;
use tracing::debug;

use crate::entities::world::ZonePoint;
use crate::error::ExtractError;
use crate::extract::{Pass, PhaseContext};
use crate::persistence::store::WorldStore;
use crate::protocol::Event;

pub const ZONE_POINTS: &str = "zone_points";
pub const CREATED: &str = "created";
pub const UPDATED: &str = "updated";

pub fn run<R: BufRead, S: WorldStore>(
    ctx: &mut PhaseContext<'_, S>,
    pass: &mut Pass<'_, R>,
) -> Result<(), ExtractError> {
    while let Some((_, event)) = pass.next_event()? {
        match event {
            Event::RealmSelected(Some(realm)) => ctx.session.select_realm(realm),
            Event::ZoneJumpRequested { zone_point_id } => {
                let realm = ctx.session.realm();
                let key = ZonePoint::new(zone_point_id, realm).id;
                let zone_point = ctx
                    .store
                    .get::<ZonePoint>(&key)?
                    .unwrap_or_else(|| ZonePoint::new(zone_point_id, realm));
                ctx.session.arm_zone_point(zone_point);
            }
            Event::PlayerPosition(position) => {
                let Some(mut zone_point) = ctx.session.take_zone_point() else {
                    continue;
                };
                zone_point.target_region = position.region;
                zone_point.target_x = position.x;
                zone_point.target_y = position.y;
                zone_point.target_z = position.z;
                zone_point.target_heading = position.heading;
                debug!(
                    id = %zone_point.id,
                    region = position.region,
                    "zone point destination"
                );
                ctx.stats.bump(ZONE_POINTS);
                if ctx.store.upsert(zone_point)? {
                    ctx.stats.bump(CREATED);
                } else {
                    ctx.stats.bump(UPDATED);
                }
            }
            _ => {}
        }
    }
    Ok(())
}
