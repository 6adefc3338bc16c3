use std::collections::{HashMap, HashSet};

use crate::config::ZoneOffset;
use crate::entities::world::ZonePoint;
use crate::entities::Realm;
use crate::protocol::{PlayerMove, PlayerPosition};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub oid: u16,
    pub x: u32,
    pub y: u32,
    pub z: u16,
}

/// Correlation state carried through one pass over the log. Built fresh for
/// every phase.
#[derive(Debug, Default)]
pub struct ParseSession {
    region: Option<u16>,
    realm: Realm,
    player: Option<PlayerState>,
    /// Merchant the player last opened. Valid until the next interaction or
    /// until its item list has been read.
    interacting: Option<u16>,
    /// Zone point waiting for its destination. Valid until the next player
    /// position record.
    pending_zone_point: Option<ZonePoint>,
    seen: HashMap<u16, HashSet<u16>>,
}

impl ParseSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self) -> Option<u16> {
        self.region
    }

    /// Region of records seen before the first position record.
    pub fn region_or_default(&self) -> u16 {
        self.region.unwrap_or_default()
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    pub fn select_realm(&mut self, realm: Realm) {
        self.realm = realm;
    }

    pub fn player(&self) -> Option<PlayerState> {
        self.player
    }

    pub fn observe_position(&mut self, position: &PlayerPosition) {
        self.region = Some(position.region);
        self.player = Some(PlayerState {
            oid: position.oid,
            x: position.x,
            y: position.y,
            z: position.z,
        });
        self.seen.entry(position.region).or_default();
    }

    /// Moves carry zone-relative coordinates. Ignored until the player's
    /// object id is known.
    pub fn apply_move(&mut self, movement: &PlayerMove, offset: ZoneOffset) {
        if let Some(player) = self.player.as_mut() {
            player.x = shift(movement.x, offset.x);
            player.y = shift(movement.y, offset.y);
            player.z = movement.z;
        }
    }

    /// True the first time `oid` is seen in the current region.
    pub fn first_sighting(&mut self, oid: u16) -> bool {
        self.seen
            .entry(self.region_or_default())
            .or_default()
            .insert(oid)
    }

    pub fn arm_interaction(&mut self, npc_oid: u16) {
        self.interacting = Some(npc_oid);
    }

    pub fn interaction(&self) -> Option<u16> {
        self.interacting
    }

    pub fn disarm_interaction(&mut self) {
        self.interacting = None;
    }

    pub fn arm_zone_point(&mut self, zone_point: ZonePoint) {
        self.pending_zone_point = Some(zone_point);
    }

    pub fn take_zone_point(&mut self) -> Option<ZonePoint> {
        self.pending_zone_point.take()
    }
}

fn shift(value: u16, offset: i32) -> u32 {
    (value as i64 + offset as i64).clamp(0, u32::MAX as i64) as u32
}
