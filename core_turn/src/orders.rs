//! Movement orders and waypoints.
//!
//! Orders are referrable so clients can create, reference, and remove them
//! by id. Completed orders linger until the end-of-turn sweep disposes them,
//! which keeps their ids stable for the whole turn they completed in.

use serde::{Deserialize, Serialize};
use sim_wire::ObjectId;

use crate::{space::Loc, world::World};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: ObjectId,
    pub body: OrderBody,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderBody {
    MoveTo { dest: MoveTarget },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MoveTarget {
    Sector(Loc),
    Waypoint(ObjectId),
}

/// A movement anchor. Waypoints either pin a fixed cell or follow another
/// object; ones whose followed object is gone are orphans and get swept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: ObjectId,
    pub anchor: WaypointAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaypointAnchor {
    Fixed(Loc),
    Object(ObjectId),
}

impl Waypoint {
    /// Where the waypoint currently points, if its anchor still exists.
    pub fn resolve(&self, world: &World) -> Option<Loc> {
        match self.anchor {
            WaypointAnchor::Fixed(loc) => Some(loc),
            WaypointAnchor::Object(id) => world.location_of(id),
        }
    }

    pub fn is_orphaned(&self, world: &World) -> bool {
        self.resolve(world).is_none()
    }
}

/// Destination of an order, if it can still be resolved.
pub fn resolve_destination(world: &World, body: &OrderBody) -> Option<Loc> {
    match body {
        OrderBody::MoveTo { dest } => match dest {
            MoveTarget::Sector(loc) => Some(*loc),
            MoveTarget::Waypoint(id) => world
                .waypoints
                .iter()
                .find(|w| w.id == *id)
                .and_then(|w| w.resolve(world)),
        },
    }
}

/// Fraction of a turn until the vehicle's next discrete move, from the
/// perspective of `current_tick`. Infinite when the vehicle has nothing to
/// do or no movement left this turn.
pub fn time_to_next_move(
    has_orders: bool,
    speed: u16,
    hops_done: u16,
    current_tick: f64,
) -> f64 {
    if !has_orders || speed == 0 || hops_done >= speed {
        return f64::INFINITY;
    }
    let due = f64::from(hops_done + 1) / f64::from(speed);
    (due - current_tick).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_move_spacing_follows_speed() {
        // speed 2: moves due at t=0.5 and t=1.0
        assert_eq!(time_to_next_move(true, 2, 0, 0.0), 0.5);
        assert_eq!(time_to_next_move(true, 2, 1, 0.5), 0.5);
        assert_eq!(time_to_next_move(true, 2, 2, 1.0), f64::INFINITY);
    }

    #[test]
    fn idle_or_immobile_vehicles_never_schedule() {
        assert_eq!(time_to_next_move(false, 3, 0, 0.0), f64::INFINITY);
        assert_eq!(time_to_next_move(true, 0, 0, 0.0), f64::INFINITY);
    }
}
