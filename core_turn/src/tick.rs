//! The sub-turn movement loop.
//!
//! A turn's movement is divided into fractional ticks. Each iteration finds
//! the smallest time step until any vehicle's next discrete move (floored by
//! an epsilon so the loop always advances), moves everything that is due,
//! and fires combat where mutually hostile objects share a sector. Actions
//! within one tick are simultaneous by definition, so the ability cache is
//! pinned for the duration of a tick and dropped between ticks, when damage
//! and supply changes must become visible.
//!
//! Movement order within a tick is shuffled once per tick from the turn's
//! seeded stream: no systematic first-mover advantage, same order on every
//! replay.

use rand::{seq::SliceRandom, Rng};
use sim_wire::ObjectId;

use crate::{
    battle::{BattleEngine, BattleRecord},
    orders::{resolve_destination, time_to_next_move},
    redact::refresh_memories,
    space::Loc,
    status::StatusSink,
    world::World,
};

/// Compute `world.next_tick_size` from the current tick and every pending
/// order. Infinite when nothing is scheduled, which ends the turn's
/// movement immediately.
pub fn compute_next_tick_size(world: &mut World) {
    let epsilon = world.config.tick_epsilon;
    let tick = world.current_tick;
    let mut min_wait = f64::INFINITY;
    for vehicle in &world.vehicles {
        if !vehicle.id.is_live() || vehicle.fog.memory {
            continue;
        }
        let Some(pos) = vehicle.orders.iter().position(|o| !o.complete) else {
            continue;
        };
        // Stranded or aimless vehicles must not drive the tick size toward
        // epsilon; they act (or complete for free) on someone else's tick or
        // at the end-of-turn pass.
        let Some(dest) = resolve_destination(world, &vehicle.orders[pos].body) else {
            continue;
        };
        if vehicle.loc == dest || vehicle.supply_remaining < world.config.supply_per_hop {
            continue;
        }
        let speed = world
            .design(vehicle.design)
            .map(|d| d.speed)
            .unwrap_or(0);
        let wait = time_to_next_move(true, speed, vehicle.hops_done, tick);
        min_wait = min_wait.min(wait);
    }
    world.next_tick_size = if min_wait.is_finite() && tick < 1.0 {
        (1.0 - tick).min(min_wait).max(epsilon)
    } else {
        f64::INFINITY
    };
}

/// Run the whole movement phase for this turn.
pub fn run_movement<R: Rng>(
    world: &mut World,
    battles: &mut dyn BattleEngine,
    rng: &mut R,
    status: &StatusSink,
    progress_share: f64,
) {
    world.current_tick = 0.0;
    for vehicle in &mut world.vehicles {
        vehicle.hops_done = 0;
    }

    // State changes during movement must be seen immediately by later
    // queries in the same phase.
    world.caches.abilities.disable();

    let mut did_last_tick = false;
    while !did_last_tick {
        // Within a tick everything is simultaneous; pin derived values.
        world.caches.abilities.enable();

        compute_next_tick_size(world);
        move_ships(world, battles, rng);
        world.current_tick += world.next_tick_size;
        if world.current_tick >= 1.0 {
            world.current_tick = 1.0;
            world.next_tick_size = 0.0;
            move_ships(world, battles, rng);
            did_last_tick = true;
        }

        stamp_foggables(world);
        refresh_memories(world);
        if world.next_tick_size.is_finite() {
            status.add_progress(progress_share * world.next_tick_size);
        }

        world.caches.abilities.disable();
    }
}

fn stamp_foggables(world: &mut World) {
    let now = world.timestamp();
    for sys in &mut world.systems {
        sys.fog.timestamp = now;
        for planet in &mut sys.planets {
            if !planet.fog.memory {
                planet.fog.timestamp = now;
            }
        }
    }
    for vehicle in &mut world.vehicles {
        if !vehicle.fog.memory {
            vehicle.fog.timestamp = now;
        }
    }
    for fleet in &mut world.fleets {
        if !fleet.fog.memory {
            fleet.fog.timestamp = now;
        }
    }
}

/// Move every vehicle whose next discrete action is due at the current
/// tick, in shuffled order, checking for combat after each one.
fn move_ships<R: Rng>(world: &mut World, battles: &mut dyn BattleEngine, rng: &mut R) {
    let mut movers: Vec<ObjectId> = world
        .vehicles
        .iter()
        .filter(|v| v.id.is_live() && !v.fog.memory && v.has_pending_orders())
        .map(|v| v.id)
        .collect();
    movers.shuffle(rng);

    for id in movers {
        // A battle earlier in this tick may have destroyed the mover.
        if world.vehicle(id).map(|v| !v.id.is_live()).unwrap_or(true) {
            continue;
        }
        let moved = execute_due_hops(world, id);

        let Some(vehicle) = world.vehicle(id) else {
            continue;
        };
        let loc = vehicle.loc;
        let owner = vehicle.owner;
        let speed = world
            .design(vehicle.design)
            .map(|d| d.speed.max(1))
            .unwrap_or(1);

        if moved {
            if let Some(si) = world.system_containing(loc) {
                if !world.systems[si].explored_by.contains(&owner) {
                    world.systems[si].explored_by.push(owner);
                }
            }
            // Shields come back up after moving; the next sector may not be
            // friendly.
            let max = world
                .vehicle(id)
                .and_then(|v| world.design(v.design))
                .map(|d| d.max_shields())
                .unwrap_or(0);
            if let Some(v) = world.vehicle_mut(id) {
                v.shields = max;
            }
        }

        maybe_trigger_battle(world, battles, rng, loc, owner, speed);
    }
}

struct HopPlan {
    speed: u16,
    hops_done: u16,
    supply: i64,
    loc: Loc,
    order_pos: usize,
    dest: Loc,
}

fn plan_next_hop(world: &World, id: ObjectId) -> Option<HopPlan> {
    let vehicle = world.vehicle(id)?;
    let speed = world.design(vehicle.design).map(|d| d.speed).unwrap_or(0);
    if speed == 0 || vehicle.hops_done >= speed {
        return None;
    }
    let order_pos = vehicle.orders.iter().position(|o| !o.complete)?;
    // Unresolvable destinations stall here; completion of dead-target
    // orders happens in the end-of-turn sweep.
    let dest = resolve_destination(world, &vehicle.orders[order_pos].body)?;
    Some(HopPlan {
        speed,
        hops_done: vehicle.hops_done,
        supply: vehicle.supply_remaining,
        loc: vehicle.loc,
        order_pos,
        dest,
    })
}

/// Execute every hop of `id`'s orders that is due at the current tick.
/// Returns true when the vehicle actually changed sectors.
fn execute_due_hops(world: &mut World, id: ObjectId) -> bool {
    let epsilon = world.config.tick_epsilon;
    let supply_per_hop = world.config.supply_per_hop;
    let mut moved = false;

    loop {
        let Some(plan) = plan_next_hop(world, id) else {
            break;
        };

        if plan.loc == plan.dest {
            if let Some(v) = world.vehicle_mut(id) {
                v.orders[plan.order_pos].complete = true;
            }
            continue;
        }

        let due = f64::from(plan.hops_done + 1) / f64::from(plan.speed)
            <= world.current_tick + epsilon;
        if !due {
            break;
        }
        if plan.supply < supply_per_hop {
            // Stranded. The order stays pending; a depot or tanker can fix
            // it next turn.
            break;
        }

        let next = plan.loc.step_toward(plan.dest);
        let arrived = next == plan.dest;
        if let Some(v) = world.vehicle_mut(id) {
            v.supply_remaining -= supply_per_hop;
            v.loc = next;
            v.hops_done += 1;
            if arrived {
                v.orders[plan.order_pos].complete = true;
            }
        }
        moved = true;
    }
    moved
}

fn maybe_trigger_battle<R: Rng>(
    world: &mut World,
    battles: &mut dyn BattleEngine,
    rng: &mut R,
    loc: Loc,
    mover_owner: sim_wire::EmpireId,
    mover_speed: u16,
) {
    let hostiles_present = sector_has_hostiles(world, loc, mover_owner);
    if !hostiles_present {
        return;
    }

    let now = world.timestamp();
    let cooldown = 1.0 / f64::from(mover_speed.max(1));
    if let Some(last) = world.caches.battle_timestamps.get(&loc) {
        if now - last < cooldown {
            return;
        }
    }

    let result = battles.resolve(world, loc, rng);
    tracing::info!(
        target: "starfall::tick",
        %loc,
        timestamp = now,
        participants = result.participants.len(),
        "battle resolved"
    );
    let record = BattleRecord {
        loc,
        turn: world.turn_number,
        timestamp: now,
        participants: result.participants.clone(),
        events: result.events.clone(),
    };
    world.battles.push(record);
    for empire in &result.participants {
        world.log_to(
            *empire,
            format!("A battle has taken place at {loc}."),
            None,
        );
    }
    world.caches.battle_timestamps.insert(loc, now);
}

fn sector_has_hostiles(world: &World, loc: Loc, owner: sim_wire::EmpireId) -> bool {
    let vehicle_hostile = world
        .vehicles_at(loc)
        .into_iter()
        .any(|vi| world.are_hostile(world.vehicles[vi].owner, owner));
    if vehicle_hostile {
        return true;
    }
    world.systems.iter().any(|sys| {
        sys.planets.iter().any(|p| {
            p.id.is_live()
                && p.loc == loc
                && p.colony
                    .as_ref()
                    .is_some_and(|c| world.are_hostile(c.owner, owner))
        })
    })
}
