//! Producing a player's view of the world.
//!
//! Redaction clones the host world (the caller owns that clone), then strips
//! it down to exactly what one empire is entitled to see:
//!
//! 1. anything below `Fogged` disappears outright,
//! 2. fogged objects are served from the viewer's memory snapshots where
//!    they exist, with the served copy flagged as memory,
//! 3. everything scanned or better is served live, minus viewer-specific
//!    secrets (foreign orders, supplies, queues, other empires' logs,
//!    commands, research, and unexplored system names).
//!
//! The whole pass is idempotent: redacting an already-redacted view changes
//! nothing, which is also what makes re-serving a player file safe.

use sim_wire::{EmpireId, ObjectId};

use crate::{
    config::ScoreVisibility,
    economy::compute_score,
    empire::MemoryRecord,
    visibility::{
        design_visibility, fleet_visibility, planet_visibility, vehicle_visibility, Visibility,
    },
    world::{EntityTag, World},
};

/// Reduce the world to what `viewer` may see. Operates in place on a copy
/// of the host state.
pub fn redact_world(world: &mut World, viewer: EmpireId) {
    // Scores are computed from the full state, before anything is removed.
    // Only the host copy captures them; re-redacting a view must not
    // rewrite score history from partial data.
    if world.viewpoint.is_none() {
        let turn = world.turn_number;
        let empire_ids: Vec<EmpireId> = world.empires.iter().map(|e| e.id).collect();
        for id in &empire_ids {
            let score = compute_score(world, *id);
            if let Some(emp) = world.empire_mut(*id) {
                emp.scores.insert(turn, score);
            }
        }
    }

    world.viewpoint = Some(viewer);
    let memory = world
        .empire(viewer)
        .map(|e| e.memory.clone())
        .unwrap_or_default();

    redact_vehicles(world, viewer, &memory);
    redact_planets(world, viewer, &memory);
    redact_systems(world, viewer);
    redact_fleets(world, viewer, &memory);
    redact_designs(world, viewer);
    redact_battles(world, viewer);
    redact_empires(world, viewer);

    world.purge_disposed();
    if let Err(err) = world.assign_ids() {
        tracing::error!(target: "starfall::redact", %err, "id sweep failed after redaction");
    }
}

fn redact_vehicles(
    world: &mut World,
    viewer: EmpireId,
    memory: &std::collections::BTreeMap<i64, MemoryRecord>,
) {
    let verdicts: Vec<(usize, ObjectId, bool, Visibility)> = world
        .vehicles
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.id.is_tombstone())
        .map(|(vi, v)| (vi, v.id, v.fog.memory, vehicle_visibility(world, v, viewer)))
        .collect();

    let mut registry = std::mem::take(&mut world.registry);
    for (vi, id, was_memory, vis) in verdicts {
        if was_memory {
            // A memory copy is only visible to the empire remembering it.
            if !memory.contains_key(&id.0) {
                registry.release(&mut world.vehicles[vi].id);
            }
            continue;
        }
        if vis < Visibility::Fogged {
            registry.release(&mut world.vehicles[vi].id);
            continue;
        }
        if vis == Visibility::Fogged {
            if let Some(MemoryRecord::Vehicle(remembered)) = memory.get(&id.0) {
                let mut served = remembered.clone();
                served.id = id;
                served.fog.memory = true;
                world.vehicles[vi] = served;
            }
        }
        strip_vehicle(world, vi, viewer, vis);
    }
    world.registry = registry;
}

fn strip_vehicle(world: &mut World, vi: usize, viewer: EmpireId, vis: Visibility) {
    let v = &mut world.vehicles[vi];
    if v.owner == viewer {
        return;
    }
    // Orders are private, full stop.
    v.orders.clear();
    if vis < Visibility::Visible {
        v.supply_remaining = 0;
    }
    if vis < Visibility::Scanned {
        v.shields = 0;
        v.hull_damage = 0;
    }
}

fn redact_planets(
    world: &mut World,
    viewer: EmpireId,
    memory: &std::collections::BTreeMap<i64, MemoryRecord>,
) {
    let mut verdicts: Vec<(usize, usize, ObjectId, bool, Visibility)> = Vec::new();
    for (si, sys) in world.systems.iter().enumerate() {
        for (pi, planet) in sys.planets.iter().enumerate() {
            if planet.id.is_tombstone() {
                continue;
            }
            verdicts.push((
                si,
                pi,
                planet.id,
                planet.fog.memory,
                planet_visibility(world, planet, viewer),
            ));
        }
    }

    let mut registry = std::mem::take(&mut world.registry);
    for (si, pi, id, was_memory, vis) in verdicts {
        if was_memory {
            if !memory.contains_key(&id.0) {
                registry.release(&mut world.systems[si].planets[pi].id);
            }
            continue;
        }
        if vis < Visibility::Fogged {
            registry.release(&mut world.systems[si].planets[pi].id);
            continue;
        }
        if vis == Visibility::Fogged {
            if let Some(MemoryRecord::Planet(remembered)) = memory.get(&id.0) {
                let mut served = remembered.clone();
                served.id = id;
                served.fog.memory = true;
                world.systems[si].planets[pi] = served;
            }
        }
        strip_planet(world, si, pi, viewer, vis);
    }
    world.registry = registry;
}

fn strip_planet(world: &mut World, si: usize, pi: usize, viewer: EmpireId, vis: Visibility) {
    let planet = &mut world.systems[si].planets[pi];
    let Some(colony) = planet.colony.as_mut() else {
        return;
    };
    if colony.owner == viewer {
        return;
    }
    // Another empire's build queue is never shown.
    colony.queue.orders.clear();
    if vis < Visibility::Scanned {
        colony.population = 0;
        colony.population_cargo = 0;
        colony.facilities.clear();
    } else {
        colony.population_cargo = 0;
    }
}

fn redact_systems(world: &mut World, viewer: EmpireId) {
    for si in 0..world.systems.len() {
        let explored = world.systems[si].explored_by.contains(&viewer);
        let sys = &mut world.systems[si];
        if explored {
            // Exploration state of other empires is hidden.
            sys.explored_by.retain(|e| *e == viewer);
        } else {
            // Unexplored systems keep their position on the map but give
            // away nothing else.
            sys.name.clear();
            sys.description.clear();
            sys.explored_by.clear();
        }
    }
}

fn redact_fleets(
    world: &mut World,
    viewer: EmpireId,
    memory: &std::collections::BTreeMap<i64, MemoryRecord>,
) {
    let verdicts: Vec<(usize, ObjectId, bool, Visibility)> = world
        .fleets
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.id.is_tombstone())
        .map(|(fi, f)| (fi, f.id, f.fog.memory, fleet_visibility(world, f, viewer)))
        .collect();

    let mut registry = std::mem::take(&mut world.registry);
    for (fi, id, was_memory, vis) in verdicts {
        if was_memory {
            if !memory.contains_key(&id.0) {
                registry.release(&mut world.fleets[fi].id);
            }
            continue;
        }
        if vis < Visibility::Fogged {
            registry.release(&mut world.fleets[fi].id);
            continue;
        }
        if vis == Visibility::Fogged {
            if let Some(MemoryRecord::Fleet(remembered)) = memory.get(&id.0) {
                let mut served = remembered.clone();
                served.id = id;
                served.fog.memory = true;
                world.fleets[fi] = served;
            }
        }
    }
    world.registry = registry;
}

fn redact_designs(world: &mut World, viewer: EmpireId) {
    let known: Vec<ObjectId> = world
        .empire(viewer)
        .map(|e| e.known_designs.clone())
        .unwrap_or_default();
    let verdicts: Vec<(usize, Visibility)> = world
        .designs
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.id.is_tombstone())
        .map(|(di, d)| (di, design_visibility(world, d, viewer)))
        .collect();

    let mut registry = std::mem::take(&mut world.registry);
    for (di, vis) in verdicts {
        let keep = vis >= Visibility::Scanned || known.contains(&world.designs[di].id);
        if !keep {
            registry.release(&mut world.designs[di].id);
        }
    }
    world.registry = registry;
}

fn redact_battles(world: &mut World, viewer: EmpireId) {
    world
        .battles
        .retain(|battle| battle.participants.contains(&viewer));
}

fn redact_empires(world: &mut World, viewer: EmpireId) {
    let hide_scores = world.config.score_visibility == ScoreVisibility::OwnOnly;
    for empire in &mut world.empires {
        if empire.id == viewer {
            continue;
        }
        empire.stored = Default::default();
        empire.commands.clear();
        empire.log.clear();
        empire.memory.clear();
        empire.research = Default::default();
        empire.known_designs.clear();
        empire.ai_notes = serde_json::Value::Null;
        empire.treaties.retain(|t| t.partner == viewer);
        if hide_scores {
            empire.scores.clear();
        }
    }
}

/// Helper dispatch used by memory upkeep: the current visibility of any
/// foggable object by id.
pub fn object_visibility(world: &World, id: ObjectId, viewer: EmpireId) -> Option<Visibility> {
    match world.tag_of(id)? {
        EntityTag::Vehicle => world
            .vehicle(id)
            .map(|v| vehicle_visibility(world, v, viewer)),
        EntityTag::Planet => world
            .planet(id)
            .map(|p| planet_visibility(world, p, viewer)),
        EntityTag::Fleet => world.fleet(id).map(|f| fleet_visibility(world, f, viewer)),
        _ => None,
    }
}

/// Refresh every empire's memory snapshots for objects it can currently
/// scan. Runs during movement (sight changes as ships move) and before the
/// per-player views are produced.
pub fn refresh_memories(world: &mut World) {
    let now = world.timestamp();
    let empire_ids: Vec<EmpireId> = world.empires.iter().map(|e| e.id).collect();
    for viewer in empire_ids {
        let mut fresh: Vec<MemoryRecord> = Vec::new();

        for sys in &world.systems {
            for planet in &sys.planets {
                if !planet.id.is_live() || planet.fog.memory {
                    continue;
                }
                let owned = planet.colony.as_ref().is_some_and(|c| c.owner == viewer);
                if !owned && planet_visibility(world, planet, viewer) >= Visibility::Scanned {
                    // Snapshots hold only what the sighting itself revealed;
                    // they end up in the viewer's save file.
                    let mut copy = planet.clone();
                    copy.fog.memory = true;
                    copy.fog.timestamp = now;
                    if let Some(colony) = copy.colony.as_mut() {
                        colony.queue.orders.clear();
                        colony.population_cargo = 0;
                    }
                    fresh.push(MemoryRecord::Planet(copy));
                }
            }
        }
        for vehicle in &world.vehicles {
            if !vehicle.id.is_live() || vehicle.fog.memory || vehicle.owner == viewer {
                continue;
            }
            if vehicle_visibility(world, vehicle, viewer) >= Visibility::Scanned {
                let mut copy = vehicle.clone();
                copy.fog.memory = true;
                copy.fog.timestamp = now;
                copy.orders.clear();
                copy.supply_remaining = 0;
                fresh.push(MemoryRecord::Vehicle(copy));
            }
        }
        for fleet in &world.fleets {
            if !fleet.id.is_live() || fleet.fog.memory || fleet.owner == viewer {
                continue;
            }
            if fleet_visibility(world, fleet, viewer) >= Visibility::Scanned {
                let mut copy = fleet.clone();
                copy.fog.memory = true;
                copy.fog.timestamp = now;
                fresh.push(MemoryRecord::Fleet(copy));
            }
        }

        if let Some(emp) = world.empire_mut(viewer) {
            for record in fresh {
                emp.memory.insert(record.id().0, record);
            }
        }
    }
}

/// Drop memory snapshots that no longer carry information: the object is in
/// plain sight and the snapshot is more than a full turn stale.
pub fn expire_obsolete_memories(world: &mut World) {
    let now = world.timestamp();
    let empire_ids: Vec<EmpireId> = world.empires.iter().map(|e| e.id).collect();
    for viewer in empire_ids {
        let entries: Vec<(i64, f64)> = world
            .empire(viewer)
            .map(|e| {
                e.memory
                    .iter()
                    .map(|(id, rec)| (*id, rec.timestamp()))
                    .collect()
            })
            .unwrap_or_default();

        let mut obsolete: Vec<i64> = Vec::new();
        for (id, stamp) in entries {
            let vis = object_visibility(world, ObjectId(id), viewer);
            if vis >= Some(Visibility::Visible) && stamp < now - 1.0 + 1e-9 {
                obsolete.push(id);
            }
        }
        if let Some(emp) = world.empire_mut(viewer) {
            for id in obsolete {
                emp.memory.remove(&id);
            }
        }
    }
}

/// Designs currently scanned by an empire join its known-design list.
pub fn update_known_designs(world: &mut World) {
    let empire_ids: Vec<EmpireId> = world.empires.iter().map(|e| e.id).collect();
    for viewer in empire_ids {
        let mut newly_known: Vec<ObjectId> = Vec::new();
        for design in &world.designs {
            if !design.id.is_live() {
                continue;
            }
            let already = world
                .empire(viewer)
                .is_some_and(|e| e.known_designs.contains(&design.id));
            if !already && design_visibility(world, design, viewer) >= Visibility::Scanned {
                newly_known.push(design.id);
            }
        }
        if let Some(emp) = world.empire_mut(viewer) {
            emp.known_designs.extend(newly_known);
        }
    }
}
