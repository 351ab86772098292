//! Fleet upkeep and the supply/shield/repair plumbing that runs around the
//! movement phase.

use std::collections::BTreeMap;

use sim_wire::EmpireId;

use crate::{
    abilities::{ability_value, empire_ability_in_sector, AbilityKey},
    space::Loc,
    world::World,
};

/// Drop dead or foreign members from every fleet and dispose fleets that
/// end up empty.
pub fn validate_fleets(world: &mut World) {
    let memberships: Vec<(usize, Vec<sim_wire::ObjectId>)> = world
        .fleets
        .iter()
        .enumerate()
        .filter(|(_, f)| f.id.is_live())
        .map(|(fi, f)| {
            let owner = f.owner;
            let keep: Vec<_> = f
                .vehicles
                .iter()
                .filter(|vid| {
                    world
                        .vehicle(**vid)
                        .map(|v| v.id.is_live() && v.owner == owner)
                        .unwrap_or(false)
                })
                .copied()
                .collect();
            (fi, keep)
        })
        .collect();

    let mut registry = std::mem::take(&mut world.registry);
    for (fi, keep) in memberships {
        let fleet = &mut world.fleets[fi];
        if keep.len() != fleet.vehicles.len() {
            tracing::debug!(
                target: "starfall::logistics",
                fleet = %fleet.id,
                dropped = fleet.vehicles.len() - keep.len(),
                "fleet membership validated"
            );
        }
        fleet.vehicles = keep;
        if fleet.vehicles.is_empty() {
            registry.release(&mut fleet.id);
        }
    }
    world.registry = registry;
    world.purge_disposed();
}

/// Pool every fleet's supplies and deal them back out in proportion to each
/// member's storage.
pub fn share_fleet_supplies(world: &mut World) {
    for fi in 0..world.fleets.len() {
        let members = world.fleets[fi].vehicles.clone();
        if members.len() < 2 {
            continue;
        }
        let mut total = 0i64;
        let mut capacities = Vec::with_capacity(members.len());
        for vid in &members {
            let (supply, capacity) = world
                .vehicle(*vid)
                .map(|v| {
                    let cap = world
                        .design(v.design)
                        .map(|d| d.supply_storage())
                        .unwrap_or(0);
                    (v.supply_remaining, cap)
                })
                .unwrap_or((0, 0));
            total += supply;
            capacities.push(capacity.max(0));
        }
        let capacity_total: i64 = capacities.iter().sum();
        if capacity_total == 0 {
            continue;
        }
        let mut remaining = total;
        for (idx, vid) in members.iter().enumerate() {
            let share = if idx + 1 == members.len() {
                remaining
            } else {
                total * capacities[idx] / capacity_total
            };
            let share = share.min(capacities[idx]);
            if let Some(v) = world.vehicle_mut(*vid) {
                v.supply_remaining = share;
            }
            remaining -= share;
        }
    }
}

/// Shields snap back to design maximum. Runs before movement, after each
/// move, and once more at cleanup so saved views show full values.
pub fn replenish_shields(world: &mut World) {
    let maxima: Vec<(usize, i64)> = world
        .vehicles
        .iter()
        .enumerate()
        .filter(|(_, v)| v.id.is_live() && !v.fog.memory)
        .map(|(vi, v)| {
            let max = world
                .design(v.design)
                .map(|d| d.max_shields())
                .unwrap_or(0);
            (vi, max)
        })
        .collect();
    for (vi, max) in maxima {
        world.vehicles[vi].shields = max;
    }
}

/// Colonies with room bring population back out of cold storage.
pub fn recover_population_from_cargo(world: &mut World) {
    for sys in &mut world.systems {
        for planet in &mut sys.planets {
            if !planet.id.is_live() {
                continue;
            }
            let max = planet.max_population;
            if let Some(colony) = planet.colony.as_mut() {
                if colony.population < max && colony.population_cargo > 0 {
                    let moved = colony.population_cargo.min(max - colony.population);
                    colony.population += moved;
                    colony.population_cargo -= moved;
                }
            }
        }
    }
}

/// Facility battle damage heals at a flat configured rate.
pub fn repair_facilities(world: &mut World) {
    let rate = world.config.facility_repair_per_turn;
    for sys in &mut world.systems {
        for planet in &mut sys.planets {
            if let Some(colony) = planet.colony.as_mut() {
                for facility in &mut colony.facilities {
                    facility.damage = (facility.damage - rate).max(0);
                }
            }
        }
    }
}

/// Hull repair: a flat self-repair rate for everything, plus per-sector
/// repair-point pools (repair yards and bays, own or treaty-shared) that are
/// shared across an empire's ships in that sector per turn.
pub fn repair_vehicles(world: &mut World) {
    let self_rate = world.config.unit_repair_per_turn;
    for vehicle in &mut world.vehicles {
        if vehicle.id.is_live() && !vehicle.fog.memory {
            vehicle.hull_damage = (vehicle.hull_damage - self_rate).max(0);
        }
    }

    let empires: Vec<EmpireId> = world.empires.iter().map(|e| e.id).collect();
    for empire in empires {
        let mut used: BTreeMap<Loc, i64> = BTreeMap::new();
        let candidates: Vec<(usize, Loc, i64)> = world
            .vehicles
            .iter()
            .enumerate()
            .filter(|(_, v)| {
                v.id.is_live() && !v.fog.memory && v.owner == empire && v.hull_damage > 0
            })
            .map(|(vi, v)| (vi, v.loc, v.hull_damage))
            .collect();
        for (vi, loc, damage) in candidates {
            let pool =
                empire_ability_in_sector(world, loc, empire, AbilityKey::ComponentRepair)
                    - used.get(&loc).copied().unwrap_or(0);
            if pool <= 0 {
                continue;
            }
            // Pool points heal 10 hull each.
            let heal = (pool * 10).min(damage);
            world.vehicles[vi].hull_damage -= heal;
            *used.entry(loc).or_insert(0) += (heal + 9) / 10;
        }
    }
}

/// Reactors and solar panels generate supply each turn; solar scales with
/// the number of stars in the vehicle's system.
pub fn regenerate_supplies(world: &mut World) {
    let updates: Vec<(usize, i64, i64)> = world
        .vehicles
        .iter()
        .enumerate()
        .filter(|(_, v)| v.id.is_live() && !v.fog.memory)
        .map(|(vi, v)| {
            let per_turn = ability_value(
                world,
                v.id,
                AbilityKey::SupplyGenerationPerTurn,
                Some(v.owner),
            );
            let stars = world
                .system_containing(v.loc)
                .map(|si| i64::from(world.systems[si].star_count))
                .unwrap_or(0);
            let solar = ability_value(
                world,
                v.id,
                AbilityKey::SolarSupplyGeneration,
                Some(v.owner),
            ) * stars;
            let storage = world
                .design(v.design)
                .map(|d| d.supply_storage())
                .unwrap_or(0);
            (vi, per_turn + solar, storage)
        })
        .collect();
    for (vi, gain, storage) in updates {
        let v = &mut world.vehicles[vi];
        v.supply_remaining = (v.supply_remaining + gain).clamp(0, storage);
    }
}

/// Depots top everything co-located off; system-wide generators top off a
/// whole system for their empire (or anyone they share the ability with).
pub fn final_resupply(world: &mut World) {
    let refills: Vec<(usize, i64)> = world
        .vehicles
        .iter()
        .enumerate()
        .filter(|(_, v)| v.id.is_live() && !v.fog.memory)
        .filter_map(|(vi, v)| {
            let storage = world.design(v.design).map(|d| d.supply_storage())?;
            let sector =
                empire_ability_in_sector(world, v.loc, v.owner, AbilityKey::SupplyGeneration) > 0;
            let system = world.system_containing(v.loc).is_some_and(|si| {
                system_supply_generation(world, si, v.owner) > 0
            });
            (sector || system).then_some((vi, storage))
        })
        .collect();
    for (vi, storage) in refills {
        world.vehicles[vi].supply_remaining = storage;
    }
}

fn system_supply_generation(world: &World, si: usize, empire: EmpireId) -> i64 {
    let sys = &world.systems[si];
    let mut total = 0;
    for planet in &sys.planets {
        if planet.id.is_live() {
            total += ability_value(
                world,
                planet.id,
                AbilityKey::SupplyGenerationSystem,
                Some(empire),
            );
        }
    }
    for vehicle in &world.vehicles {
        if vehicle.id.is_live() && !vehicle.fog.memory && sys.contains(vehicle.loc) {
            total += ability_value(
                world,
                vehicle.id,
                AbilityKey::SupplyGenerationSystem,
                Some(empire),
            );
        }
    }
    total
}
