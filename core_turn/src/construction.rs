//! Colony construction queues.
//!
//! Queue orders are referrable objects: clients create them with local ids
//! and reference them in later commands (reordering, cancellation). Spending
//! is capped per colony per turn by the construction rate; all queues are
//! meant to execute simultaneously, so the whole phase runs with the ability
//! cache pinned.

use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    economy::Stockpile,
    empire::TechId,
    space::{Facility, FacilityKind},
    vehicles::Vehicle,
    world::{EntityTag, World},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionOrder {
    pub id: ObjectId,
    pub item: ConstructionItem,
    /// Resources sunk into the item so far.
    pub paid: Stockpile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstructionItem {
    Vehicle { design: ObjectId, name: String },
    Facility { kind: FacilityKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConstructionQueue {
    pub orders: Vec<ConstructionOrder>,
}

pub fn facility_cost(kind: FacilityKind) -> Stockpile {
    use crate::economy::Resource::*;
    let mut cost = Stockpile::default();
    match kind {
        FacilityKind::MineralExtractor
        | FacilityKind::OrganicsFarm
        | FacilityKind::RadioactivesExtractor => {
            cost[Minerals] = 1000;
        }
        FacilityKind::ResearchLab => {
            cost[Minerals] = 800;
            cost[Radioactives] = 400;
        }
        FacilityKind::Spaceport => {
            cost[Minerals] = 1200;
            cost[Organics] = 200;
        }
        FacilityKind::SupplyDepot => {
            cost[Minerals] = 600;
            cost[Organics] = 400;
        }
        FacilityKind::RepairYard => {
            cost[Minerals] = 1500;
        }
    }
    cost
}

/// Full cost of a queued item, or `None` when it refers to a missing design.
pub fn item_cost(world: &World, item: &ConstructionItem) -> Option<Stockpile> {
    match item {
        ConstructionItem::Vehicle { design, .. } => world.design(*design).map(|d| d.cost()),
        ConstructionItem::Facility { kind } => Some(facility_cost(*kind)),
    }
}

/// Execute every colony's construction queue for this turn.
pub fn run_construction(world: &mut World) {
    let colonies: Vec<(usize, usize)> = world
        .systems
        .iter()
        .enumerate()
        .flat_map(|(si, sys)| {
            sys.planets
                .iter()
                .enumerate()
                .filter(|(_, p)| p.id.is_live() && p.colony.is_some())
                .map(move |(pi, _)| (si, pi))
        })
        .collect();

    for (si, pi) in colonies {
        let (owner, planet_loc, planet_id) = {
            let planet = &world.systems[si].planets[pi];
            let Some(colony) = planet.colony.as_ref() else {
                continue;
            };
            (colony.owner, planet.loc, planet.id)
        };

        let tech_bonus = world
            .empire(owner)
            .map(|e| i64::from(e.research.level(TechId::Construction)) * 500)
            .unwrap_or(0);
        let mut rate_left = world.config.base_construction_rate + tech_bonus;

        while rate_left > 0 {
            // Next unfinished order and what it still needs.
            let Some((order_id, item, remaining)) = ({
                let colony = world.systems[si].planets[pi].colony.as_ref().unwrap();
                colony.queue.orders.iter().find_map(|order| {
                    let cost = item_cost(world, &order.item)?;
                    let remaining = cost.saturating_sub(&order.paid);
                    Some((order.id, order.item.clone(), remaining))
                })
            }) else {
                break;
            };

            let mut spent = Stockpile::default();
            {
                let stored = &mut world
                    .empire_mut(owner)
                    .expect("colony owner must exist")
                    .stored;
                for resource in crate::economy::Resource::ALL {
                    let want = remaining[resource].min(rate_left).max(0);
                    let pay = want.min(stored[resource]).max(0);
                    stored[resource] -= pay;
                    spent[resource] = pay;
                    rate_left -= pay;
                }
            }

            let done = crate::economy::Resource::ALL
                .into_iter()
                .all(|r| remaining[r] <= spent[r]);

            let colony = world.systems[si].planets[pi].colony.as_mut().unwrap();
            let order = colony
                .queue
                .orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .unwrap();
            order.paid += spent;

            if !done {
                // Out of rate or out of resources; either way this colony is
                // finished for the turn.
                break;
            }

            finish_order(world, si, pi, order_id, item, owner, planet_loc, planet_id);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn finish_order(
    world: &mut World,
    si: usize,
    pi: usize,
    order_id: ObjectId,
    item: ConstructionItem,
    owner: EmpireId,
    loc: crate::space::Loc,
    planet_id: ObjectId,
) {
    let timestamp = world.timestamp();
    match item {
        ConstructionItem::Vehicle { design, name } => {
            let (shields, supply) = world
                .design(design)
                .map(|d| (d.max_shields(), d.supply_storage()))
                .unwrap_or((0, 0));
            let mut vehicle = Vehicle {
                id: ObjectId::UNASSIGNED,
                fog: crate::visibility::FogState {
                    memory: false,
                    timestamp,
                },
                name: name.clone(),
                owner,
                design,
                loc,
                shields,
                hull_damage: 0,
                supply_remaining: supply,
                orders: Vec::new(),
                hops_done: 0,
            };
            if let Err(err) = world.registry.assign(&mut vehicle.id, EntityTag::Vehicle) {
                tracing::error!(
                    target: "starfall::construction",
                    %err,
                    "failed to assign id to completed vehicle"
                );
                return;
            }
            let text = format!("{name} has been constructed.");
            let subject = vehicle.id;
            world.vehicles.push(vehicle);
            world.log_to(owner, text, Some(subject));
        }
        ConstructionItem::Facility { kind } => {
            let colony = world.systems[si].planets[pi].colony.as_mut().unwrap();
            colony.facilities.push(Facility::new(kind));
            let text = format!("A new {kind:?} has come online.");
            world.log_to(owner, text, Some(planet_id));
        }
    }

    // Construction orders are consumed at completion, unlike movement
    // orders which linger until the end-of-turn sweep.
    let colony = world.systems[si].planets[pi].colony.as_mut().unwrap();
    if let Some(pos) = colony.queue.orders.iter().position(|o| o.id == order_id) {
        let mut removed = colony.queue.orders.remove(pos);
        world.registry.release(&mut removed.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::Resource;
    use crate::testkit;

    #[test]
    fn queue_spends_up_to_rate_and_completes() {
        let mut world = testkit::two_empire_world();
        let owner = world.empires[0].id;
        world.empire_mut(owner).unwrap().stored[Resource::Minerals] = 10_000;

        let order_id = testkit::enqueue_facility(&mut world, 0, 0, FacilityKind::SupplyDepot);
        // SupplyDepot costs 600 minerals + 400 organics; no organics stored.
        run_construction(&mut world);
        let colony = world.systems[0].planets[0].colony.as_ref().unwrap();
        let order = colony.queue.orders.iter().find(|o| o.id == order_id).unwrap();
        assert_eq!(order.paid[Resource::Minerals], 600);
        assert_eq!(order.paid[Resource::Organics], 0);

        world.empire_mut(owner).unwrap().stored[Resource::Organics] = 400;
        run_construction(&mut world);
        let colony = world.systems[0].planets[0].colony.as_ref().unwrap();
        assert!(
            colony.queue.orders.iter().all(|o| o.id != order_id),
            "completed order should be consumed"
        );
        assert!(colony
            .facilities
            .iter()
            .any(|f| f.kind == FacilityKind::SupplyDepot));
    }
}
