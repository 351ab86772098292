//! Resources and the economic phases of the turn.
//!
//! Per-object work (colony growth plans, income contributions) is computed
//! as a parallel map over immutable world state, then applied as a serial
//! fold into the shared empire totals, so the math parallelizes without the
//! accumulators needing locks.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    abilities::{ability_value, has_ability, AbilityKey},
    empire::{TechId, TreatyClause},
    rng::pick_weighted,
    world::World,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Minerals,
    Organics,
    Radioactives,
    Research,
}

impl Resource {
    pub const COUNT: usize = 4;
    pub const ALL: [Resource; Resource::COUNT] = [
        Resource::Minerals,
        Resource::Organics,
        Resource::Radioactives,
        Resource::Research,
    ];
    /// The mineable resources; the ones a planet carries a value for.
    pub const MATERIALS: [Resource; 3] = [
        Resource::Minerals,
        Resource::Organics,
        Resource::Radioactives,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Resource::Minerals => "minerals",
            Resource::Organics => "organics",
            Resource::Radioactives => "radioactives",
            Resource::Research => "research",
        }
    }

    fn index(self) -> usize {
        match self {
            Resource::Minerals => 0,
            Resource::Organics => 1,
            Resource::Radioactives => 2,
            Resource::Research => 3,
        }
    }
}

/// A quantity of each resource. Also used for planet richness values and
/// storage capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Stockpile([i64; Resource::COUNT]);

impl Stockpile {
    pub fn uniform(amount: i64) -> Self {
        let mut s = Self::default();
        for r in Resource::ALL {
            s[r] = amount;
        }
        s
    }

    pub fn total(&self) -> i64 {
        self.0.iter().sum()
    }

    pub fn is_any_negative(&self) -> bool {
        self.0.iter().any(|v| *v < 0)
    }

    /// Sum of the negative components' magnitudes.
    pub fn deficit(&self) -> i64 {
        self.0.iter().filter(|v| **v < 0).map(|v| -*v).sum()
    }

    pub fn clamp_non_negative(&mut self) {
        for v in &mut self.0 {
            *v = (*v).max(0);
        }
    }

    pub fn saturating_sub(&self, other: &Stockpile) -> Stockpile {
        let mut out = *self;
        for r in Resource::ALL {
            out[r] = (out[r] - other[r]).max(0);
        }
        out
    }

    pub fn scaled(&self, numerator: i64, denominator: i64) -> Stockpile {
        let mut out = *self;
        for r in Resource::ALL {
            out[r] = out[r] * numerator / denominator;
        }
        out
    }

    pub fn min_with(&self, other: &Stockpile) -> Stockpile {
        let mut out = *self;
        for r in Resource::ALL {
            out[r] = out[r].min(other[r]);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, i64)> + '_ {
        Resource::ALL.into_iter().map(move |r| (r, self[r]))
    }
}

impl std::ops::Index<Resource> for Stockpile {
    type Output = i64;
    fn index(&self, r: Resource) -> &i64 {
        &self.0[r.index()]
    }
}

impl std::ops::IndexMut<Resource> for Stockpile {
    fn index_mut(&mut self, r: Resource) -> &mut i64 {
        &mut self.0[r.index()]
    }
}

impl std::ops::AddAssign for Stockpile {
    fn add_assign(&mut self, rhs: Stockpile) {
        for r in Resource::ALL {
            self[r] += rhs[r];
        }
    }
}

impl std::ops::SubAssign for Stockpile {
    fn sub_assign(&mut self, rhs: Stockpile) {
        for r in Resource::ALL {
            self[r] -= rhs[r];
        }
    }
}

impl std::ops::Add for Stockpile {
    type Output = Stockpile;
    fn add(mut self, rhs: Stockpile) -> Stockpile {
        self += rhs;
        self
    }
}

/// Population needed for a colony to reach full output.
const FULL_OUTPUT_POPULATION: i64 = 1_000_000;

fn population_factor(population: i64) -> (i64, i64) {
    (population.min(FULL_OUTPUT_POPULATION), FULL_OUTPUT_POPULATION)
}

/// Upkeep for one vehicle, as a fraction of its design cost.
pub fn maintenance_cost(world: &World, vehicle_id: ObjectId) -> Stockpile {
    let Some(vehicle) = world.vehicle(vehicle_id) else {
        return Stockpile::default();
    };
    world
        .design(vehicle.design)
        .map(|d| d.cost().scaled(world.config.maintenance_rate_percent, 100))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Phase 5: colony maintenance
// ---------------------------------------------------------------------------

struct GrowthPlan {
    si: usize,
    pi: usize,
    population: i64,
    population_cargo: i64,
    filled_up: bool,
}

/// Population growth and resource-value drift, on their configured cadences.
pub fn run_colony_maintenance(world: &mut World) {
    let turn = world.turn_number;
    let reproduction_frequency = world.config.reproduction_frequency;
    let value_change_frequency = world.config.value_change_frequency;
    let population_growth_per_mille = world.config.population_growth_per_mille;

    if reproduction_frequency > 0 && turn % reproduction_frequency == 0 {
        let coords = colonized_planets(world);
        let growth_rate = population_growth_per_mille;
        let plans: Vec<GrowthPlan> = coords
            .par_iter()
            .map(|&(si, pi)| {
                let planet = &world.systems[si].planets[pi];
                let colony = planet.colony.as_ref().expect("coords are colonized");
                let was_full = colony.population >= planet.max_population;
                let mut population =
                    colony.population + colony.population * growth_rate / 1000;
                let mut cargo = colony.population_cargo;

                // Surface first, then pull people back out of cold storage.
                let filled_up = population > planet.max_population && !was_full;
                population = population.min(planet.max_population);
                if population < planet.max_population && cargo > 0 {
                    let room = planet.max_population - population;
                    let moved = cargo.min(room);
                    population += moved;
                    cargo -= moved;
                }

                GrowthPlan {
                    si,
                    pi,
                    population,
                    population_cargo: cargo,
                    filled_up,
                }
            })
            .collect();

        for plan in plans {
            let planet = &mut world.systems[plan.si].planets[plan.pi];
            let planet_id = planet.id;
            let planet_name = planet.name.clone();
            let colony = planet.colony.as_mut().expect("coords are colonized");
            colony.population = plan.population;
            colony.population_cargo = plan.population_cargo;
            let owner = colony.owner;
            if plan.filled_up {
                world.log_to(
                    owner,
                    format!(
                        "{planet_name} has completely filled up with population. \
                         Building transports is advised."
                    ),
                    Some(planet_id),
                );
            }
        }
    }

    if value_change_frequency > 0 && turn % value_change_frequency == 0 {
        run_value_drift(world);
    }
}

fn run_value_drift(world: &mut World) {
    let (min_value, max_value) = (world.config.min_planet_value, world.config.max_planet_value);
    let coords = colonized_planets(world);
    for (si, pi) in coords {
        let (planet_id, owner) = {
            let p = &world.systems[si].planets[pi];
            (p.id, p.colony.as_ref().map(|c| c.owner))
        };
        let owner_object = owner
            .and_then(|o| world.empire(o))
            .map(|e| e.object_id);

        for resource in Resource::MATERIALS {
            let mut modifier =
                ability_value(world, planet_id, AbilityKey::ChangeResourceValue(resource), owner);
            if let Some(empire_object) = owner_object {
                modifier +=
                    ability_value(world, empire_object, AbilityKey::ChangeResourceValue(resource), owner);
            }
            if modifier == 0 {
                continue;
            }

            let planet = &mut world.systems[si].planets[pi];
            let was_full = planet.resource_value[resource] == max_value;
            let was_empty = planet.resource_value[resource] == min_value;
            let value = (planet.resource_value[resource] + modifier).clamp(min_value, max_value);
            planet.resource_value[resource] = value;
            let name = planet.name.clone();

            if let Some(owner) = owner {
                if !was_full && value == max_value {
                    world.log_to(
                        owner,
                        format!("{name}'s {} have been completely replenished.", resource.name()),
                        Some(planet_id),
                    );
                }
                if !was_empty && value == min_value {
                    world.log_to(
                        owner,
                        format!("{name} has been stripped dry of {}.", resource.name()),
                        Some(planet_id),
                    );
                }
            }
        }
    }
}

fn colonized_planets(world: &World) -> Vec<(usize, usize)> {
    world
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
        .collect()
}

// ---------------------------------------------------------------------------
// Phase 6: resource generation
// ---------------------------------------------------------------------------

struct IncomePlan {
    owner: EmpireId,
    income: Stockpile,
    /// Mined material per resource, for the standard-model value decay.
    mined: Stockpile,
    si: usize,
    pi: usize,
    no_spaceport: bool,
}

/// Colony income for one planet, before spaceport scaling.
pub fn colony_gross_income(world: &World, si: usize, pi: usize) -> Stockpile {
    let planet = &world.systems[si].planets[pi];
    let Some(colony) = planet.colony.as_ref() else {
        return Stockpile::default();
    };
    let (pop, pop_full) = population_factor(colony.population);
    let mut income = Stockpile::default();
    for resource in Resource::MATERIALS {
        let extraction = ability_value(
            world,
            planet.id,
            AbilityKey::ResourceExtraction(resource),
            Some(colony.owner),
        );
        income[resource] =
            extraction * planet.resource_value[resource] / 100 * pop / pop_full;
    }
    let research = ability_value(
        world,
        planet.id,
        AbilityKey::ResearchGeneration,
        Some(colony.owner),
    );
    income[Resource::Research] = research * pop / pop_full;
    income
}

fn system_has_spaceport(world: &World, si: usize, owner: EmpireId) -> bool {
    world.systems[si].planets.iter().any(|p| {
        p.id.is_live() && has_ability(world, p.id, AbilityKey::Spaceport, Some(owner))
    })
}

/// Colony income, remote mining, and raw income, credited in that order.
pub fn run_resource_generation(world: &mut World) {
    // Colony income: parallel map, serial fold.
    let coords = colonized_planets(world);
    let plans: Vec<IncomePlan> = coords
        .par_iter()
        .map(|&(si, pi)| {
            let planet = &world.systems[si].planets[pi];
            let owner = planet.colony.as_ref().expect("colonized").owner;
            let mut income = colony_gross_income(world, si, pi);
            let no_spaceport = !system_has_spaceport(world, si, owner);
            if no_spaceport {
                income = income.scaled(1, 2);
            }
            let mut mined = Stockpile::default();
            for resource in Resource::MATERIALS {
                let value = planet.resource_value[resource];
                if value > 0 {
                    mined[resource] = income[resource];
                }
            }
            IncomePlan {
                owner,
                income,
                mined,
                si,
                pi,
                no_spaceport,
            }
        })
        .collect();

    let decay_rate = world.config.mining_decay_per_thousand;
    let min_value = world.config.min_planet_value;
    for plan in plans {
        if let Some(emp) = world.empire_mut(plan.owner) {
            emp.stored += plan.income;
        }
        if plan.no_spaceport {
            let (name, id) = {
                let p = &world.systems[plan.si].planets[plan.pi];
                (p.name.clone(), p.id)
            };
            world.log_to(
                plan.owner,
                format!("{name} earned only half its normal income due to lack of a spaceport."),
                Some(id),
            );
        }
        let planet = &mut world.systems[plan.si].planets[plan.pi];
        for resource in Resource::MATERIALS {
            let decay = plan.mined[resource] * decay_rate / 1000;
            if decay > 0 {
                planet.resource_value[resource] =
                    (planet.resource_value[resource] - decay).max(min_value);
            }
        }
    }

    run_remote_mining(world);

    // Raw income from empire traits.
    for idx in 0..world.empires.len() {
        let (empire_id, object_id) = {
            let e = &world.empires[idx];
            (e.id, e.object_id)
        };
        let mut raw = Stockpile::default();
        for resource in Resource::ALL {
            raw[resource] = ability_value(
                world,
                object_id,
                AbilityKey::RawResourceGeneration(resource),
                Some(empire_id),
            );
        }
        if raw != Stockpile::default() {
            world.empires[idx].stored += raw;
        }
    }
}

/// Remote mining. The value of a mined object is adjusted exactly once per
/// resource per turn, no matter how many separate miners worked it; every
/// miner still earns income. Kept as a deliberate policy decision.
fn run_remote_mining(world: &mut World) {
    use std::collections::BTreeMap;

    let supply_burn_per_rig = 10;
    let decay_rate = world.config.mining_decay_per_thousand;
    let min_value = world.config.min_planet_value;

    // (miner index, target planet id, yield per resource)
    let mut operations: Vec<(usize, ObjectId, Stockpile)> = Vec::new();
    for (vi, vehicle) in world.vehicles.iter().enumerate() {
        if !vehicle.id.is_live() || vehicle.fog.memory {
            continue;
        }
        let mut rates = Stockpile::default();
        for resource in Resource::MATERIALS {
            rates[resource] = ability_value(
                world,
                vehicle.id,
                AbilityKey::RemoteResourceGeneration(resource),
                Some(vehicle.owner),
            );
        }
        if rates == Stockpile::default() {
            continue;
        }
        let target = world.systems.iter().flat_map(|s| s.planets.iter()).find(|p| {
            p.id.is_live() && p.colony.is_none() && p.loc == vehicle.loc
        });
        if let Some(planet) = target {
            let mut yields = Stockpile::default();
            for resource in Resource::MATERIALS {
                yields[resource] = rates[resource] * planet.resource_value[resource] / 100;
            }
            operations.push((vi, planet.id, yields));
        }
    }

    let mut adjusted: BTreeMap<(i64, Resource), i64> = BTreeMap::new();
    for (vi, planet_id, yields) in operations {
        // Miners burn supplies but, unlike movement, keep working when dry;
        // hauling fuel out to every mining fleet would be busywork.
        let rig_count = {
            let vehicle = &world.vehicles[vi];
            world
                .design(vehicle.design)
                .map(|d| {
                    d.components
                        .iter()
                        .filter(|c| matches!(c, crate::vehicles::ComponentKind::MiningRig))
                        .count() as i64
                })
                .unwrap_or(0)
        };
        let vehicle = &mut world.vehicles[vi];
        vehicle.supply_remaining =
            (vehicle.supply_remaining - rig_count * supply_burn_per_rig).max(0);
        let owner = vehicle.owner;

        for resource in Resource::MATERIALS {
            let amount = yields[resource];
            if amount <= 0 {
                continue;
            }
            let key = (planet_id.0, resource);
            if !adjusted.contains_key(&key) {
                let decay = amount * decay_rate / 1000;
                adjusted.insert(key, decay);
                if decay > 0 {
                    if let Some(planet) = world.planet_mut(planet_id) {
                        planet.resource_value[resource] =
                            (planet.resource_value[resource] - decay).max(min_value);
                    }
                }
            }
            if let Some(emp) = world.empire_mut(owner) {
                emp.stored[resource] += amount;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Phase 7: per-empire maintenance
// ---------------------------------------------------------------------------

/// Deduct upkeep for every vehicle the empire owns.
pub fn pay_maintenance(world: &mut World, empire: EmpireId) {
    let total: Stockpile = world
        .vehicles
        .iter()
        .filter(|v| v.id.is_live() && !v.fog.memory && v.owner == empire)
        .map(|v| v.id)
        .collect::<Vec<_>>()
        .into_iter()
        .fold(Stockpile::default(), |acc, id| {
            acc + maintenance_cost(world, id)
        });
    if let Some(emp) = world.empire_mut(empire) {
        emp.stored -= total;
    }
}

/// Unpaid upkeep scuttles ships, weighted by how expensive they are to keep.
pub fn scuttle_for_deficit<R: Rng + ?Sized>(world: &mut World, empire: EmpireId, rng: &mut R) {
    let deficit = world
        .empire(empire)
        .map(|e| e.stored.deficit())
        .unwrap_or(0);
    let losses = deficit / world.config.deficit_per_loss;
    for _ in 0..losses {
        let owned: Vec<ObjectId> = world
            .vehicles
            .iter()
            .filter(|v| v.id.is_live() && !v.fog.memory && v.owner == empire)
            .map(|v| v.id)
            .collect();
        let Some(pick) = pick_weighted(rng, &owned, |id| {
            maintenance_cost(world, *id).total()
        }) else {
            break;
        };
        let id = owned[pick];
        let name = world
            .vehicle(id)
            .map(|v| v.name.clone())
            .unwrap_or_default();
        let mut slot = id;
        world.registry.release(&mut slot);
        if let Some(v) = world.vehicle_mut(id) {
            v.id = slot;
        }
        world.log_to(
            empire,
            format!("{name} fell into disrepair and was scuttled due to lack of maintenance funding."),
            None,
        );
    }
}

/// Execute the given-clause side of every treaty the empire is party to.
pub fn perform_treaty_actions(world: &mut World, empire: EmpireId) {
    let clauses: Vec<(EmpireId, TreatyClause)> = world
        .empire(empire)
        .map(|e| {
            e.treaties
                .iter()
                .flat_map(|t| t.clauses.iter().map(|c| (t.partner, c.clone())))
                .collect()
        })
        .unwrap_or_default();

    for (partner, clause) in clauses {
        match clause {
            TreatyClause::Tribute { resource, amount } => {
                let available = world
                    .empire(empire)
                    .map(|e| e.stored[resource].max(0))
                    .unwrap_or(0);
                let paid = amount.min(available);
                if paid <= 0 {
                    continue;
                }
                if let Some(giver) = world.empire_mut(empire) {
                    giver.stored[resource] -= paid;
                }
                if let Some(taker) = world.empire_mut(partner) {
                    taker.stored[resource] += paid;
                }
            }
            // Ability sharing has no per-turn action; it takes effect
            // through the shared ability tier.
            TreatyClause::ShareAbility { .. } => {}
        }
    }
}

/// Spend this turn's research output: percentage priorities first, then the
/// queue in order, then the highest priority, then a random available tech.
pub fn run_research<R: Rng + ?Sized>(world: &mut World, empire: EmpireId, rng: &mut R) {
    let Some(emp) = world.empire(empire) else {
        return;
    };
    let spendable = emp.stored[Resource::Research].max(0) + emp.research.bonus;
    if spendable <= 0 {
        if let Some(emp) = world.empire_mut(empire) {
            emp.research.bonus = 0;
        }
        return;
    }

    let spending = emp.research.spending.clone();
    let mut spent_total = 0;
    for (tech, pct) in &spending {
        let amount = i64::from(*pct) * spendable / 100;
        research_into(world, empire, *tech, amount);
        spent_total += amount;
    }

    let pct_sum: i64 = spending.iter().map(|(_, p)| i64::from(*p)).sum();
    let mut leftovers = (100 - pct_sum).max(0) * spendable / 100;

    while leftovers > 0 {
        let Some(tech) = world
            .empire(empire)
            .and_then(|e| e.research.queue.first().copied())
        else {
            break;
        };
        let (level, accumulated) = {
            let e = world.empire(empire).unwrap();
            (e.research.level(tech), *e.research.accumulated.get(&tech).unwrap_or(&0))
        };
        let to_spend = leftovers.min(world.config.next_level_cost(level) - accumulated);
        if to_spend <= 0 {
            break;
        }
        research_into(world, empire, tech, to_spend);
        spent_total += to_spend;
        leftovers -= to_spend;
    }

    if leftovers > 0 {
        if let Some((tech, _)) = spending.iter().max_by_key(|(_, p)| *p) {
            research_into(world, empire, *tech, leftovers);
            spent_total += leftovers;
        } else {
            let tech = TECH_ALL[rng.gen_range(0..TECH_ALL.len())];
            research_into(world, empire, tech, leftovers);
            spent_total += leftovers;
        }
    }

    if let Some(emp) = world.empire_mut(empire) {
        let stored = emp.stored[Resource::Research].max(0);
        emp.stored[Resource::Research] -= spent_total.min(stored);
        emp.research.bonus = 0;
    }
}

const TECH_ALL: [TechId; 6] = [
    TechId::Propulsion,
    TechId::Weapons,
    TechId::Shields,
    TechId::Mining,
    TechId::Construction,
    TechId::Sensors,
];

fn research_into(world: &mut World, empire: EmpireId, tech: TechId, amount: i64) {
    if amount <= 0 {
        return;
    }
    let (mut acc, mut level) = match world.empire(empire) {
        Some(e) => (
            *e.research.accumulated.get(&tech).unwrap_or(&0) + amount,
            e.research.level(tech),
        ),
        None => return,
    };
    let mut advanced: Vec<u32> = Vec::new();
    loop {
        let cost = world.config.next_level_cost(level);
        if acc < cost {
            break;
        }
        acc -= cost;
        level += 1;
        advanced.push(level);
    }
    if let Some(emp) = world.empire_mut(empire) {
        emp.research.accumulated.insert(tech, acc);
        if !advanced.is_empty() {
            emp.research.levels.insert(tech, level);
        }
    }
    for reached in advanced {
        world.log_to(
            empire,
            format!("Our {tech:?} technology has advanced to level {reached}."),
            None,
        );
    }
}

/// Clamp stored resources to what the empire can actually warehouse.
/// Research is never stored, which is what makes it use-it-or-lose-it.
pub fn apply_spoilage(world: &mut World, empire: EmpireId) {
    let capacity = storage_capacity(world, empire);
    if let Some(emp) = world.empire_mut(empire) {
        emp.stored = emp.stored.min_with(&capacity);
        emp.stored.clamp_non_negative();
    }
}

pub fn storage_capacity(world: &World, _empire: EmpireId) -> Stockpile {
    let mut capacity = Stockpile::uniform(world.config.base_resource_storage);
    capacity[Resource::Research] = 0;
    capacity
}

/// A single scalar summarizing an empire's standing, captured into its
/// score history each turn.
pub fn compute_score(world: &World, empire: EmpireId) -> i64 {
    let mut score = 0;

    for sys in &world.systems {
        for planet in &sys.planets {
            if !planet.id.is_live() {
                continue;
            }
            if let Some(colony) = planet.colony.as_ref() {
                if colony.owner == empire {
                    score += colony.population / 1000;
                    score += colony.facilities.len() as i64 * 100;
                }
            }
        }
    }

    for vehicle in &world.vehicles {
        if vehicle.id.is_live() && !vehicle.fog.memory && vehicle.owner == empire {
            score += world
                .design(vehicle.design)
                .map(|d| d.cost().total() / 10)
                .unwrap_or(0);
        }
    }

    if let Some(emp) = world.empire(empire) {
        score += emp
            .research
            .levels
            .values()
            .map(|l| i64::from(*l) * 500)
            .sum::<i64>();
        score += emp.stored.total() / 100;
    }

    score
}
