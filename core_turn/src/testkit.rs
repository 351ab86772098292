//! Shared fixtures for the unit tests in this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::RngCore;
use sim_wire::{EmpireId, ObjectId};

use crate::{
    battle::{BattleEngine, BattleResult},
    construction::{ConstructionItem, ConstructionOrder},
    empire::{Empire, Stance},
    persist::{CommandSource, PersistError},
    pipeline::RawBatch,
    space::{Colony, Facility, FacilityKind, Loc, Planet, StarSystem},
    vehicles::{ComponentKind, Design, Vehicle},
    visibility::{FogState, SensorChannels},
    world::{EntityTag, World},
};

/// Two human empires, each with a home system, a colony, and a ship; one
/// spare uncolonized planet for mining; a miner design on the shelf.
pub fn two_empire_world() -> World {
    let mut world = World::new("vega", 7);

    let e1 = EmpireId(1);
    let e2 = EmpireId(2);
    world.empires.push(Empire::new(e1, "Meridian Combine", true));
    world.empires.push(Empire::new(e2, "Halcyon Accord", true));

    let scout = Design {
        id: ObjectId::UNASSIGNED,
        name: "Scout".into(),
        owner: e1,
        hull_size: 300,
        speed: 3,
        components: vec![
            ComponentKind::Engine,
            ComponentKind::SupplyPod,
            ComponentKind::ShieldGenerator,
            ComponentKind::Sensor(SensorChannels::GRAV),
        ],
    };
    let corvette = Design {
        id: ObjectId::UNASSIGNED,
        name: "Corvette".into(),
        owner: e2,
        hull_size: 400,
        speed: 2,
        components: vec![
            ComponentKind::Engine,
            ComponentKind::Weapon,
            ComponentKind::ShieldGenerator,
        ],
    };
    let prospector = Design {
        id: ObjectId::UNASSIGNED,
        name: "Prospector".into(),
        owner: e1,
        hull_size: 500,
        speed: 1,
        components: vec![ComponentKind::MiningRig, ComponentKind::SupplyPod],
    };
    world.designs.extend([scout, corvette, prospector]);

    world.systems.push(StarSystem {
        id: ObjectId::UNASSIGNED,
        fog: FogState::default(),
        name: "Kestrel".into(),
        description: "A quiet yellow dwarf.".into(),
        loc: Loc::new(10, 10),
        radius: 2,
        star_count: 1,
        explored_by: vec![e1],
        planets: vec![
            Planet {
                id: ObjectId::UNASSIGNED,
                fog: FogState::default(),
                name: "Kestrel II".into(),
                loc: Loc::new(10, 10),
                resource_value: crate::economy::Stockpile::uniform(100),
                max_population: 8_000_000,
                colony: Some(Colony {
                    owner: e1,
                    population: 2_000_000,
                    population_cargo: 0,
                    facilities: vec![
                        Facility::new(FacilityKind::MineralExtractor),
                        Facility::new(FacilityKind::OrganicsFarm),
                        Facility::new(FacilityKind::ResearchLab),
                        Facility::new(FacilityKind::Spaceport),
                    ],
                    queue: Default::default(),
                }),
            },
            Planet {
                id: ObjectId::UNASSIGNED,
                fog: FogState::default(),
                name: "Kestrel III".into(),
                loc: Loc::new(11, 10),
                resource_value: crate::economy::Stockpile::uniform(100),
                max_population: 4_000_000,
                colony: None,
            },
        ],
    });
    world.systems.push(StarSystem {
        id: ObjectId::UNASSIGNED,
        fog: FogState::default(),
        name: "Auriga".into(),
        description: "Twin suns over red dust.".into(),
        loc: Loc::new(30, 10),
        radius: 2,
        star_count: 2,
        explored_by: vec![e2],
        planets: vec![Planet {
            id: ObjectId::UNASSIGNED,
            fog: FogState::default(),
            name: "Auriga Prime".into(),
            loc: Loc::new(30, 10),
            resource_value: crate::economy::Stockpile::uniform(100),
            max_population: 8_000_000,
            colony: Some(Colony {
                owner: e2,
                population: 2_000_000,
                population_cargo: 0,
                facilities: vec![
                    Facility::new(FacilityKind::MineralExtractor),
                    Facility::new(FacilityKind::Spaceport),
                ],
                queue: Default::default(),
            }),
        }],
    });

    world.rebuild_registry().expect("fixture id sweep");

    let scout_id = world.designs[0].id;
    let corvette_id = world.designs[1].id;
    add_vehicle(&mut world, e1, scout_id, Loc::new(10, 10), "Pathfinder");
    add_vehicle(&mut world, e2, corvette_id, Loc::new(30, 10), "Vigilant");

    world
}

/// Same fixture, with the two empires at war.
pub fn hostile_two_empire_world() -> World {
    let mut world = two_empire_world();
    let (a, b) = (world.empires[0].id, world.empires[1].id);
    world
        .empire_mut(a)
        .unwrap()
        .relations
        .insert(b, Stance::Hostile);
    world
        .empire_mut(b)
        .unwrap()
        .relations
        .insert(a, Stance::Hostile);
    world
}

pub fn add_vehicle(
    world: &mut World,
    owner: EmpireId,
    design: ObjectId,
    loc: Loc,
    name: &str,
) -> ObjectId {
    let (shields, supply) = world
        .design(design)
        .map(|d| (d.max_shields(), d.supply_storage()))
        .expect("design exists");
    let mut vehicle = Vehicle {
        id: ObjectId::UNASSIGNED,
        fog: FogState::default(),
        name: name.into(),
        owner,
        design,
        loc,
        shields,
        hull_damage: 0,
        supply_remaining: supply,
        orders: Vec::new(),
        hops_done: 0,
    };
    world
        .registry
        .assign(&mut vehicle.id, EntityTag::Vehicle)
        .expect("id space");
    let id = vehicle.id;
    world.vehicles.push(vehicle);
    id
}

pub fn miner_design_id(world: &World) -> ObjectId {
    world
        .designs
        .iter()
        .find(|d| d.name == "Prospector")
        .map(|d| d.id)
        .expect("fixture has a miner design")
}

pub fn uncolonized_planet_loc(world: &World) -> Loc {
    world
        .systems
        .iter()
        .flat_map(|s| s.planets.iter())
        .find(|p| p.colony.is_none())
        .map(|p| p.loc)
        .expect("fixture has an uncolonized planet")
}

pub fn planet_at(world: &World, loc: Loc) -> Option<&Planet> {
    world
        .systems
        .iter()
        .flat_map(|s| s.planets.iter())
        .find(|p| p.id.is_live() && p.loc == loc)
}

/// A sector outside every system, unseen by everyone.
pub fn far_away_loc(_world: &World) -> Loc {
    Loc::new(50, 50)
}

pub fn enqueue_facility(
    world: &mut World,
    si: usize,
    pi: usize,
    kind: FacilityKind,
) -> ObjectId {
    let mut order = ConstructionOrder {
        id: ObjectId::UNASSIGNED,
        item: ConstructionItem::Facility { kind },
        paid: Default::default(),
    };
    world
        .registry
        .assign(&mut order.id, EntityTag::Order)
        .expect("id space");
    let id = order.id;
    world.systems[si].planets[pi]
        .colony
        .as_mut()
        .expect("colonized planet")
        .queue
        .orders
        .push(order);
    id
}

/// Battle engine stub: counts invocations, reports co-located owners as
/// participants, destroys nothing.
#[derive(Debug, Default)]
pub struct CountingBattles {
    pub count: usize,
}

impl BattleEngine for CountingBattles {
    fn resolve(&mut self, world: &mut World, loc: Loc, _rng: &mut dyn RngCore) -> BattleResult {
        self.count += 1;
        let mut participants: Vec<EmpireId> = Vec::new();
        for vi in world.vehicles_at(loc) {
            let owner = world.vehicles[vi].owner;
            if !participants.contains(&owner) {
                participants.push(owner);
            }
        }
        for sys in &world.systems {
            for planet in &sys.planets {
                if planet.id.is_live() && planet.loc == loc {
                    if let Some(colony) = planet.colony.as_ref() {
                        if !participants.contains(&colony.owner) {
                            participants.push(colony.owner);
                        }
                    }
                }
            }
        }
        BattleResult {
            participants,
            events: Vec::new(),
        }
    }
}

/// Command source backed by a map, for orchestrator tests.
#[derive(Debug, Default)]
pub struct InMemoryCommands {
    batches: Mutex<HashMap<(String, u32, u16), RawBatch>>,
}

impl InMemoryCommands {
    pub fn put(&self, game: &str, turn: u32, player: u16, batch: RawBatch) {
        self.batches
            .lock()
            .unwrap()
            .insert((game.to_owned(), turn, player), batch);
    }
}

impl CommandSource for InMemoryCommands {
    fn load_commands(
        &self,
        game: &str,
        turn: u32,
        player: u16,
    ) -> Result<Option<RawBatch>, PersistError> {
        Ok(self
            .batches
            .lock()
            .unwrap()
            .get(&(game.to_owned(), turn, player))
            .cloned())
    }
}
