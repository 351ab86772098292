//! Shared fixtures for the cross-crate tests.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::RngCore;

use core_turn::{
    battle::BattleEvent,
    economy::Stockpile,
    empire::{Empire, Stance},
    persist::{CommandSource, PersistError},
    pipeline::RawBatch,
    space::{Colony, Facility, FacilityKind, Loc, Planet, StarSystem},
    vehicles::{ComponentKind, Design, Vehicle},
    visibility::{FogState, SensorChannels},
    world::EntityTag,
    BattleEngine, BattleResult, World,
};
use sim_wire::{EmpireId, ObjectId};

/// Two human empires with a home system, colony, and ship each.
pub fn two_empire_world() -> World {
    let mut world = World::new("vega", 7);

    let e1 = EmpireId(1);
    let e2 = EmpireId(2);
    world.empires.push(Empire::new(e1, "Meridian Combine", true));
    world.empires.push(Empire::new(e2, "Halcyon Accord", true));

    world.designs.push(Design {
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
    });
    world.designs.push(Design {
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
    });

    world.systems.push(home_system(
        "Kestrel",
        Loc::new(10, 10),
        1,
        e1,
        "Kestrel II",
    ));
    world.systems.push(home_system(
        "Auriga",
        Loc::new(30, 10),
        2,
        e2,
        "Auriga Prime",
    ));

    world.rebuild_registry().expect("fixture id sweep");

    let scout = world.designs[0].id;
    let corvette = world.designs[1].id;
    add_vehicle(&mut world, e1, scout, Loc::new(10, 10), "Pathfinder");
    add_vehicle(&mut world, e2, corvette, Loc::new(30, 10), "Vigilant");

    for empire in [e1, e2] {
        let emp = world.empire_mut(empire).unwrap();
        emp.stored = Stockpile::uniform(20_000);
    }

    world
}

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

fn home_system(
    name: &str,
    loc: Loc,
    star_count: u8,
    owner: EmpireId,
    colony_name: &str,
) -> StarSystem {
    StarSystem {
        id: ObjectId::UNASSIGNED,
        fog: FogState::default(),
        name: name.into(),
        description: format!("The {name} system."),
        loc,
        radius: 2,
        star_count,
        explored_by: vec![owner],
        planets: vec![Planet {
            id: ObjectId::UNASSIGNED,
            fog: FogState::default(),
            name: colony_name.into(),
            loc,
            resource_value: Stockpile::uniform(100),
            max_population: 8_000_000,
            colony: Some(Colony {
                owner,
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
        }],
    }
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

/// Battle engine stub: counts invocations and reports co-located owners.
#[derive(Debug, Default)]
pub struct StubBattles {
    pub count: usize,
}

impl BattleEngine for StubBattles {
    fn resolve(&mut self, world: &mut World, loc: Loc, _rng: &mut dyn RngCore) -> BattleResult {
        self.count += 1;
        let mut participants: Vec<EmpireId> = Vec::new();
        for vi in world.vehicles_at(loc) {
            let owner = world.vehicles[vi].owner;
            if !participants.contains(&owner) {
                participants.push(owner);
            }
        }
        BattleResult {
            participants,
            events: vec![BattleEvent {
                text: "Shots were exchanged.".into(),
                subject: None,
            }],
        }
    }
}

/// Command source backed by a map.
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
