use criterion::{criterion_group, criterion_main, Criterion};
use rand::RngCore;

use core_turn::{
    empire::Empire,
    persist::{CommandSource, PersistError},
    pipeline::RawBatch,
    space::{Colony, Facility, FacilityKind, Loc, Planet, StarSystem},
    status::StatusSink,
    turn::TurnDeps,
    vehicles::{ComponentKind, Design, Vehicle},
    visibility::FogState,
    world::EntityTag,
    BattleEngine, BattleResult, World,
};
use sim_wire::{EmpireId, ObjectId};

struct NoCommands;

impl CommandSource for NoCommands {
    fn load_commands(
        &self,
        _game: &str,
        _turn: u32,
        _player: u16,
    ) -> Result<Option<RawBatch>, PersistError> {
        Ok(None)
    }
}

struct NoBattles;

impl BattleEngine for NoBattles {
    fn resolve(
        &mut self,
        _world: &mut World,
        _loc: Loc,
        _rng: &mut dyn RngCore,
    ) -> BattleResult {
        BattleResult::default()
    }
}

fn bench_world(empire_count: u16, systems_per_empire: usize) -> World {
    let mut world = World::new("bench", 99);
    for e in 1..=empire_count {
        let id = EmpireId(e);
        world.empires.push(Empire::new(id, format!("Empire {e}"), true));
        world.designs.push(Design {
            id: ObjectId::UNASSIGNED,
            name: format!("Freighter {e}"),
            owner: id,
            hull_size: 300,
            speed: 2,
            components: vec![ComponentKind::Engine, ComponentKind::SupplyPod],
        });
        for s in 0..systems_per_empire {
            let loc = Loc::new(i32::from(e) * 20, s as i32 * 10);
            world.systems.push(StarSystem {
                id: ObjectId::UNASSIGNED,
                fog: FogState::default(),
                name: format!("System {e}-{s}"),
                description: String::new(),
                loc,
                radius: 2,
                star_count: 1,
                explored_by: vec![id],
                planets: vec![Planet {
                    id: ObjectId::UNASSIGNED,
                    fog: FogState::default(),
                    name: format!("Colony {e}-{s}"),
                    loc,
                    resource_value: core_turn::economy::Stockpile::uniform(100),
                    max_population: 8_000_000,
                    colony: Some(Colony {
                        owner: id,
                        population: 1_500_000,
                        population_cargo: 0,
                        facilities: vec![
                            Facility::new(FacilityKind::MineralExtractor),
                            Facility::new(FacilityKind::Spaceport),
                        ],
                        queue: Default::default(),
                    }),
                }],
            });
        }
    }
    world.rebuild_registry().expect("bench world sweep");
    let design_ids: Vec<(EmpireId, ObjectId)> = world
        .designs
        .iter()
        .map(|d| (d.owner, d.id))
        .collect();
    for (owner, design) in design_ids {
        let loc = Loc::new(i32::from(owner.0) * 20, 0);
        let mut vehicle = Vehicle {
            id: ObjectId::UNASSIGNED,
            fog: FogState::default(),
            name: format!("Hauler {}", owner.0),
            owner,
            design,
            loc,
            shields: 0,
            hull_damage: 0,
            supply_remaining: 350,
            orders: Vec::new(),
            hops_done: 0,
        };
        world
            .registry
            .assign(&mut vehicle.id, EntityTag::Vehicle)
            .expect("bench id");
        world.vehicles.push(vehicle);
    }
    world
}

fn turn_throughput(c: &mut Criterion) {
    c.bench_function("process_turn 4x8", |b| {
        b.iter_batched(
            || bench_world(4, 8),
            |mut world| {
                let store = NoCommands;
                let mut battles = NoBattles;
                let mut deps = TurnDeps {
                    commands: &store,
                    battles: &mut battles,
                    ai: None,
                    hooks: None,
                    status: StatusSink::new(),
                };
                core_turn::process_turn(&mut world, &mut deps, false).expect("turn");
                world
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, turn_throughput);
criterion_main!(benches);
