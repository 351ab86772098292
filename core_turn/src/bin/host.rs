//! Headless turn host.
//!
//! Loads the host view of a game from a save directory, processes one turn,
//! and writes the next turn's save for every viewpoint:
//!
//! ```text
//! host <savedir> <game> <turn> [--safe] [--config <path>]
//! ```
//!
//! Combat resolution is a collaborator of the engine, not part of it; this
//! binary plugs in a deliberately simple skirmish resolver good enough for
//! hosting and smoke-testing.

use std::process::ExitCode;

use rand::{Rng, RngCore};
use tracing_subscriber::EnvFilter;

use core_turn::{
    persist::SaveDir,
    process_turn,
    space::Loc,
    status::StatusSink,
    turn::TurnDeps,
    world::World,
    BattleEngine, BattleResult, TurnConfig,
};
use sim_wire::EmpireId;

/// Minimal combat: every hostile pair at the sector exchanges fire; the
/// side with fewer weapons loses its weakest ship.
struct Skirmish;

impl BattleEngine for Skirmish {
    fn resolve(&mut self, world: &mut World, loc: Loc, rng: &mut dyn RngCore) -> BattleResult {
        let mut participants: Vec<EmpireId> = Vec::new();
        let mut weapons: std::collections::BTreeMap<u16, i64> = Default::default();
        for vi in world.vehicles_at(loc) {
            let v = &world.vehicles[vi];
            if !participants.contains(&v.owner) {
                participants.push(v.owner);
            }
            let guns = world
                .design(v.design)
                .map(|d| d.weapon_count())
                .unwrap_or(0);
            *weapons.entry(v.owner.0).or_insert(0) += guns.max(1);
        }

        let mut events = Vec::new();
        if let Some((&weakest, _)) = weapons.iter().min_by_key(|(_, w)| **w) {
            let losers: Vec<sim_wire::ObjectId> = world
                .vehicles_at(loc)
                .into_iter()
                .filter(|vi| world.vehicles[*vi].owner.0 == weakest)
                .map(|vi| world.vehicles[vi].id)
                .collect();
            // A coin flip decides whether the weaker side escapes intact.
            if !losers.is_empty() && rng.gen_bool(0.5) {
                let doomed = losers[rng.gen_range(0..losers.len())];
                let name = world
                    .vehicle(doomed)
                    .map(|v| v.name.clone())
                    .unwrap_or_default();
                let mut slot = doomed;
                world.registry.release(&mut slot);
                if let Some(v) = world.vehicle_mut(doomed) {
                    v.id = slot;
                }
                events.push(core_turn::battle::BattleEvent {
                    text: format!("{name} was destroyed."),
                    subject: Some(doomed),
                });
            }
        }
        BattleResult {
            participants,
            events,
        }
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        return Err("usage: host <savedir> <game> <turn> [--safe] [--config <path>]".into());
    }
    let savedir = &args[0];
    let game = &args[1];
    let turn: u32 = args[2]
        .parse()
        .map_err(|_| format!("invalid turn number {:?}", args[2]))?;
    let safe_mode = args.iter().any(|a| a == "--safe");
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1));

    let store = SaveDir::new(savedir).map_err(|e| e.to_string())?;
    let mut world = store
        .load_world(game, turn, 0)
        .map_err(|e| format!("failed to load {game} turn {turn}: {e}"))?;
    if let Some(path) = config_path {
        world.config =
            TurnConfig::from_file(std::path::Path::new(path)).map_err(|e| e.to_string())?;
    }

    let status = StatusSink::new();
    let mut battles = Skirmish;
    let mut deps = TurnDeps {
        commands: &store,
        battles: &mut battles,
        ai: None,
        hooks: None,
        status: status.clone(),
    };

    let report = process_turn(&mut world, &mut deps, safe_mode).map_err(|e| e.to_string())?;
    if !report.completed {
        let waiting: Vec<String> = report.missing.iter().map(|e| e.to_string()).collect();
        return Err(format!(
            "turn not processed; awaiting commands from: {}",
            waiting.join(", ")
        ));
    }
    if !report.missing.is_empty() {
        tracing::warn!(
            target: "starfall::host",
            missing = report.missing.len(),
            "some players submitted no commands; treated as passing"
        );
    }

    store.save_all(&world, &status).map_err(|e| e.to_string())?;
    println!(
        "{game}: turn {} processed, saves written to {}",
        world.turn_number,
        store.root().display()
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
