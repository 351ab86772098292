//! The turn orchestrator.
//!
//! One call to [`process_turn`] advances the world by exactly one turn,
//! running the fixed phase sequence below against the host's authoritative
//! copy. A turn either fully commits (the world is left in its next-turn
//! state) or fully aborts (the caller still holds its pre-turn save); there
//! is no partial commit and no cancellation once started. Progress goes to
//! a shared [`StatusSink`] that a UI may poll; it never influences
//! processing.

use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use sim_wire::EmpireId;
use thiserror::Error;

use crate::{
    ai::EmpireAi,
    battle::BattleEngine,
    commands::{CommandOutcome, RejectReason},
    construction::run_construction,
    economy::{
        apply_spoilage, compute_score, pay_maintenance, perform_treaty_actions, run_colony_maintenance,
        run_research, run_resource_generation, scuttle_for_deficit,
    },
    logistics::{
        final_resupply, recover_population_from_cargo, regenerate_supplies, repair_facilities,
        repair_vehicles, replenish_shields, share_fleet_supplies, validate_fleets,
    },
    orders::resolve_destination,
    persist::{CommandSource, PersistError},
    pipeline::{ingest_batch, PipelineError},
    redact::{expire_obsolete_memories, redact_world, refresh_memories, update_known_designs},
    registry::RegistryError,
    status::StatusSink,
    tick::run_movement,
    rng::stream_seed,
    victory,
    world::World,
};

/// End-of-turn scripted hooks, supplied by the host.
pub trait TurnHooks {
    fn end_of_turn(&mut self, world: &mut World);
}

/// Everything the orchestrator borrows from its caller for one turn.
pub struct TurnDeps<'a> {
    pub commands: &'a dyn CommandSource,
    pub battles: &'a mut dyn BattleEngine,
    pub ai: Option<&'a mut dyn EmpireAi>,
    pub hooks: Option<&'a mut dyn TurnHooks>,
    pub status: StatusSink,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("turns can only be processed on the host view, not a player view")]
    NotHostView,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// What the caller learns from a turn attempt.
#[derive(Debug, Clone, Default)]
pub struct TurnReport {
    /// Human players whose command files were absent.
    pub missing: Vec<EmpireId>,
    /// False when safe mode aborted before the turn counter advanced.
    pub completed: bool,
}

/// Fraction of the progress bar spent inside the movement loop.
const MOVEMENT_PROGRESS_SHARE: f64 = 0.3;
const PHASE_PROGRESS: f64 = (1.0 - MOVEMENT_PROGRESS_SHARE) / 19.0;

pub fn process_turn(
    world: &mut World,
    deps: &mut TurnDeps<'_>,
    safe_mode: bool,
) -> Result<TurnReport, TurnError> {
    if world.viewpoint.is_some() {
        return Err(TurnError::NotHostView);
    }
    let status = deps.status.clone();
    status.set_progress(0.0);
    let span = tracing::info_span!(
        target: "starfall::turn",
        "process_turn",
        game = %world.name,
        turn = world.turn_number
    );
    let _entered = span.enter();

    // 1. Initialize: clear per-turn caches and records. Construction and
    // its siblings are simultaneous instants, so the ability cache stays
    // pinned until movement begins.
    status.set_message("Initializing turn");
    world.caches.abilities.enable();
    world.caches.treaties.clear();
    world.caches.battle_timestamps.clear();
    world.battles.clear();
    world.cleanup_floating();
    world.rebuild_registry()?;
    status.add_progress(PHASE_PROGRESS);

    // 2. AI turns, each against its own redacted view.
    status.set_message("Playing AI turns");
    if let Some(ai) = deps.ai.as_mut() {
        let ai_empires: Vec<EmpireId> = world
            .empires
            .iter()
            .filter(|e| !e.is_human)
            .map(|e| e.id)
            .collect();
        for empire in ai_empires {
            let mut view = world.clone();
            redact_world(&mut view, empire);
            let (batch, notes) = ai.act(&view, empire, &[]);
            ingest_batch(world, empire, batch)?;
            if let Some(emp) = world.empire_mut(empire) {
                emp.ai_notes = notes;
            }
        }
    }
    status.add_progress(PHASE_PROGRESS);

    // 3. Load player command batches.
    status.set_message("Loading player commands");
    let mut missing: Vec<EmpireId> = Vec::new();
    let humans: Vec<EmpireId> = world
        .empires
        .iter()
        .filter(|e| e.is_human)
        .map(|e| e.id)
        .collect();
    for empire in humans {
        match deps
            .commands
            .load_commands(&world.name, world.turn_number, empire.0)?
        {
            Some(batch) => {
                ingest_batch(world, empire, batch)?;
            }
            None => missing.push(empire),
        }
    }
    if safe_mode && !missing.is_empty() {
        tracing::warn!(
            target: "starfall::turn",
            missing = missing.len(),
            "safe mode abort: player commands missing"
        );
        return Ok(TurnReport {
            missing,
            completed: false,
        });
    }
    world.consistency_check("after loading commands");
    status.add_progress(PHASE_PROGRESS);

    // 4. The turn begins in earnest.
    world.turn_number += 1;
    world.current_tick = 0.0;
    let mut rng = ChaCha8Rng::seed_from_u64(stream_seed(world.seed, world.turn_number, "turn"));
    status.add_progress(PHASE_PROGRESS);

    // 5. Colony maintenance on its cadences.
    status.set_message("Maintaining colonies");
    run_colony_maintenance(world);
    status.add_progress(PHASE_PROGRESS);

    // 6. Resource generation.
    status.set_message("Generating resources");
    run_resource_generation(world);
    world.consistency_check("after resource generation");
    status.add_progress(PHASE_PROGRESS);

    // 7. Per-empire maintenance: upkeep, commands, treaties, research.
    let empire_ids: Vec<EmpireId> = world.empires.iter().map(|e| e.id).collect();
    let empire_count = empire_ids.len();
    for (index, empire) in empire_ids.iter().copied().enumerate() {
        status.set_message(format!(
            "Maintaining empires ({} of {empire_count})",
            index + 1
        ));
        pay_maintenance(world, empire);
        scuttle_for_deficit(world, empire, &mut rng);
        execute_empire_commands(world, empire);
        perform_treaty_actions(world, empire);
        run_research(world, empire, &mut rng);
        if let Some(emp) = world.empire_mut(empire) {
            emp.stored.clamp_non_negative();
        }
    }
    world.consistency_check("after empire maintenance");
    status.add_progress(PHASE_PROGRESS);

    // 8. Fleet validation and supply sharing.
    validate_fleets(world);
    share_fleet_supplies(world);
    status.add_progress(PHASE_PROGRESS);

    // 9. Construction queues.
    status.set_message("Constructing objects");
    run_construction(world);
    world.consistency_check("after construction");
    status.add_progress(PHASE_PROGRESS);

    // 10. Shields up before anyone moves.
    status.set_message("Replenishing shields");
    replenish_shields(world);
    status.add_progress(PHASE_PROGRESS);

    // 11. Movement and combat triggering.
    status.set_message("Moving ships");
    run_movement(world, deps.battles, &mut rng, &status, MOVEMENT_PROGRESS_SHARE);
    world.caches.abilities.enable();

    // 12. Post-movement cleanup.
    status.set_message("Cleaning up");
    validate_fleets(world);
    share_fleet_supplies(world);
    recover_population_from_cargo(world);
    replenish_shields(world);
    repair_facilities(world);
    repair_vehicles(world);
    regenerate_supplies(world);
    final_resupply(world);
    status.add_progress(PHASE_PROGRESS);

    // 13. Spoilage, command-queue clear, score snapshot.
    let turn = world.turn_number;
    for empire in world.empires.iter().map(|e| e.id).collect::<Vec<_>>() {
        apply_spoilage(world, empire);
        let score = compute_score(world, empire);
        if let Some(emp) = world.empire_mut(empire) {
            emp.commands.clear();
            emp.scores.insert(turn, score);
        }
    }
    status.add_progress(PHASE_PROGRESS);

    // 14. Completed orders are disposed; orders whose target vanished are
    // completed first so they get swept too.
    clear_completed_orders(world);
    status.add_progress(PHASE_PROGRESS);

    // 15. Known designs follow current scan visibility.
    update_known_designs(world);
    status.add_progress(PHASE_PROGRESS);

    // 16. Expire memory snapshots that no longer say anything.
    expire_obsolete_memories(world);
    status.add_progress(PHASE_PROGRESS);

    // 17. Victory conditions.
    victory::evaluate(world);
    status.add_progress(PHASE_PROGRESS);

    // 18. Orphaned waypoints.
    dispose_orphaned_waypoints(world);
    status.add_progress(PHASE_PROGRESS);

    // 19. End-of-turn scripted hooks.
    status.set_message("Executing scripts");
    if let Some(hooks) = deps.hooks.as_mut() {
        hooks.end_of_turn(world);
    }
    status.add_progress(PHASE_PROGRESS);

    // 20. Final sweep.
    world.cleanup_floating();
    refresh_memories(world);
    world.consistency_check("at end of turn");
    status.set_message(format!("Turn {} complete", world.turn_number));
    status.set_progress(1.0);

    Ok(TurnReport {
        missing,
        completed: true,
    })
}

/// Execute one empire's queued commands, logging every rejection to the
/// issuer rather than interrupting the turn.
fn execute_empire_commands(world: &mut World, empire: EmpireId) {
    let queued = world
        .empire(empire)
        .map(|e| e.commands.clone())
        .unwrap_or_default();
    for cmd in queued {
        if cmd.issuer != empire {
            // A command sitting on the wrong empire's queue is forgery.
            let issuer = cmd.issuer;
            let owner_name = world
                .empire(empire)
                .map(|e| e.name.clone())
                .unwrap_or_default();
            world.log_to(
                issuer,
                format!("We cannot issue a command to an object belonging to {owner_name}!"),
                None,
            );
            continue;
        }
        match crate::commands::execute_command(world, &cmd) {
            CommandOutcome::Executed => {}
            CommandOutcome::Rejected(RejectReason::MissingExecutor) => {
                world.log_to(
                    empire,
                    format!(
                        "Attempted to issue a command to a nonexistent object with id {}. \
                         This is probably a game bug.",
                        cmd.executor
                    ),
                    None,
                );
            }
            CommandOutcome::Rejected(RejectReason::NotOwner) => {
                world.log_to(
                    empire,
                    format!(
                        "We cannot issue commands to {} because it does not belong to us!",
                        cmd.executor
                    ),
                    Some(cmd.executor),
                );
            }
            CommandOutcome::Rejected(RejectReason::InvalidState(reason)) => {
                world.log_to(
                    empire,
                    format!("A command could not be carried out: {reason}."),
                    Some(cmd.executor),
                );
            }
        }
    }
}

fn clear_completed_orders(world: &mut World) {
    // Orders aimed at something that no longer exists count as complete.
    let dead_targets: Vec<(sim_wire::ObjectId, usize)> = world
        .vehicles
        .iter()
        .flat_map(|v| {
            v.orders
                .iter()
                .enumerate()
                .filter(|(_, o)| !o.complete && resolve_destination(world, &o.body).is_none())
                .map(move |(oi, _)| (v.id, oi))
        })
        .collect();
    for (vid, oi) in dead_targets {
        if let Some(v) = world.vehicle_mut(vid) {
            v.orders[oi].complete = true;
        }
    }

    let mut registry = std::mem::take(&mut world.registry);
    for vehicle in &mut world.vehicles {
        for order in &mut vehicle.orders {
            if order.complete {
                registry.release(&mut order.id);
            }
        }
    }
    world.registry = registry;
    world.purge_disposed();
}

fn dispose_orphaned_waypoints(world: &mut World) {
    let orphans: Vec<sim_wire::ObjectId> = world
        .waypoints
        .iter()
        .filter(|w| w.id.is_live() && w.is_orphaned(world))
        .map(|w| w.id)
        .collect();
    if orphans.is_empty() {
        return;
    }
    let mut registry = std::mem::take(&mut world.registry);
    for waypoint in &mut world.waypoints {
        if orphans.contains(&waypoint.id) {
            registry.release(&mut waypoint.id);
        }
    }
    world.registry = registry;
    world.purge_disposed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RawBatch;
    use crate::testkit::{self, CountingBattles, InMemoryCommands};

    #[test]
    fn safe_mode_reports_missing_players_without_advancing() {
        let mut world = testkit::two_empire_world();
        let turn_before = world.turn_number;
        let store = InMemoryCommands::default();
        let mut battles = CountingBattles::default();
        let mut deps = TurnDeps {
            commands: &store,
            battles: &mut battles,
            ai: None,
            hooks: None,
            status: StatusSink::new(),
        };
        let report = process_turn(&mut world, &mut deps, true).unwrap();
        assert!(!report.completed);
        assert_eq!(report.missing.len(), 2);
        assert_eq!(world.turn_number, turn_before);
    }

    #[test]
    fn missing_players_tolerated_outside_safe_mode() {
        let mut world = testkit::two_empire_world();
        let turn_before = world.turn_number;
        let store = InMemoryCommands::default();
        let mut battles = CountingBattles::default();
        let mut deps = TurnDeps {
            commands: &store,
            battles: &mut battles,
            ai: None,
            hooks: None,
            status: StatusSink::new(),
        };
        let report = process_turn(&mut world, &mut deps, false).unwrap();
        assert!(report.completed);
        assert_eq!(report.missing.len(), 2);
        assert_eq!(world.turn_number, turn_before + 1);
        assert_eq!(world.current_tick, 1.0);
    }

    #[test]
    fn player_views_cannot_process_turns() {
        let mut world = testkit::two_empire_world();
        world.viewpoint = Some(world.empires[0].id);
        let store = InMemoryCommands::default();
        let mut battles = CountingBattles::default();
        let mut deps = TurnDeps {
            commands: &store,
            battles: &mut battles,
            ai: None,
            hooks: None,
            status: StatusSink::new(),
        };
        assert!(matches!(
            process_turn(&mut world, &mut deps, false),
            Err(TurnError::NotHostView)
        ));
    }

    #[test]
    fn forged_batch_entry_leaves_victim_untouched_and_logs() {
        let mut world = testkit::two_empire_world();
        let attacker = world.empires[0].id;
        let victim_vehicle = world.vehicles[1].id;
        let original_name = world.vehicles[1].name.clone();

        let store = InMemoryCommands::default();
        store.put(
            &world.name,
            world.turn_number,
            attacker.0,
            RawBatch::new(vec![crate::commands::Command {
                issuer: attacker,
                executor: victim_vehicle,
                body: crate::commands::CommandBody::Rename {
                    name: "Prize Ship".into(),
                },
            }]),
        );

        let mut battles = CountingBattles::default();
        let mut deps = TurnDeps {
            commands: &store,
            battles: &mut battles,
            ai: None,
            hooks: None,
            status: StatusSink::new(),
        };
        process_turn(&mut world, &mut deps, false).unwrap();

        assert_eq!(world.vehicle(victim_vehicle).unwrap().name, original_name);
        assert!(world
            .empire(attacker)
            .unwrap()
            .log
            .iter()
            .any(|l| l.text.contains("does not belong to us")));
    }
}
