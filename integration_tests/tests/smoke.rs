mod common;

use anyhow::Result;
use common::{two_empire_world, InMemoryCommands, StubBattles};
use core_turn::{status::StatusSink, turn::TurnDeps, SaveDir};

/// Host a short game end to end: process turns, write every viewpoint to
/// disk, and reload the host file for the next turn, the way a real host
/// process would.
#[test]
fn five_turns_through_the_full_save_cycle() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = SaveDir::new(dir.path())?;

    let mut world = two_empire_world();
    let game = world.name.clone();
    let first_turn = world.turn_number;

    for _ in 0..5 {
        let commands = InMemoryCommands::default();
        let mut battles = StubBattles::default();
        let status = StatusSink::new();
        let mut deps = TurnDeps {
            commands: &commands,
            battles: &mut battles,
            ai: None,
            hooks: None,
            status: status.clone(),
        };
        let report = core_turn::process_turn(&mut world, &mut deps, false)?;
        assert!(report.completed);
        assert_eq!(status.snapshot().progress, 1.0);

        store.save_all(&world, &status)?;
        world = store.load_world(&game, world.turn_number, 0)?;
    }

    assert_eq!(world.turn_number, first_turn + 5);

    // Economy ticked over: colonies earned, populations grew, scores exist.
    for empire in &world.empires {
        assert!(
            empire.scores.contains_key(&world.turn_number),
            "every empire gets a score snapshot each turn"
        );
    }
    let colony = world.systems[0].planets[0].colony.as_ref().unwrap();
    assert!(colony.population > 2_000_000);

    // All three viewpoints of the final turn exist on disk.
    for player in [0u16, 1, 2] {
        let path = dir
            .path()
            .join(sim_wire::state_file_name(&game, world.turn_number, player));
        assert!(path.exists(), "missing save for player {player}");
    }
    Ok(())
}

/// The status sink is observational: a caller polling mid-run sees monotonic
/// progress and the final message, and ignoring it entirely changes nothing.
#[test]
fn status_sink_reports_completion() -> Result<()> {
    let mut world = two_empire_world();
    let commands = InMemoryCommands::default();
    let mut battles = StubBattles::default();
    let status = StatusSink::new();
    let observer = status.clone();
    let mut deps = TurnDeps {
        commands: &commands,
        battles: &mut battles,
        ai: None,
        hooks: None,
        status,
    };
    core_turn::process_turn(&mut world, &mut deps, false)?;

    let report = observer.snapshot();
    assert_eq!(report.progress, 1.0);
    assert!(report.message.contains("complete"));
    assert!(report.error.is_none());
    Ok(())
}
