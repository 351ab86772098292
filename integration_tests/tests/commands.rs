mod common;

use common::{two_empire_world, InMemoryCommands, StubBattles};
use core_turn::{
    commands::{Command, CommandBody},
    orders::{MoveTarget, Order, OrderBody, Waypoint, WaypointAnchor},
    pipeline::{ingest_batch, RawBatch},
    space::Loc,
    status::StatusSink,
    turn::TurnDeps,
    world::EntityTag,
};
use sim_wire::ObjectId;

#[test]
fn client_created_objects_resolve_to_unique_server_ids() {
    let mut world = two_empire_world();
    let empire = world.empires[0].id;
    let vehicle = world.vehicles[0].id;

    // The client named its new order 5 and its new waypoint 7; both ids are
    // already taken server-side, so both must be remapped.
    let mut squat_a = ObjectId(5);
    let mut squat_b = ObjectId(7);
    world.registry.assign(&mut squat_a, EntityTag::Design).unwrap();
    world.registry.assign(&mut squat_b, EntityTag::Design).unwrap();

    let batch = RawBatch::new(vec![Command {
        issuer: empire,
        executor: vehicle,
        body: CommandBody::AddOrder {
            order: Order {
                id: ObjectId(5),
                body: OrderBody::MoveTo {
                    dest: MoveTarget::Waypoint(ObjectId(7)),
                },
                complete: false,
            },
            waypoint: Some(Waypoint {
                id: ObjectId(7),
                anchor: WaypointAnchor::Fixed(Loc::new(12, 10)),
            }),
        },
    }]);
    let report = ingest_batch(&mut world, empire, batch).unwrap();
    assert_eq!(report.accepted, 1);

    let cmd = &world.empire(empire).unwrap().commands[0];
    let CommandBody::AddOrder { order, waypoint } = &cmd.body else {
        panic!("expected the move order to survive ingestion");
    };
    let order_id = order.id;
    let waypoint_id = waypoint.as_ref().unwrap().id;
    assert_ne!(order_id.0, 5);
    assert_ne!(waypoint_id.0, 7);
    assert_ne!(order_id, waypoint_id);
    assert!(world.registry.contains(order_id.0));
    assert!(world.registry.contains(waypoint_id.0));

    // Every reference to the client ids was rewritten consistently.
    let OrderBody::MoveTo {
        dest: MoveTarget::Waypoint(target),
    } = &order.body
    else {
        panic!("expected a waypoint move order");
    };
    assert_eq!(*target, waypoint_id);
}

#[test]
fn foreign_orders_are_rejected_and_logged_end_to_end() {
    let mut world = two_empire_world();
    let attacker = world.empires[0].id;
    let victim = world.empires[1].id;
    let victim_vehicle = world.vehicles[1].id;
    let victim_loc = world.vehicles[1].loc;

    let store = InMemoryCommands::default();
    store.put(
        &world.name,
        world.turn_number,
        attacker.0,
        RawBatch::new(vec![Command {
            issuer: attacker,
            executor: victim_vehicle,
            body: CommandBody::AddOrder {
                order: Order {
                    id: ObjectId(41),
                    body: OrderBody::MoveTo {
                        dest: MoveTarget::Sector(Loc::new(0, 0)),
                    },
                    complete: false,
                },
                waypoint: None,
            },
        }]),
    );

    let mut battles = StubBattles::default();
    let mut deps = TurnDeps {
        commands: &store,
        battles: &mut battles,
        ai: None,
        hooks: None,
        status: StatusSink::new(),
    };
    core_turn::process_turn(&mut world, &mut deps, false).unwrap();

    let hijacked = world.vehicle(victim_vehicle).unwrap();
    assert!(
        hijacked.orders.is_empty(),
        "the forged order must never reach the victim's ship"
    );
    assert_eq!(
        hijacked.loc, victim_loc,
        "the victim's ship must not have moved"
    );
    assert!(world
        .empire(attacker)
        .unwrap()
        .log
        .iter()
        .any(|l| l.text.contains("does not belong to us")));
    assert!(world
        .empire(victim)
        .unwrap()
        .log
        .iter()
        .all(|l| !l.text.contains("does not belong")));
}

#[test]
fn own_move_order_executes_through_a_full_turn() {
    let mut world = two_empire_world();
    let empire = world.empires[0].id;
    let mover = world.vehicles[0].id;
    let start = world.vehicles[0].loc;
    let dest = Loc::new(start.x + 2, start.y);

    let store = InMemoryCommands::default();
    store.put(
        &world.name,
        world.turn_number,
        empire.0,
        RawBatch::new(vec![Command {
            issuer: empire,
            executor: mover,
            body: CommandBody::AddOrder {
                order: Order {
                    id: ObjectId(8),
                    body: OrderBody::MoveTo {
                        dest: MoveTarget::Sector(dest),
                    },
                    complete: false,
                },
                waypoint: None,
            },
        }]),
    );

    let mut battles = StubBattles::default();
    let mut deps = TurnDeps {
        commands: &store,
        battles: &mut battles,
        ai: None,
        hooks: None,
        status: StatusSink::new(),
    };
    let report = core_turn::process_turn(&mut world, &mut deps, false).unwrap();
    assert!(report.completed);

    let ship = world.vehicle(mover).unwrap();
    assert_eq!(ship.loc, dest);
    assert!(
        ship.orders.is_empty(),
        "the completed order is disposed by the end-of-turn sweep"
    );
}
