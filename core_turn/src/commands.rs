//! Player commands and their execution.
//!
//! A command names an issuer, an executor, and a payload. Payloads that
//! introduce brand-new objects (orders, waypoints, fleets, queue entries)
//! carry them whole, with ids the client assigned in its own disconnected
//! copy of the game; the pipeline remaps those to server ids before any
//! command runs. Rejection is a value, not an error: forged or stale
//! commands land in the issuer's log and the turn keeps going.

use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    construction::ConstructionOrder,
    empire::TechId,
    orders::{MoveTarget, Order, OrderBody, Waypoint, WaypointAnchor},
    vehicles::Fleet,
    world::{EntityTag, World},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub issuer: EmpireId,
    pub executor: ObjectId,
    pub body: CommandBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandBody {
    /// Queue a movement order on the executor vehicle. May carry a new
    /// waypoint the order refers to.
    AddOrder {
        order: Order,
        waypoint: Option<Waypoint>,
    },
    RemoveOrder {
        order: ObjectId,
    },
    /// Executor is the issuing empire itself; the fleet is a new referrable.
    CreateFleet {
        fleet: Fleet,
    },
    DisbandFleet,
    /// Executor is a colonized planet; the queue entry is a new referrable.
    EnqueueConstruction {
        order: ConstructionOrder,
    },
    DequeueConstruction {
        order: ObjectId,
    },
    /// Executor is the issuing empire itself.
    SetResearch {
        spending: Vec<(TechId, u8)>,
        queue: Vec<TechId>,
    },
    Scrap,
    Rename {
        name: String,
    },
}

/// Why a command did not run. Logged to the issuer, never thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Executor exists but belongs to someone else.
    NotOwner,
    /// Executor id resolves to nothing; usually an engine defect.
    MissingExecutor,
    InvalidState(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Executed,
    Rejected(RejectReason),
}

impl Command {
    /// Mutable slots of every object this command newly introduces, paired
    /// with its registry tag. The pipeline remaps these client ids.
    pub fn new_referrable_slots(&mut self) -> Vec<(&mut ObjectId, EntityTag)> {
        match &mut self.body {
            CommandBody::AddOrder { order, waypoint } => {
                let mut slots = vec![(&mut order.id, EntityTag::Order)];
                if let Some(w) = waypoint {
                    slots.push((&mut w.id, EntityTag::Waypoint));
                }
                slots
            }
            CommandBody::CreateFleet { fleet } => vec![(&mut fleet.id, EntityTag::Fleet)],
            CommandBody::EnqueueConstruction { order } => {
                vec![(&mut order.id, EntityTag::Order)]
            }
            _ => Vec::new(),
        }
    }

    /// True when any newly introduced object was already disposed client
    /// side; such a command is discarded whole.
    pub fn carries_disposed_referrable(&self) -> bool {
        match &self.body {
            CommandBody::AddOrder { order, waypoint } => {
                order.id.is_tombstone()
                    || waypoint.as_ref().is_some_and(|w| w.id.is_tombstone())
            }
            CommandBody::CreateFleet { fleet } => fleet.id.is_tombstone(),
            CommandBody::EnqueueConstruction { order } => order.id.is_tombstone(),
            _ => false,
        }
    }

    /// Rewrite every id reference through the client→server map.
    pub fn rewrite_ids(&mut self, map: &std::collections::BTreeMap<i64, i64>) {
        let fix = |id: &mut ObjectId| {
            if let Some(server) = map.get(&id.0) {
                *id = ObjectId(*server);
            }
        };
        fix(&mut self.executor);
        match &mut self.body {
            CommandBody::AddOrder { order, waypoint } => {
                match &mut order.body {
                    OrderBody::MoveTo { dest } => {
                        if let MoveTarget::Waypoint(id) = dest {
                            fix(id);
                        }
                    }
                }
                if let Some(w) = waypoint {
                    if let WaypointAnchor::Object(id) = &mut w.anchor {
                        fix(id);
                    }
                }
            }
            CommandBody::RemoveOrder { order } => fix(order),
            CommandBody::CreateFleet { fleet } => {
                for id in fleet.vehicles.iter_mut() {
                    fix(id);
                }
            }
            CommandBody::EnqueueConstruction { order } => {
                if let crate::construction::ConstructionItem::Vehicle { design, .. } =
                    &mut order.item
                {
                    fix(design);
                }
            }
            CommandBody::DequeueConstruction { order } => fix(order),
            CommandBody::DisbandFleet
            | CommandBody::SetResearch { .. }
            | CommandBody::Scrap
            | CommandBody::Rename { .. } => {}
        }
    }
}

/// Run one validated command against the world.
///
/// Authorization happens here, at execution time: the issuer must own the
/// executor or be the executor. Outcomes are returned, and the caller logs
/// rejections to the issuer's event log.
pub fn execute_command(world: &mut World, cmd: &Command) -> CommandOutcome {
    let is_self = world
        .empire(cmd.issuer)
        .is_some_and(|e| e.object_id == cmd.executor);
    if !is_self {
        match world.owner_of(cmd.executor) {
            None => return CommandOutcome::Rejected(RejectReason::MissingExecutor),
            Some(owner) if owner != cmd.issuer => {
                return CommandOutcome::Rejected(RejectReason::NotOwner)
            }
            Some(_) => {}
        }
    }

    match &cmd.body {
        CommandBody::AddOrder { order, waypoint } => {
            let Some(vehicle) = world.vehicle(cmd.executor) else {
                return CommandOutcome::Rejected(RejectReason::MissingExecutor);
            };
            if vehicle.fog.memory {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "cannot order a sensor memory".into(),
                ));
            }
            if let Some(w) = waypoint.clone() {
                world.waypoints.push(w);
            }
            world
                .vehicle_mut(cmd.executor)
                .expect("checked above")
                .orders
                .push(order.clone());
            CommandOutcome::Executed
        }
        CommandBody::RemoveOrder { order } => {
            let Some(vehicle) = world.vehicle_mut(cmd.executor) else {
                return CommandOutcome::Rejected(RejectReason::MissingExecutor);
            };
            let Some(pos) = vehicle.orders.iter().position(|o| o.id == *order) else {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "no such order on executor".into(),
                ));
            };
            let mut removed = vehicle.orders.remove(pos);
            world.registry.release(&mut removed.id);
            CommandOutcome::Executed
        }
        CommandBody::CreateFleet { fleet } => {
            let foreign = fleet.vehicles.iter().any(|vid| {
                world
                    .vehicle(*vid)
                    .map(|v| v.owner != cmd.issuer)
                    .unwrap_or(true)
            });
            if foreign {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "fleet may only contain own live vehicles".into(),
                ));
            }
            let mut fleet = fleet.clone();
            fleet.owner = cmd.issuer;
            world.fleets.push(fleet);
            CommandOutcome::Executed
        }
        CommandBody::DisbandFleet => {
            let Some(fleet) = world.fleet_mut(cmd.executor) else {
                return CommandOutcome::Rejected(RejectReason::MissingExecutor);
            };
            fleet.vehicles.clear();
            let mut id = fleet.id;
            world.registry.release(&mut id);
            world.fleet_mut(cmd.executor).expect("checked above").id = id;
            CommandOutcome::Executed
        }
        CommandBody::EnqueueConstruction { order } => {
            let Some(planet) = world.planet_mut(cmd.executor) else {
                return CommandOutcome::Rejected(RejectReason::MissingExecutor);
            };
            let Some(colony) = planet.colony.as_mut() else {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "planet has no colony".into(),
                ));
            };
            colony.queue.orders.push(order.clone());
            CommandOutcome::Executed
        }
        CommandBody::DequeueConstruction { order } => {
            let Some(planet) = world.planet_mut(cmd.executor) else {
                return CommandOutcome::Rejected(RejectReason::MissingExecutor);
            };
            let Some(colony) = planet.colony.as_mut() else {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "planet has no colony".into(),
                ));
            };
            let Some(pos) = colony.queue.orders.iter().position(|o| o.id == *order) else {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "no such construction order".into(),
                ));
            };
            let mut removed = colony.queue.orders.remove(pos);
            world.registry.release(&mut removed.id);
            CommandOutcome::Executed
        }
        CommandBody::SetResearch { spending, queue } => {
            let total: u32 = spending.iter().map(|(_, pct)| u32::from(*pct)).sum();
            if total > 100 {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "research percentages exceed 100".into(),
                ));
            }
            let emp = world.empire_mut(cmd.issuer).expect("issuer must exist");
            emp.research.spending = spending.clone();
            emp.research.queue = queue.clone();
            CommandOutcome::Executed
        }
        CommandBody::Scrap => {
            let Some(vehicle) = world.vehicle(cmd.executor) else {
                return CommandOutcome::Rejected(RejectReason::MissingExecutor);
            };
            if vehicle.fog.memory {
                return CommandOutcome::Rejected(RejectReason::InvalidState(
                    "cannot scrap a sensor memory".into(),
                ));
            }
            let refund = world
                .design(vehicle.design)
                .map(|d| d.cost())
                .unwrap_or_default()
                .scaled(world.config.scrap_refund_percent, 100);
            let name = vehicle.name.clone();
            if let Some(emp) = world.empire_mut(cmd.issuer) {
                emp.stored += refund;
            }
            let mut id = cmd.executor;
            world.registry.release(&mut id);
            world.vehicle_mut(cmd.executor).expect("checked above").id = id;
            world.log_to(
                cmd.issuer,
                format!("{name} has been scrapped and its materials reclaimed."),
                None,
            );
            CommandOutcome::Executed
        }
        CommandBody::Rename { name } => {
            if let Some(v) = world.vehicle_mut(cmd.executor) {
                v.name = name.clone();
            } else if let Some(f) = world.fleet_mut(cmd.executor) {
                f.name = name.clone();
            } else if let Some(p) = world.planet_mut(cmd.executor) {
                p.name = name.clone();
            } else {
                return CommandOutcome::Rejected(RejectReason::MissingExecutor);
            }
            CommandOutcome::Executed
        }
    }
}
