//! Combat as an external collaborator.
//!
//! The turn engine decides *when* a battle happens (co-located mutually
//! hostile objects, per-sector cooldown) and records the result; the actual
//! resolution algorithm lives behind [`BattleEngine`] and is supplied by the
//! host.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{space::Loc, world::World};

/// Something notable that happened during a battle, in a form the players'
/// logs can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleEvent {
    pub text: String,
    pub subject: Option<ObjectId>,
}

/// What the collaborator reports back after resolving one battle.
#[derive(Debug, Clone, Default)]
pub struct BattleResult {
    pub participants: Vec<EmpireId>,
    pub events: Vec<BattleEvent>,
}

/// One resolved battle, kept on the world for the rest of the turn so each
/// participant's view can include a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleRecord {
    pub loc: Loc,
    pub turn: u32,
    pub timestamp: f64,
    pub participants: Vec<EmpireId>,
    pub events: Vec<BattleEvent>,
}

/// The combat resolution service. Implementations may destroy or damage
/// objects at `loc` directly on the world; the engine only requires that the
/// returned participant list is accurate.
pub trait BattleEngine {
    fn resolve(&mut self, world: &mut World, loc: Loc, rng: &mut dyn RngCore) -> BattleResult;
}
