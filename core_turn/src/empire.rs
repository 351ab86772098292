//! Empires: the players of the game, human or AI.
//!
//! An empire owns its command queue, its stored resources, its research
//! program, its diplomatic state, its persistent event log, and its sensor
//! memory: the last-known copies of foggable objects it can no longer see.
//! All maps that end up in saves are `BTreeMap` so serialization order is
//! deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    abilities::{Ability, AbilityKey},
    commands::Command,
    economy::{Resource, Stockpile},
    space::Planet,
    vehicles::{Fleet, Vehicle},
};

/// Diplomatic stance toward another empire. Hostility is checked mutually:
/// a battle triggers if either side considers the other hostile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Allied,
    #[default]
    Neutral,
    Hostile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treaty {
    pub partner: EmpireId,
    pub clauses: Vec<TreatyClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreatyClause {
    /// The grantor's objects lend this capability to the partner.
    ShareAbility { key: AbilityKey },
    /// Paid from the grantor's stores to the partner every turn.
    Tribute { resource: Resource, amount: i64 },
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TechId {
    Propulsion,
    Weapons,
    Shields,
    Mining,
    Construction,
    Sensors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResearchState {
    /// Percentage priorities, spent before anything else. Sums to <= 100.
    pub spending: Vec<(TechId, u8)>,
    /// Ordered queue for whatever the percentages leave over.
    pub queue: Vec<TechId>,
    pub levels: BTreeMap<TechId, u32>,
    pub accumulated: BTreeMap<TechId, i64>,
    /// One-off research granted by events; cleared every turn.
    pub bonus: i64,
}

impl ResearchState {
    pub fn level(&self, tech: TechId) -> u32 {
        self.levels.get(&tech).copied().unwrap_or(0)
    }
}

/// An entry in an empire's persistent event log. Player-facing failures
/// (rejected commands, lost ships) surface here, not as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub turn: u32,
    pub timestamp: f64,
    pub text: String,
    pub subject: Option<ObjectId>,
}

/// Last-known copy of a foggable object, held in an empire's memory map.
/// The copy keeps the original's identity and is flagged as memory so it can
/// never be mistaken for authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemoryRecord {
    Planet(Planet),
    Vehicle(Vehicle),
    Fleet(Fleet),
}

impl MemoryRecord {
    pub fn id(&self) -> ObjectId {
        match self {
            MemoryRecord::Planet(p) => p.id,
            MemoryRecord::Vehicle(v) => v.id,
            MemoryRecord::Fleet(f) => f.id,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            MemoryRecord::Planet(p) => p.fog.timestamp,
            MemoryRecord::Vehicle(v) => v.fog.timestamp,
            MemoryRecord::Fleet(f) => f.fog.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Empire {
    pub id: EmpireId,
    /// Registry identity of the empire itself; commands whose executor is
    /// the empire (research settings, fleet creation) point here.
    pub object_id: ObjectId,
    pub name: String,
    /// Human players submit command files; the rest are driven by the AI
    /// collaborator.
    pub is_human: bool,
    pub traits: Vec<Ability>,
    pub stored: Stockpile,
    pub relations: BTreeMap<EmpireId, Stance>,
    pub treaties: Vec<Treaty>,
    /// id -> last-known copy of an object this empire can no longer see.
    pub memory: BTreeMap<i64, MemoryRecord>,
    pub log: Vec<LogEntry>,
    pub commands: Vec<Command>,
    pub research: ResearchState,
    /// Score history keyed by turn number.
    pub scores: BTreeMap<u32, i64>,
    pub known_designs: Vec<ObjectId>,
    /// Scratch state the AI collaborator carries between turns.
    pub ai_notes: serde_json::Value,
}

impl Empire {
    pub fn new(id: EmpireId, name: impl Into<String>, is_human: bool) -> Self {
        Self {
            id,
            object_id: ObjectId::UNASSIGNED,
            name: name.into(),
            is_human,
            traits: Vec::new(),
            stored: Stockpile::default(),
            relations: BTreeMap::new(),
            treaties: Vec::new(),
            memory: BTreeMap::new(),
            log: Vec::new(),
            commands: Vec::new(),
            research: ResearchState::default(),
            scores: BTreeMap::new(),
            known_designs: Vec::new(),
            ai_notes: serde_json::Value::Null,
        }
    }

    pub fn stance_toward(&self, other: EmpireId) -> Stance {
        self.relations.get(&other).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stance_is_neutral() {
        let emp = Empire::new(EmpireId(1), "Meridian Combine", true);
        assert_eq!(emp.stance_toward(EmpireId(2)), Stance::Neutral);
    }
}
