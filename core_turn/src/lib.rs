//! Core turn-processing crate for the Starfall headless server.
//!
//! Provides the deterministic turn orchestrator for a persistent,
//! server-authoritative 4X strategy game: player command batches go in, the
//! shared world advances through a fixed phase sequence (economy,
//! construction, fractional-tick movement with combat triggering, scoring),
//! and one fog-of-war-redacted view per player comes out.
//!
//! The combat resolver, AI, and end-of-turn scripts are collaborator traits
//! supplied by the host; see [`battle::BattleEngine`], [`ai::EmpireAi`],
//! and [`turn::TurnHooks`].

pub mod abilities;
pub mod ai;
pub mod battle;
pub mod commands;
pub mod config;
pub mod construction;
pub mod economy;
pub mod empire;
pub mod logistics;
pub mod orders;
pub mod persist;
pub mod pipeline;
pub mod redact;
pub mod registry;
pub mod rng;
pub mod space;
pub mod status;
pub mod tick;
pub mod turn;
pub mod vehicles;
pub mod victory;
pub mod visibility;
pub mod world;

#[cfg(test)]
pub(crate) mod testkit;

pub use abilities::{ability_value, has_ability, Ability, AbilityKey};
pub use battle::{BattleEngine, BattleRecord, BattleResult};
pub use commands::{Command, CommandBody, CommandOutcome, RejectReason};
pub use config::TurnConfig;
pub use empire::{Empire, MemoryRecord, Stance};
pub use persist::{CommandSource, SaveDir};
pub use pipeline::{ingest_batch, RawBatch};
pub use redact::redact_world;
pub use space::{Loc, Planet, StarSystem};
pub use status::{StatusReport, StatusSink};
pub use turn::{process_turn, TurnDeps, TurnError, TurnHooks, TurnReport};
pub use vehicles::{Design, Fleet, Vehicle};
pub use visibility::Visibility;
pub use world::World;
