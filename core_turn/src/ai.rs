//! AI decision-making as an external collaborator.

use serde::Serialize;
use sim_wire::EmpireId;

use crate::{pipeline::RawBatch, world::World};

/// Notes the AI carries between turns; stored on its empire, opaque here.
pub type AiNotes = serde_json::Value;

/// Decision-maker for non-human empires.
///
/// `act` is called once per AI empire per turn with that empire's *redacted*
/// copy of the world, so the AI sees exactly what a human player in the
/// same position would. Whatever it returns goes through the same command
/// pipeline (id remap, validation) as a human batch.
pub trait EmpireAi {
    fn act(&mut self, view: &World, empire: EmpireId, focus_hints: &[String]) -> (RawBatch, AiNotes);
}

/// Serialize a value into AI notes, falling back to null on failure.
pub fn notes_from<T: Serialize>(value: &T) -> AiNotes {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
