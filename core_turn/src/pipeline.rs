//! The command pipeline: from a submitted batch to validated, server-id
//! commands sitting on an empire's queue.
//!
//! Clients run a disconnected copy of the simulation and assign their own
//! ids to anything they create, so every batch goes through a remap that
//! exchanges client ids for server-authoritative ones and rewrites every
//! reference in the batch accordingly. Malformed entries (absent or
//! duplicated commands) are anomalies, not errors: they are dropped with a
//! diagnostic and the rest of the batch proceeds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sim_wire::EmpireId;
use thiserror::Error;

use crate::{registry::RegistryError, commands::Command, world::World};

/// A player's submitted batch, as it comes off the wire. Entries are
/// optional so one corrupt slot degrades to an anomaly instead of a decode
/// failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBatch {
    pub entries: Vec<Option<Command>>,
}

impl RawBatch {
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            entries: commands.into_iter().map(Some).collect(),
        }
    }
}

/// What ingestion did with one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub dropped_absent: usize,
    pub dropped_duplicate: usize,
    pub dropped_disposed: usize,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// One client id mapped to two different server ids; the batch is
    /// corrupt beyond local repair.
    #[error("client id {client} already mapped to server id {first}, cannot remap to {second}")]
    ClientIdConflict { client: i64, first: i64, second: i64 },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Validate, remap, and queue a batch for `empire`. Replaces whatever was
/// queued before. Authorization happens later, at execution time.
pub fn ingest_batch(
    world: &mut World,
    empire: EmpireId,
    batch: RawBatch,
) -> Result<IngestReport, PipelineError> {
    let mut report = IngestReport::default();

    let mut commands: Vec<Command> = Vec::with_capacity(batch.entries.len());
    for entry in batch.entries {
        match entry {
            None => report.dropped_absent += 1,
            Some(cmd) => {
                if commands.contains(&cmd) {
                    report.dropped_duplicate += 1;
                } else {
                    commands.push(cmd);
                }
            }
        }
    }
    if report.dropped_absent > 0 || report.dropped_duplicate > 0 {
        tracing::warn!(
            target: "starfall::pipeline",
            empire = %empire,
            absent = report.dropped_absent,
            duplicates = report.dropped_duplicate,
            "command batch contained anomalies"
        );
    }

    // Client → server id map for everything the batch introduces.
    let mut idmap: BTreeMap<i64, i64> = BTreeMap::new();
    let mut accepted: Vec<Command> = Vec::new();
    for mut cmd in commands {
        if cmd.carries_disposed_referrable() {
            report.dropped_disposed += 1;
            world.log_to(
                empire,
                "A submitted command referenced an already-deleted object and was \
                 ignored. This may be a game bug."
                    .to_string(),
                None,
            );
            continue;
        }

        let mut registry = std::mem::take(&mut world.registry);
        let mut conflict: Option<PipelineError> = None;
        for (slot, tag) in cmd.new_referrable_slots() {
            let client = slot.0;
            let server = match registry.assign_new(slot, tag) {
                Ok(id) => id,
                Err(err) => {
                    conflict = Some(err.into());
                    break;
                }
            };
            match idmap.get(&client) {
                Some(existing) if *existing != server => {
                    conflict = Some(PipelineError::ClientIdConflict {
                        client,
                        first: *existing,
                        second: server,
                    });
                    break;
                }
                Some(_) => {}
                None => {
                    idmap.insert(client, server);
                }
            }
        }
        world.registry = registry;
        if let Some(err) = conflict {
            return Err(err);
        }
        accepted.push(cmd);
    }

    for cmd in &mut accepted {
        cmd.rewrite_ids(&idmap);
    }

    report.accepted = accepted.len();
    tracing::debug!(
        target: "starfall::pipeline",
        empire = %empire,
        accepted = report.accepted,
        remapped = idmap.len(),
        "command batch ingested"
    );
    if let Some(emp) = world.empire_mut(empire) {
        emp.commands = accepted;
    }
    Ok(report)
}
