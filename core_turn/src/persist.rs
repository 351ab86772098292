//! File-backed persistence for turn state.
//!
//! One file per viewpoint per turn: the host's authoritative save plus one
//! redacted save per human player, and one command file per player. The
//! orchestrator itself only needs [`CommandSource`]; everything else is for
//! the hosting binary.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use sim_wire::{
    commands_file_name, decode_envelope, encode_envelope, state_file_name, state_hash, EmpireId,
    WireError,
};
use thiserror::Error;

use crate::{pipeline::RawBatch, redact::redact_world, status::StatusSink, world::World};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io failure on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("player views can only be produced from the host view")]
    NotHostView,
}

/// Where a player's commands come from at the top of a turn.
pub trait CommandSource {
    fn load_commands(
        &self,
        game: &str,
        turn: u32,
        player: u16,
    ) -> Result<Option<RawBatch>, PersistError>;
}

/// A directory of save and command files following the naming convention.
#[derive(Debug, Clone)]
pub struct SaveDir {
    root: PathBuf,
}

impl SaveDir {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| PersistError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, PersistError> {
        let path = self.root.join(name);
        fs::write(&path, bytes).map_err(|source| PersistError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Persist one world under its viewpoint's file name.
    pub fn save_world(&self, world: &World) -> Result<PathBuf, PersistError> {
        let player = world.viewpoint.map(|e| e.0).unwrap_or(0);
        let bytes = encode_envelope(&world.name, world.turn_number, player, world)?;
        let name = state_file_name(&world.name, world.turn_number, player);
        self.write(&name, &bytes)
    }

    /// Load a world save. The identity registry is rebuilt from the world
    /// graph afterward, repairing whatever a merge may have broken.
    pub fn load_world(&self, game: &str, turn: u32, player: u16) -> Result<World, PersistError> {
        let path = self.root.join(state_file_name(game, turn, player));
        let bytes = fs::read(&path).map_err(|source| PersistError::Io {
            path: path.clone(),
            source,
        })?;
        let envelope = decode_envelope::<World>(&bytes)?;
        let mut world = envelope.body;
        let recomputed = state_hash(&world)?;
        if recomputed != envelope.header.hash {
            tracing::warn!(
                target: "starfall::persist",
                expected = envelope.header.hash,
                found = recomputed,
                %game,
                turn,
                "state hash mismatch after load"
            );
        }
        if let Err(err) = world.rebuild_registry() {
            tracing::error!(target: "starfall::persist", %err, "registry rebuild failed after load");
        }
        world.consistency_check("after loading from disk");
        Ok(world)
    }

    /// Persist a player's command batch for the given game turn.
    pub fn save_commands(
        &self,
        game: &str,
        turn: u32,
        player: u16,
        batch: &RawBatch,
    ) -> Result<PathBuf, PersistError> {
        let bytes = encode_envelope(game, turn, player, batch)?;
        let name = commands_file_name(game, turn, player);
        self.write(&name, &bytes)
    }

    /// Save the host view plus one redacted view per human player.
    /// The host world itself is left untouched; views are made from clones.
    pub fn save_all(
        &self,
        world: &World,
        status: &StatusSink,
    ) -> Result<Vec<PathBuf>, PersistError> {
        if world.viewpoint.is_some() {
            return Err(PersistError::NotHostView);
        }

        let mut written = Vec::new();
        status.set_message("Saving game (host)");
        written.push(self.save_world(world)?);

        let humans: Vec<EmpireId> = world
            .empires
            .iter()
            .filter(|e| e.is_human)
            .map(|e| e.id)
            .collect();
        for empire in humans {
            status.set_message(format!("Saving game (player {})", empire.0));
            let mut view = world.clone();
            redact_world(&mut view, empire);
            written.push(self.save_world(&view)?);
        }
        tracing::info!(
            target: "starfall::persist",
            files = written.len(),
            game = %world.name,
            turn = world.turn_number,
            "saved all viewpoints"
        );
        Ok(written)
    }
}

impl CommandSource for SaveDir {
    fn load_commands(
        &self,
        game: &str,
        turn: u32,
        player: u16,
    ) -> Result<Option<RawBatch>, PersistError> {
        let path = self.root.join(commands_file_name(game, turn, player));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(PersistError::Io { path, source }),
        };
        let envelope = decode_envelope::<RawBatch>(&bytes)?;
        Ok(Some(envelope.body))
    }
}
