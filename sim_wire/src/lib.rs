//! Wire and persistence layer for the Starfall turn server.
//!
//! Defines the stable object identity type shared between client and server,
//! the save-file naming conventions, versioned bincode envelopes for full
//! game states and command batches, and the deterministic state hash used by
//! the determinism tests. Contains no game logic.

use std::fmt;
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Bumped whenever the serialized layout of saves or command batches changes.
pub const WIRE_VERSION: u16 = 3;

/// Extension for full game state files (one per viewpoint).
pub const STATE_EXTENSION: &str = "sav";

/// Extension for per-player command batch files.
pub const COMMANDS_EXTENSION: &str = "cmd";

/// Stable identity of a simulation object.
///
/// `0` means not yet assigned, positive ids are live and unique within one
/// registry, negative ids are permanent tombstones for disposed objects.
/// Clients assign their own ids to objects they create; the server remaps
/// those to authoritative ids when it ingests a command batch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl ObjectId {
    pub const UNASSIGNED: ObjectId = ObjectId(0);
    pub const TOMBSTONE: ObjectId = ObjectId(-1);

    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    pub fn is_live(self) -> bool {
        self.0 > 0
    }

    pub fn is_tombstone(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier for an empire participating in the game.
///
/// Distinct from [`ObjectId`]: empire numbers are small, dense, and stable
/// for the whole game, and double as the player index in save file names
/// (1-based; 0 is the host viewpoint).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EmpireId(pub u16);

impl fmt::Display for EmpireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Name of a full-state file. `player` 0 is the host/master viewpoint.
pub fn state_file_name(game: &str, turn: u32, player: u16) -> String {
    if player == 0 {
        format!("{game}_{turn}.{STATE_EXTENSION}")
    } else {
        format!("{game}_{turn}_{player:04}.{STATE_EXTENSION}")
    }
}

/// Name of a player's command batch file. The host has no command file,
/// so `player` must be nonzero; callers enforce that.
pub fn commands_file_name(game: &str, turn: u32, player: u16) -> String {
    format!("{game}_{turn}_{player:04}.{COMMANDS_EXTENSION}")
}

/// Header prepended to every persisted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub version: u16,
    pub game: String,
    pub turn: u32,
    /// Viewpoint (state files) or submitting player (command files).
    /// 0 is the host.
    pub player: u16,
    /// Deterministic hash of the body, for integrity and determinism checks.
    pub hash: u64,
}

/// A versioned, hashed envelope around a serializable body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub header: SaveHeader,
    pub body: T,
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode failed: {0}")]
    Encode(#[source] bincode::Error),
    #[error("decode failed: {0}")]
    Decode(#[source] bincode::Error),
    #[error("unsupported wire version {found} (expected {expected})")]
    VersionMismatch { found: u16, expected: u16 },
}

/// Deterministic hash of any serializable value.
///
/// `ahash` with pinned seeds so the result is stable across processes and
/// runs; the default `RandomState` would randomize per process.
pub fn state_hash<T: Serialize>(value: &T) -> Result<u64, WireError> {
    let encoded = bincode::serialize(value).map_err(WireError::Encode)?;
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    Ok(hasher.finish())
}

/// Wrap and serialize a payload. The header hash is computed here.
pub fn encode_envelope<T: Serialize>(
    game: &str,
    turn: u32,
    player: u16,
    body: T,
) -> Result<Vec<u8>, WireError> {
    let hash = state_hash(&body)?;
    let envelope = Envelope {
        header: SaveHeader {
            version: WIRE_VERSION,
            game: game.to_owned(),
            turn,
            player,
            hash,
        },
        body,
    };
    bincode::serialize(&envelope).map_err(WireError::Encode)
}

/// Deserialize an envelope, rejecting unknown wire versions.
///
/// The stored body hash is returned alongside the payload; callers that care
/// about integrity compare it against a recomputed [`state_hash`].
pub fn decode_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<Envelope<T>, WireError> {
    let envelope: Envelope<T> = bincode::deserialize(bytes).map_err(WireError::Decode)?;
    if envelope.header.version != WIRE_VERSION {
        return Err(WireError::VersionMismatch {
            found: envelope.header.version,
            expected: WIRE_VERSION,
        });
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        label: String,
        values: Vec<i64>,
    }

    fn payload() -> Payload {
        Payload {
            label: "alpha".into(),
            values: vec![1, 2, 3],
        }
    }

    #[test]
    fn file_names_follow_convention() {
        assert_eq!(state_file_name("nebula", 12, 0), "nebula_12.sav");
        assert_eq!(state_file_name("nebula", 12, 3), "nebula_12_0003.sav");
        assert_eq!(commands_file_name("nebula", 12, 3), "nebula_12_0003.cmd");
    }

    #[test]
    fn envelope_round_trip() {
        let bytes = encode_envelope("nebula", 7, 2, payload()).unwrap();
        let envelope: Envelope<Payload> = decode_envelope(&bytes).unwrap();
        assert_eq!(envelope.header.version, WIRE_VERSION);
        assert_eq!(envelope.header.game, "nebula");
        assert_eq!(envelope.header.turn, 7);
        assert_eq!(envelope.header.player, 2);
        assert_eq!(envelope.body, payload());
        assert_eq!(envelope.header.hash, state_hash(&payload()).unwrap());
    }

    #[test]
    fn version_mismatch_rejected() {
        let mut envelope = Envelope {
            header: SaveHeader {
                version: WIRE_VERSION + 1,
                game: "nebula".into(),
                turn: 1,
                player: 0,
                hash: 0,
            },
            body: payload(),
        };
        envelope.header.hash = state_hash(&envelope.body).unwrap();
        let bytes = bincode::serialize(&envelope).unwrap();
        let err = decode_envelope::<Payload>(&bytes).unwrap_err();
        assert!(matches!(err, WireError::VersionMismatch { .. }));
    }

    #[test]
    fn state_hash_is_stable_and_sensitive() {
        let a = state_hash(&payload()).unwrap();
        let b = state_hash(&payload()).unwrap();
        assert_eq!(a, b);

        let mut other = payload();
        other.values[1] = 99;
        assert_ne!(a, state_hash(&other).unwrap());
    }

    #[test]
    fn object_id_states() {
        assert!(ObjectId::UNASSIGNED.is_unassigned());
        assert!(ObjectId(42).is_live());
        assert!(ObjectId::TOMBSTONE.is_tombstone());
        assert!(!ObjectId(42).is_tombstone());
    }
}
