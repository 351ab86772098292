//! Victory condition evaluation.
//!
//! Modes are data-driven: the builtin set ships as JSON and hosts can extend
//! or disable modes through the turn config file. Victory checks run at the
//! end of every turn once the configured delay has elapsed (total
//! elimination ignores the delay).

use serde::{Deserialize, Serialize};
use sim_wire::EmpireId;

use crate::{economy, world::World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VictoryModeKind {
    /// Last empire with any assets standing.
    #[default]
    Elimination,
    /// First empire whose score passes a threshold.
    Score,
}

impl VictoryModeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VictoryModeKind::Elimination => "elimination",
            VictoryModeKind::Score => "score",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VictoryMode {
    pub kind: VictoryModeKind,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VictoryConfig {
    /// Turns before non-elimination conditions take effect.
    pub delay_turns: u32,
    pub modes: Vec<VictoryMode>,
}

/// True when the empire has no colonies and no vehicles left.
pub fn is_eliminated(world: &World, empire: EmpireId) -> bool {
    let has_colony = world.systems.iter().any(|sys| {
        sys.planets
            .iter()
            .any(|p| p.id.is_live() && p.colony.as_ref().is_some_and(|c| c.owner == empire))
    });
    let has_vehicle = world
        .vehicles
        .iter()
        .any(|v| v.id.is_live() && v.owner == empire);
    !has_colony && !has_vehicle
}

/// Progress toward a victory mode, 1.0 meaning the condition is met.
pub fn progress(world: &World, empire: EmpireId, mode: &VictoryMode) -> f64 {
    match mode.kind {
        VictoryModeKind::Elimination => {
            let rivals: Vec<_> = world
                .empires
                .iter()
                .filter(|e| e.id != empire)
                .map(|e| e.id)
                .collect();
            if rivals.is_empty() {
                return 0.0;
            }
            let dead = rivals
                .iter()
                .filter(|e| is_eliminated(world, **e))
                .count();
            dead as f64 / rivals.len() as f64
        }
        VictoryModeKind::Score => {
            if mode.threshold <= 0.0 {
                return 0.0;
            }
            economy::compute_score(world, empire) as f64 / mode.threshold
        }
    }
}

/// Evaluate all enabled victory modes and log outcomes to every empire.
pub fn evaluate(world: &mut World) {
    let config = world.config.victory.clone();
    let turn = world.turn_number;

    for mode in config.modes.iter().filter(|m| m.enabled) {
        let delay_passed = turn > config.delay_turns;
        if mode.kind != VictoryModeKind::Elimination && !delay_passed {
            continue;
        }

        let empire_ids: Vec<_> = world.empires.iter().map(|e| e.id).collect();
        let winners: Vec<_> = empire_ids
            .iter()
            .copied()
            .filter(|e| !is_eliminated(world, *e) && progress(world, *e, mode) >= 1.0)
            .collect();
        if winners.is_empty() {
            continue;
        }

        tracing::info!(
            target: "starfall::victory",
            mode = mode.kind.as_str(),
            winners = winners.len(),
            "victory condition met"
        );
        for id in &empire_ids {
            let text = if winners.contains(id) {
                format!("We have achieved a {} victory!", mode.kind.as_str())
            } else {
                let names: Vec<_> = world
                    .empires
                    .iter()
                    .filter(|e| winners.contains(&e.id))
                    .map(|e| e.name.clone())
                    .collect();
                format!(
                    "The game has been won by {} ({} victory).",
                    names.join(", "),
                    mode.kind.as_str()
                )
            };
            world.log_to(*id, text, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_config_defaults() {
        let cfg: VictoryConfig = serde_json::from_str(
            r#"{ "modes": [ { "kind": "score" } ] }"#,
        )
        .unwrap();
        assert_eq!(cfg.delay_turns, 0);
        assert!(!cfg.modes[0].enabled);
        assert_eq!(cfg.modes[0].threshold, 1.0);
    }
}
