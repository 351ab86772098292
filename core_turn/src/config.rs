//! Turn processing configuration.
//!
//! A builtin config ships inside the binary; hosts can override it from a
//! JSON file. All fields have defaults so partial override files stay valid.

use std::{fs, io, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::victory::VictoryConfig;

pub const BUILTIN_TURN_CONFIG: &str = include_str!("data/turn_config.json");

/// Research cost growth per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TechnologyCost {
    /// `level * base`
    Low,
    /// `base` for level 1, `level^2 * base / 2` beyond
    #[default]
    Medium,
    /// `level^2 * base`
    High,
}

/// Who may see another empire's score history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreVisibility {
    #[default]
    Everyone,
    OwnOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Population growth runs on turns divisible by this cadence.
    pub reproduction_frequency: u32,
    /// Resource value drift runs on turns divisible by this cadence.
    pub value_change_frequency: u32,
    /// Per-cadence colony growth, in thousandths of current population.
    pub population_growth_per_mille: i64,
    /// Vehicle upkeep per turn, as a percentage of design cost.
    pub maintenance_rate_percent: i64,
    /// One maintenance-weighted vehicle is scuttled per this much unpaid upkeep.
    pub deficit_per_loss: i64,
    /// Floor for the movement tick step; guarantees loop progress.
    pub tick_epsilon: f64,
    pub min_planet_value: i64,
    pub max_planet_value: i64,
    /// Mined value decay: planet value drops by `mined * this / 1000`.
    pub mining_decay_per_thousand: i64,
    pub research_cost: TechnologyCost,
    pub base_research_cost: i64,
    /// Construction points a colony may spend per resource per turn.
    pub base_construction_rate: i64,
    pub supply_per_hop: i64,
    pub scrap_refund_percent: i64,
    pub facility_repair_per_turn: i64,
    pub unit_repair_per_turn: i64,
    pub base_resource_storage: i64,
    /// Basic sight of everything in explored systems, cloaking aside.
    pub omniscient_view: bool,
    pub score_visibility: ScoreVisibility,
    pub victory: VictoryConfig,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Error)]
pub enum TurnConfigError {
    #[error("failed to read turn config at {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse turn config: {0}")]
    ParseFailed(#[from] serde_json::Error),
}

impl TurnConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_TURN_CONFIG).expect("builtin turn config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, TurnConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| TurnConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json_str(&contents)?)
    }

    /// Cost of the next research level for a technology currently at `level`.
    pub fn next_level_cost(&self, level: u32) -> i64 {
        let base = self.base_research_cost;
        let next = i64::from(level) + 1;
        match self.research_cost {
            TechnologyCost::Low => next * base,
            TechnologyCost::Medium => {
                if next <= 1 {
                    base
                } else {
                    next * next * base / 2
                }
            }
            TechnologyCost::High => next * next * base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let cfg = TurnConfig::builtin();
        assert_eq!(cfg.reproduction_frequency, 1);
        assert!(cfg.tick_epsilon > 0.0);
        assert!(cfg.victory.modes.iter().any(|m| m.enabled));
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let cfg = TurnConfig::from_json_str(r#"{ "maintenance_rate_percent": 25 }"#).unwrap();
        assert_eq!(cfg.maintenance_rate_percent, 25);
        assert_eq!(cfg.deficit_per_loss, TurnConfig::builtin().deficit_per_loss);
    }

    #[test]
    fn research_cost_curves() {
        let mut cfg = TurnConfig::builtin();
        cfg.base_research_cost = 1000;
        cfg.research_cost = TechnologyCost::Low;
        assert_eq!(cfg.next_level_cost(0), 1000);
        assert_eq!(cfg.next_level_cost(2), 3000);
        cfg.research_cost = TechnologyCost::Medium;
        assert_eq!(cfg.next_level_cost(0), 1000);
        assert_eq!(cfg.next_level_cost(2), 4500);
        cfg.research_cost = TechnologyCost::High;
        assert_eq!(cfg.next_level_cost(2), 9000);
    }
}
