//! Star systems, planets, and colonies.
//!
//! Space is a coarse square grid. A star system owns the cells within
//! `radius` of its center; planets sit on specific cells inside their
//! system. Co-location (same cell) is what makes objects able to interact,
//! trigger battles, or resupply each other.

use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    construction::ConstructionQueue,
    economy::Stockpile,
    visibility::FogState,
};

/// A grid cell. One cell is one "sector" for movement and combat purposes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Loc {
    pub x: i32,
    pub y: i32,
}

impl Loc {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance; diagonal steps count as one.
    pub fn distance(self, other: Loc) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// One step toward `dest`, diagonals allowed.
    pub fn step_toward(self, dest: Loc) -> Loc {
        Loc {
            x: self.x + (dest.x - self.x).signum(),
            y: self.y + (dest.y - self.y).signum(),
        }
    }
}

impl std::fmt::Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarSystem {
    pub id: ObjectId,
    pub fog: FogState,
    pub name: String,
    pub description: String,
    pub loc: Loc,
    pub radius: i32,
    pub star_count: u8,
    /// Hidden from everyone but the listed empires during redaction.
    pub explored_by: Vec<EmpireId>,
    pub planets: Vec<Planet>,
}

impl StarSystem {
    pub fn contains(&self, loc: Loc) -> bool {
        self.loc.distance(loc) <= self.radius
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planet {
    pub id: ObjectId,
    pub fog: FogState,
    pub name: String,
    pub loc: Loc,
    /// Resource richness in percent; 100 means nominal yield.
    pub resource_value: Stockpile,
    pub max_population: i64,
    pub colony: Option<Colony>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Colony {
    pub owner: EmpireId,
    pub population: i64,
    /// Population parked in cold storage; brought back out when the surface
    /// has room again.
    pub population_cargo: i64,
    pub facilities: Vec<Facility>,
    pub queue: ConstructionQueue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub kind: FacilityKind,
    pub damage: i64,
}

impl Facility {
    pub fn new(kind: FacilityKind) -> Self {
        Self { kind, damage: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityKind {
    MineralExtractor,
    OrganicsFarm,
    RadioactivesExtractor,
    ResearchLab,
    Spaceport,
    SupplyDepot,
    RepairYard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_distance_and_steps() {
        let a = Loc::new(0, 0);
        let b = Loc::new(3, -2);
        assert_eq!(a.distance(b), 3);

        let mut cur = a;
        let mut hops = 0;
        while cur != b {
            cur = cur.step_toward(b);
            hops += 1;
            assert!(hops <= 3, "step_toward should converge in distance hops");
        }
        assert_eq!(hops, 3);
    }

    #[test]
    fn system_contains_cells_within_radius() {
        let sys = StarSystem {
            id: ObjectId(1),
            fog: FogState::default(),
            name: "Kestrel".into(),
            description: String::new(),
            loc: Loc::new(10, 10),
            radius: 2,
            star_count: 1,
            explored_by: Vec::new(),
            planets: Vec::new(),
        };
        assert!(sys.contains(Loc::new(12, 8)));
        assert!(!sys.contains(Loc::new(13, 10)));
    }
}
