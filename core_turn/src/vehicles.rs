//! Vehicle designs, vehicles, and fleets.

use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    economy::{Resource, Stockpile},
    orders::Order,
    space::Loc,
    visibility::{FogState, SensorChannels},
};

/// A blueprint vehicles are built from. Designs are referrable so that
/// command batches and known-design lists can point at them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    pub id: ObjectId,
    pub name: String,
    pub owner: EmpireId,
    /// Base hull cost in minerals; component costs add on top.
    pub hull_size: i64,
    pub speed: u16,
    pub components: Vec<ComponentKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Engine,
    ShieldGenerator,
    SupplyPod,
    SolarCollector,
    MiningRig,
    RepairBay,
    Weapon,
    ColonyModule,
    Sensor(SensorChannels),
    Cloak(SensorChannels),
}

impl ComponentKind {
    fn cost(self) -> Stockpile {
        let mut cost = Stockpile::default();
        match self {
            ComponentKind::Engine => cost[Resource::Minerals] = 200,
            ComponentKind::ShieldGenerator => {
                cost[Resource::Minerals] = 150;
                cost[Resource::Radioactives] = 50;
            }
            ComponentKind::SupplyPod => cost[Resource::Organics] = 100,
            ComponentKind::SolarCollector => cost[Resource::Radioactives] = 100,
            ComponentKind::MiningRig => cost[Resource::Minerals] = 400,
            ComponentKind::RepairBay => cost[Resource::Minerals] = 300,
            ComponentKind::Weapon => {
                cost[Resource::Minerals] = 250;
                cost[Resource::Radioactives] = 100;
            }
            ComponentKind::ColonyModule => {
                cost[Resource::Minerals] = 500;
                cost[Resource::Organics] = 500;
            }
            ComponentKind::Sensor(_) => cost[Resource::Radioactives] = 150,
            ComponentKind::Cloak(_) => cost[Resource::Radioactives] = 300,
        }
        cost
    }
}

impl Design {
    pub fn cost(&self) -> Stockpile {
        let mut total = Stockpile::default();
        total[Resource::Minerals] = self.hull_size;
        for component in &self.components {
            total += component.cost();
        }
        total
    }

    pub fn max_shields(&self) -> i64 {
        50 * self.count(|c| matches!(c, ComponentKind::ShieldGenerator))
    }

    pub fn supply_storage(&self) -> i64 {
        100 + 250 * self.count(|c| matches!(c, ComponentKind::SupplyPod))
    }

    pub fn weapon_count(&self) -> i64 {
        self.count(|c| matches!(c, ComponentKind::Weapon))
    }

    pub fn sensors(&self) -> SensorChannels {
        self.components
            .iter()
            .fold(SensorChannels::empty(), |acc, c| match c {
                ComponentKind::Sensor(channels) => acc | *channels,
                _ => acc,
            })
    }

    pub fn cloak(&self) -> SensorChannels {
        self.components
            .iter()
            .fold(SensorChannels::empty(), |acc, c| match c {
                ComponentKind::Cloak(channels) => acc | *channels,
                _ => acc,
            })
    }

    fn count(&self, pred: impl Fn(&ComponentKind) -> bool) -> i64 {
        self.components.iter().filter(|c| pred(c)).count() as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: ObjectId,
    pub fog: FogState,
    pub name: String,
    pub owner: EmpireId,
    pub design: ObjectId,
    pub loc: Loc,
    pub shields: i64,
    pub hull_damage: i64,
    pub supply_remaining: i64,
    pub orders: Vec<Order>,
    /// Sectors moved so far this turn; reset when movement refills.
    pub hops_done: u16,
}

impl Vehicle {
    pub fn has_pending_orders(&self) -> bool {
        self.orders.iter().any(|o| !o.complete)
    }
}

/// A named grouping of vehicles that moves and resupplies together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    pub id: ObjectId,
    pub fog: FogState,
    pub name: String,
    pub owner: EmpireId,
    pub vehicles: Vec<ObjectId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design() -> Design {
        Design {
            id: ObjectId(9),
            name: "Scout".into(),
            owner: EmpireId(1),
            hull_size: 300,
            speed: 3,
            components: vec![
                ComponentKind::Engine,
                ComponentKind::SupplyPod,
                ComponentKind::ShieldGenerator,
                ComponentKind::Sensor(SensorChannels::GRAV),
            ],
        }
    }

    #[test]
    fn design_derived_stats() {
        let d = design();
        assert_eq!(d.max_shields(), 50);
        assert_eq!(d.supply_storage(), 350);
        assert_eq!(d.sensors(), SensorChannels::GRAV);
        assert_eq!(d.cloak(), SensorChannels::empty());
        let cost = d.cost();
        assert_eq!(cost[Resource::Minerals], 300 + 200 + 150);
        assert_eq!(cost[Resource::Organics], 100);
        assert_eq!(cost[Resource::Radioactives], 50 + 150);
    }
}
