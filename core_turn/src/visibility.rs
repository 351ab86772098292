//! Sight levels and the rules that decide them.
//!
//! Every foggable object resolves to one of four ordered levels for a given
//! viewer. Redaction keys off the ordering: anything below `Fogged` is
//! removed from that viewer's copy of the world outright.
//!
//! Detection is channel-based: sensors and cloaks are bit masks over the
//! same channels. A contact is detected only on channels the viewer scans
//! and the target does not cloak; one clear channel yields `Scanned`, two or
//! more give a full profile (`Visible`).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use sim_wire::EmpireId;

use crate::{
    space::Planet,
    vehicles::{Design, Fleet, Vehicle},
    world::World,
};

/// How well a viewer can see an object. Order matters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Visibility {
    /// Never seen; does not exist in the viewer's copy of the world.
    #[default]
    Unknown,
    /// Known to exist, shown from last-known (memory) data.
    Fogged,
    /// Currently detected; live data with internals stripped.
    Scanned,
    /// Fully profiled; live data, only another empire's orders stay hidden.
    Visible,
}

bitflags! {
    /// Detection channels shared by sensors and cloaks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    pub struct SensorChannels: u8 {
        const EM = 1;
        const GRAV = 1 << 1;
        const THERMAL = 1 << 2;
        const QUANTUM = 1 << 3;
    }
}

/// Channels every hull can see on without dedicated sensor components.
pub const BASE_VEHICLE_SENSORS: SensorChannels = SensorChannels::EM;

/// Channels a colony watches across its home system.
pub const COLONY_SENSORS: SensorChannels =
    SensorChannels::EM.union(SensorChannels::THERMAL);

/// Fog bookkeeping carried by every foggable object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FogState {
    /// True on last-known copies served to a viewer; memory data must never
    /// drive gameplay effects.
    pub memory: bool,
    /// Simulation time of the last authoritative update.
    pub timestamp: f64,
}

/// Union of the viewer's sensor coverage at a location, or `None` when the
/// viewer has no presence there.
pub fn sensors_at(world: &World, loc: crate::space::Loc, viewer: EmpireId) -> Option<SensorChannels> {
    let mut channels = SensorChannels::empty();
    let mut present = false;

    for v in world.vehicles.iter() {
        if v.id.is_live() && !v.fog.memory && v.owner == viewer && v.loc == loc {
            present = true;
            channels |= BASE_VEHICLE_SENSORS;
            if let Some(design) = world.design(v.design) {
                channels |= design.sensors();
            }
        }
    }

    for sys in world.systems.iter() {
        if !sys.contains(loc) {
            continue;
        }
        let colonized = sys.planets.iter().any(|p| {
            p.id.is_live() && p.colony.as_ref().is_some_and(|c| c.owner == viewer)
        });
        if colonized {
            present = true;
            channels |= COLONY_SENSORS;
        }
    }

    present.then_some(channels)
}

fn detection_level(sensors: SensorChannels, cloak: SensorChannels) -> Option<Visibility> {
    let clear = sensors & !cloak;
    match clear.bits().count_ones() {
        0 => None,
        1 => Some(Visibility::Scanned),
        _ => Some(Visibility::Visible),
    }
}

pub fn vehicle_visibility(world: &World, vehicle: &Vehicle, viewer: EmpireId) -> Visibility {
    if vehicle.owner == viewer {
        return Visibility::Visible;
    }
    if let Some(sensors) = sensors_at(world, vehicle.loc, viewer) {
        let cloak = world
            .design(vehicle.design)
            .map(|d| d.cloak())
            .unwrap_or_default();
        if let Some(level) = detection_level(sensors, cloak) {
            return level;
        }
    }
    // Undetected contacts survive only as sensor memories.
    if world
        .empire(viewer)
        .is_some_and(|e| e.memory.contains_key(&vehicle.id.0))
    {
        Visibility::Fogged
    } else {
        Visibility::Unknown
    }
}

pub fn planet_visibility(world: &World, planet: &Planet, viewer: EmpireId) -> Visibility {
    if planet
        .colony
        .as_ref()
        .is_some_and(|colony| colony.owner == viewer)
    {
        return Visibility::Visible;
    }
    if let Some(sensors) = sensors_at(world, planet.loc, viewer) {
        if let Some(level) = detection_level(sensors, SensorChannels::empty()) {
            return level;
        }
    }
    let explored = world
        .system_containing(planet.loc)
        .map(|idx| world.systems[idx].explored_by.contains(&viewer))
        .unwrap_or(false);
    if explored {
        if world.config.omniscient_view {
            Visibility::Scanned
        } else {
            Visibility::Fogged
        }
    } else {
        Visibility::Unknown
    }
}

pub fn system_visibility(world: &World, system_index: usize, viewer: EmpireId) -> Visibility {
    let sys = &world.systems[system_index];
    if !sys.explored_by.contains(&viewer) {
        return Visibility::Unknown;
    }
    let present = world.vehicles.iter().any(|v| {
        v.id.is_live() && !v.fog.memory && v.owner == viewer && sys.contains(v.loc)
    }) || sys.planets.iter().any(|p| {
        p.id.is_live() && p.colony.as_ref().is_some_and(|c| c.owner == viewer)
    });
    if present {
        Visibility::Visible
    } else {
        Visibility::Fogged
    }
}

/// A fleet is as visible as its most visible member.
pub fn fleet_visibility(world: &World, fleet: &Fleet, viewer: EmpireId) -> Visibility {
    if fleet.owner == viewer {
        return Visibility::Visible;
    }
    fleet
        .vehicles
        .iter()
        .filter_map(|id| world.vehicle(*id))
        .map(|v| vehicle_visibility(world, v, viewer))
        .max()
        .unwrap_or(Visibility::Unknown)
}

pub fn design_visibility(world: &World, design: &Design, viewer: EmpireId) -> Visibility {
    if design.owner == viewer {
        return Visibility::Visible;
    }
    let scanned_carrier = world.vehicles.iter().any(|v| {
        v.id.is_live()
            && v.design == design.id
            && vehicle_visibility(world, v, viewer) >= Visibility::Scanned
    });
    if scanned_carrier {
        return Visibility::Scanned;
    }
    if world
        .empire(viewer)
        .is_some_and(|e| e.known_designs.contains(&design.id))
    {
        Visibility::Fogged
    } else {
        Visibility::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_orders_correctly() {
        assert!(Visibility::Unknown < Visibility::Fogged);
        assert!(Visibility::Fogged < Visibility::Scanned);
        assert!(Visibility::Scanned < Visibility::Visible);
    }

    #[test]
    fn detection_needs_a_clear_channel() {
        let sensors = SensorChannels::EM | SensorChannels::GRAV;
        assert_eq!(
            detection_level(sensors, SensorChannels::empty()),
            Some(Visibility::Visible)
        );
        assert_eq!(
            detection_level(sensors, SensorChannels::GRAV),
            Some(Visibility::Scanned)
        );
        assert_eq!(detection_level(sensors, sensors), None);
        assert_eq!(detection_level(SensorChannels::empty(), SensorChannels::empty()), None);
    }
}
