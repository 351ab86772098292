//! The world aggregate.
//!
//! One `World` is the whole game from one viewpoint: the host's
//! authoritative copy, or a player's redacted copy (then `viewpoint` names
//! the player). Everything referrable hangs off this struct, and the typed
//! id-slot walker below is the single traversal every identity sweep uses.
//! There is no reflection and no global current-world; whoever needs the
//! world gets handed one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    abilities::{AbilityCache, TreatyCache},
    battle::BattleRecord,
    config::TurnConfig,
    empire::{Empire, LogEntry, Stance},
    orders::Waypoint,
    registry::{Registry, RegistryError, SweepOutcome},
    rng::stream_seed,
    space::{Loc, Planet, StarSystem},
    vehicles::{Design, Fleet, Vehicle},
};

/// The closed set of entity kinds that carry registry identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityTag {
    System,
    Planet,
    Vehicle,
    Fleet,
    Design,
    Waypoint,
    Order,
    Empire,
}

/// Transient per-run caches owned by the world. Never serialized; a cloned
/// world starts cold.
#[derive(Debug, Default)]
pub struct TurnCaches {
    pub abilities: AbilityCache,
    pub treaties: TreatyCache,
    /// Sim time of the last battle per sector, for the combat cooldown.
    pub battle_timestamps: BTreeMap<Loc, f64>,
}

impl Clone for TurnCaches {
    fn clone(&self) -> Self {
        TurnCaches::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub name: String,
    pub seed: u64,
    pub turn_number: u32,
    /// Progress through the current turn's movement, 0 to 1.
    pub current_tick: f64,
    pub next_tick_size: f64,
    /// `None` on the host's authoritative copy; the owning player on a
    /// redacted view.
    pub viewpoint: Option<EmpireId>,
    pub config: TurnConfig,
    pub systems: Vec<StarSystem>,
    pub vehicles: Vec<Vehicle>,
    pub fleets: Vec<Fleet>,
    pub designs: Vec<Design>,
    pub waypoints: Vec<Waypoint>,
    pub empires: Vec<Empire>,
    /// Battles resolved this turn.
    pub battles: Vec<BattleRecord>,
    #[serde(skip)]
    pub registry: Registry,
    #[serde(skip)]
    pub caches: TurnCaches,
}

impl World {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            seed,
            turn_number: 1,
            current_tick: 0.0,
            next_tick_size: 0.0,
            viewpoint: None,
            config: TurnConfig::builtin(),
            systems: Vec::new(),
            vehicles: Vec::new(),
            fleets: Vec::new(),
            designs: Vec::new(),
            waypoints: Vec::new(),
            empires: Vec::new(),
            battles: Vec::new(),
            registry: Registry::default(),
            caches: TurnCaches::default(),
        }
    }

    /// Current simulation time: turn number plus tick, minus one so the
    /// first turn starts at time zero.
    pub fn timestamp(&self) -> f64 {
        f64::from(self.turn_number) + self.current_tick - 1.0
    }

    pub fn empire(&self, id: EmpireId) -> Option<&Empire> {
        self.empires.iter().find(|e| e.id == id)
    }

    pub fn empire_mut(&mut self, id: EmpireId) -> Option<&mut Empire> {
        self.empires.iter_mut().find(|e| e.id == id)
    }

    /// Append to an empire's persistent event log.
    pub fn log_to(&mut self, empire: EmpireId, text: impl Into<String>, subject: Option<ObjectId>) {
        let turn = self.turn_number;
        let timestamp = self.timestamp();
        if let Some(emp) = self.empire_mut(empire) {
            emp.log.push(LogEntry {
                turn,
                timestamp,
                text: text.into(),
                subject,
            });
        }
    }

    pub fn design(&self, id: ObjectId) -> Option<&Design> {
        self.designs.iter().find(|d| d.id == id)
    }

    pub fn vehicle(&self, id: ObjectId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn vehicle_mut(&mut self, id: ObjectId) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.id == id)
    }

    pub fn fleet(&self, id: ObjectId) -> Option<&Fleet> {
        self.fleets.iter().find(|f| f.id == id)
    }

    pub fn fleet_mut(&mut self, id: ObjectId) -> Option<&mut Fleet> {
        self.fleets.iter_mut().find(|f| f.id == id)
    }

    fn locate_planet(&self, id: ObjectId) -> Option<(usize, usize)> {
        self.systems.iter().enumerate().find_map(|(si, sys)| {
            sys.planets
                .iter()
                .position(|p| p.id == id)
                .map(|pi| (si, pi))
        })
    }

    pub fn planet(&self, id: ObjectId) -> Option<&Planet> {
        let (si, pi) = self.locate_planet(id)?;
        Some(&self.systems[si].planets[pi])
    }

    pub fn planet_mut(&mut self, id: ObjectId) -> Option<&mut Planet> {
        let (si, pi) = self.locate_planet(id)?;
        Some(&mut self.systems[si].planets[pi])
    }

    pub fn tag_of(&self, id: ObjectId) -> Option<EntityTag> {
        if self.vehicle(id).is_some() {
            return Some(EntityTag::Vehicle);
        }
        if self.planet(id).is_some() {
            return Some(EntityTag::Planet);
        }
        if self.fleet(id).is_some() {
            return Some(EntityTag::Fleet);
        }
        if self.design(id).is_some() {
            return Some(EntityTag::Design);
        }
        if self.systems.iter().any(|s| s.id == id) {
            return Some(EntityTag::System);
        }
        if self.waypoints.iter().any(|w| w.id == id) {
            return Some(EntityTag::Waypoint);
        }
        if self.empires.iter().any(|e| e.object_id == id) {
            return Some(EntityTag::Empire);
        }
        let is_order = self
            .vehicles
            .iter()
            .flat_map(|v| v.orders.iter())
            .any(|o| o.id == id)
            || self.systems.iter().any(|s| {
                s.planets.iter().any(|p| {
                    p.colony
                        .as_ref()
                        .is_some_and(|c| c.queue.orders.iter().any(|o| o.id == id))
                })
            });
        is_order.then_some(EntityTag::Order)
    }

    /// Which empire owns the object, if ownership applies to its kind.
    pub fn owner_of(&self, id: ObjectId) -> Option<EmpireId> {
        if let Some(v) = self.vehicle(id) {
            return Some(v.owner);
        }
        if let Some(f) = self.fleet(id) {
            return Some(f.owner);
        }
        if let Some(p) = self.planet(id) {
            return p.colony.as_ref().map(|c| c.owner);
        }
        if let Some(d) = self.design(id) {
            return Some(d.owner);
        }
        self.empires
            .iter()
            .find(|e| e.object_id == id)
            .map(|e| e.id)
    }

    pub fn location_of(&self, id: ObjectId) -> Option<Loc> {
        if let Some(v) = self.vehicle(id) {
            return Some(v.loc);
        }
        if let Some(p) = self.planet(id) {
            return Some(p.loc);
        }
        if let Some(f) = self.fleet(id) {
            return f
                .vehicles
                .iter()
                .find_map(|vid| self.vehicle(*vid).map(|v| v.loc));
        }
        self.systems.iter().find(|s| s.id == id).map(|s| s.loc)
    }

    pub fn system_containing(&self, loc: Loc) -> Option<usize> {
        self.systems.iter().position(|s| s.contains(loc))
    }

    /// Indices of live, non-memory vehicles at a sector.
    pub fn vehicles_at(&self, loc: Loc) -> Vec<usize> {
        self.vehicles
            .iter()
            .enumerate()
            .filter(|(_, v)| v.id.is_live() && !v.fog.memory && v.loc == loc)
            .map(|(i, _)| i)
            .collect()
    }

    /// Hostility is mutual: either side declaring the other hostile is
    /// enough to trigger combat.
    pub fn are_hostile(&self, a: EmpireId, b: EmpireId) -> bool {
        if a == b {
            return false;
        }
        let a_to_b = self.empire(a).map(|e| e.stance_toward(b)).unwrap_or_default();
        let b_to_a = self.empire(b).map(|e| e.stance_toward(a)).unwrap_or_default();
        a_to_b == Stance::Hostile || b_to_a == Stance::Hostile
    }

    /// Visit every registry id slot in the live world graph, in a fixed
    /// deterministic order. Memory snapshots are deliberately not walked:
    /// they keep the identity of the object they shadow.
    pub fn for_each_id_slot(&mut self, mut f: impl FnMut(&mut ObjectId, EntityTag)) {
        for sys in &mut self.systems {
            f(&mut sys.id, EntityTag::System);
            for planet in &mut sys.planets {
                f(&mut planet.id, EntityTag::Planet);
                if let Some(colony) = planet.colony.as_mut() {
                    for order in &mut colony.queue.orders {
                        f(&mut order.id, EntityTag::Order);
                    }
                }
            }
        }
        for design in &mut self.designs {
            f(&mut design.id, EntityTag::Design);
        }
        for vehicle in &mut self.vehicles {
            f(&mut vehicle.id, EntityTag::Vehicle);
            for order in &mut vehicle.orders {
                f(&mut order.id, EntityTag::Order);
            }
        }
        for fleet in &mut self.fleets {
            f(&mut fleet.id, EntityTag::Fleet);
        }
        for waypoint in &mut self.waypoints {
            f(&mut waypoint.id, EntityTag::Waypoint);
        }
        for empire in &mut self.empires {
            f(&mut empire.object_id, EntityTag::Empire);
            // Pending commands can carry objects that are not in the world
            // yet; their ids must stay claimed until execution.
            for cmd in &mut empire.commands {
                for (slot, tag) in cmd.new_referrable_slots() {
                    f(slot, tag);
                }
            }
        }
    }

    /// Full identity sweep: rebuild the registry from the live graph,
    /// issuing ids where missing and repairing duplicate claims.
    pub fn assign_ids(&mut self) -> Result<(), RegistryError> {
        let mut registry = std::mem::take(&mut self.registry);
        registry.clear_mappings();
        let mut failure = None;
        self.for_each_id_slot(|slot, tag| {
            if failure.is_some() {
                return;
            }
            match registry.sweep_assign(slot, tag) {
                Ok(SweepOutcome::Reassigned { previous }) => {
                    tracing::warn!(
                        target: "starfall::registry",
                        previous,
                        reassigned = slot.0,
                        ?tag,
                        "duplicate id claim repaired during sweep"
                    );
                }
                Ok(_) => {}
                Err(err) => failure = Some(err),
            }
        });
        self.registry = registry;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Reseed the id generator for this turn and resweep. Run after loading
    /// a save and at the top of turn processing so in-memory and
    /// loaded-from-disk runs issue identical ids.
    pub fn rebuild_registry(&mut self) -> Result<(), RegistryError> {
        let seed = stream_seed(self.seed, self.turn_number, "registry");
        self.registry.reseed(seed);
        self.assign_ids()
    }

    /// Repair pass between phases: any live object the registry lost track
    /// of gets re-registered with a diagnostic. Mirrors the source of truth
    /// being the world graph, not the registry.
    pub fn consistency_check(&mut self, when: &str) {
        let mut registry = std::mem::take(&mut self.registry);
        let mut repaired = 0u32;
        self.for_each_id_slot(|slot, tag| {
            if slot.is_live() && !registry.contains(slot.0) {
                // Not a sweep: the id is kept, only the mapping is restored.
                if registry.assign(slot, tag).is_ok() {
                    repaired += 1;
                }
            }
        });
        self.registry = registry;
        if repaired > 0 {
            tracing::warn!(
                target: "starfall::registry",
                when,
                repaired,
                "registry lost track of live objects; mappings restored"
            );
        }
    }

    /// Physically remove tombstoned objects and dangling references.
    pub fn purge_disposed(&mut self) {
        for sys in &mut self.systems {
            sys.planets.retain(|p| !p.id.is_tombstone());
        }
        self.vehicles.retain(|v| !v.id.is_tombstone());
        for vehicle in &mut self.vehicles {
            vehicle.orders.retain(|o| !o.id.is_tombstone());
        }
        self.waypoints.retain(|w| !w.id.is_tombstone());
        self.designs.retain(|d| !d.id.is_tombstone());
        self.fleets.retain(|f| !f.id.is_tombstone());

        let live_vehicle: std::collections::BTreeSet<i64> = self
            .vehicles
            .iter()
            .filter(|v| v.id.is_live())
            .map(|v| v.id.0)
            .collect();
        for fleet in &mut self.fleets {
            fleet.vehicles.retain(|vid| live_vehicle.contains(&vid.0));
        }
    }

    /// Dispose objects that have come loose from the world: empty fleets
    /// and vehicles whose design vanished (the latter logged as a likely
    /// engine defect).
    pub fn cleanup_floating(&mut self) {
        let design_ids: std::collections::BTreeSet<i64> = self
            .designs
            .iter()
            .filter(|d| d.id.is_live())
            .map(|d| d.id.0)
            .collect();

        let mut registry = std::mem::take(&mut self.registry);
        for fleet in &mut self.fleets {
            if fleet.id.is_live() && fleet.vehicles.is_empty() {
                registry.release(&mut fleet.id);
            }
        }
        for vehicle in &mut self.vehicles {
            if vehicle.id.is_live() && !design_ids.contains(&vehicle.design.0) {
                tracing::warn!(
                    target: "starfall::world",
                    vehicle = %vehicle.id,
                    design = %vehicle.design,
                    "vehicle refers to a missing design; disposing"
                );
                registry.release(&mut vehicle.id);
            }
        }
        self.registry = registry;
        self.purge_disposed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn identity_sweep_keeps_ids_unique() {
        let mut world = testkit::two_empire_world();
        // Force a duplicate claim, as can happen after merging saves.
        let stolen = world.systems[0].planets[0].id;
        world.vehicles[0].id = stolen;
        world.assign_ids().unwrap();

        let mut seen = std::collections::BTreeSet::new();
        world.for_each_id_slot(|slot, _| {
            if slot.is_live() {
                assert!(seen.insert(slot.0), "id {} appears twice", slot.0);
            }
        });
    }

    #[test]
    fn purge_drops_tombstones_and_fleet_dangles() {
        let mut world = testkit::two_empire_world();
        let vid = world.vehicles[0].id;
        let fleet = Fleet {
            id: ObjectId(0),
            fog: Default::default(),
            name: "Patrol".into(),
            owner: world.vehicles[0].owner,
            vehicles: vec![vid],
        };
        world.fleets.push(fleet);
        world.assign_ids().unwrap();

        let mut slot = world.vehicles[0].id;
        world.registry.release(&mut slot);
        world.vehicles[0].id = slot;
        world.purge_disposed();

        assert!(world.vehicle(vid).is_none());
        assert!(world.fleets[0].vehicles.is_empty());
    }

    #[test]
    fn hostility_is_mutual() {
        let mut world = testkit::two_empire_world();
        let (a, b) = (world.empires[0].id, world.empires[1].id);
        assert!(!world.are_hostile(a, b));
        world
            .empire_mut(a)
            .unwrap()
            .relations
            .insert(b, Stance::Hostile);
        assert!(world.are_hostile(a, b));
        assert!(world.are_hostile(b, a));
    }

    #[test]
    fn timestamp_tracks_turn_and_tick() {
        let mut world = testkit::two_empire_world();
        world.turn_number = 3;
        world.current_tick = 0.25;
        assert!((world.timestamp() - 2.25).abs() < 1e-12);
    }
}
