//! Derived capability values and their phase-scoped cache.
//!
//! Abilities are typed keys with integer amounts, derived from facility and
//! component kinds and from empire traits. Within one simultaneous instant
//! (a whole phase, or a single movement tick) the derivation is memoized so
//! that every query sees the same values regardless of evaluation order; the
//! orchestrator disables the cache across any phase whose mutations must be
//! visible immediately, and disabling clears every tier.
//!
//! Three tiers, matching how a value can depend on the asking player:
//! - per object (viewer-independent),
//! - per (object, viewer) for treaty-shared capabilities,
//! - per grantor for the treaty-clause lookup itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sim_wire::{EmpireId, ObjectId};

use crate::{
    economy::Resource,
    empire::TreatyClause,
    space::{FacilityKind, Loc},
    vehicles::ComponentKind,
    world::{EntityTag, World},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKey {
    ResourceExtraction(Resource),
    RawResourceGeneration(Resource),
    RemoteResourceGeneration(Resource),
    ChangeResourceValue(Resource),
    ResearchGeneration,
    Spaceport,
    SupplyGenerationPerTurn,
    SolarSupplyGeneration,
    SupplyGeneration,
    SupplyGenerationSystem,
    ComponentRepair,
}

/// Lookup from the data-file spelling of an ability to its typed key.
///
/// Balance files name abilities with the resource spliced into the string;
/// this is the one place that formatting is interpreted.
pub fn ability_key_by_name(name: &str) -> Option<AbilityKey> {
    fn resource_suffix(name: &str, prefix: &str) -> Option<Resource> {
        let rest = name.strip_prefix(prefix)?;
        match rest {
            "Minerals" => Some(Resource::Minerals),
            "Organics" => Some(Resource::Organics),
            "Radioactives" => Some(Resource::Radioactives),
            _ => None,
        }
    }

    if let Some(r) = resource_suffix(name, "Resource Extraction - ") {
        return Some(AbilityKey::ResourceExtraction(r));
    }
    if let Some(r) = resource_suffix(name, "Raw Resource Generation - ") {
        return Some(AbilityKey::RawResourceGeneration(r));
    }
    if let Some(r) = resource_suffix(name, "Remote Resource Generation - ") {
        return Some(AbilityKey::RemoteResourceGeneration(r));
    }
    if let Some(r) = resource_suffix(name, "Change Resource Value - ") {
        return Some(AbilityKey::ChangeResourceValue(r));
    }
    match name {
        "Research Generation" => Some(AbilityKey::ResearchGeneration),
        "Spaceport" => Some(AbilityKey::Spaceport),
        "Supply Generation Per Turn" => Some(AbilityKey::SupplyGenerationPerTurn),
        "Solar Supply Generation" => Some(AbilityKey::SolarSupplyGeneration),
        "Supply Generation" => Some(AbilityKey::SupplyGeneration),
        "Supply Generation - System" => Some(AbilityKey::SupplyGenerationSystem),
        "Component Repair" => Some(AbilityKey::ComponentRepair),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub key: AbilityKey,
    pub amount: i64,
}

impl Ability {
    pub fn new(key: AbilityKey, amount: i64) -> Self {
        Self { key, amount }
    }
}

/// A facility stops contributing once battle damage reaches this level.
pub const FACILITY_OFFLINE_DAMAGE: i64 = 100;

pub fn facility_abilities(kind: FacilityKind) -> Vec<Ability> {
    use AbilityKey::*;
    match kind {
        FacilityKind::MineralExtractor => {
            vec![Ability::new(ResourceExtraction(Resource::Minerals), 800)]
        }
        FacilityKind::OrganicsFarm => {
            vec![Ability::new(ResourceExtraction(Resource::Organics), 800)]
        }
        FacilityKind::RadioactivesExtractor => {
            vec![Ability::new(ResourceExtraction(Resource::Radioactives), 800)]
        }
        FacilityKind::ResearchLab => vec![Ability::new(ResearchGeneration, 500)],
        FacilityKind::Spaceport => vec![Ability::new(Spaceport, 1)],
        FacilityKind::SupplyDepot => vec![Ability::new(SupplyGeneration, 1)],
        FacilityKind::RepairYard => vec![Ability::new(ComponentRepair, 3)],
    }
}

pub fn component_abilities(kind: &ComponentKind) -> Vec<Ability> {
    use AbilityKey::*;
    match kind {
        ComponentKind::SolarCollector => vec![Ability::new(SolarSupplyGeneration, 50)],
        ComponentKind::MiningRig => vec![
            Ability::new(RemoteResourceGeneration(Resource::Minerals), 300),
            Ability::new(RemoteResourceGeneration(Resource::Organics), 300),
            Ability::new(RemoteResourceGeneration(Resource::Radioactives), 300),
        ],
        ComponentKind::RepairBay => vec![Ability::new(ComponentRepair, 1)],
        _ => Vec::new(),
    }
}

type AbilityList = Arc<Vec<Ability>>;

#[derive(Debug, Default)]
struct CacheState {
    enabled: bool,
    object: HashMap<i64, AbilityList>,
    viewer: HashMap<(i64, u16), AbilityList>,
}

/// Phase-scoped memoization of ability derivation.
#[derive(Debug, Default)]
pub struct AbilityCache {
    state: Mutex<CacheState>,
}

impl AbilityCache {
    pub fn enable(&self) {
        self.state.lock().expect("ability cache poisoned").enabled = true;
    }

    /// Disabling always drops every cached tier.
    pub fn disable(&self) {
        let mut state = self.state.lock().expect("ability cache poisoned");
        state.enabled = false;
        state.object.clear();
        state.viewer.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().expect("ability cache poisoned").enabled
    }

    fn get_object(&self, id: ObjectId) -> Option<AbilityList> {
        let state = self.state.lock().expect("ability cache poisoned");
        if !state.enabled {
            return None;
        }
        state.object.get(&id.0).cloned()
    }

    fn put_object(&self, id: ObjectId, list: AbilityList) {
        let mut state = self.state.lock().expect("ability cache poisoned");
        if state.enabled {
            state.object.insert(id.0, list);
        }
    }

    fn get_viewer(&self, id: ObjectId, viewer: EmpireId) -> Option<AbilityList> {
        let state = self.state.lock().expect("ability cache poisoned");
        if !state.enabled {
            return None;
        }
        state.viewer.get(&(id.0, viewer.0)).cloned()
    }

    fn put_viewer(&self, id: ObjectId, viewer: EmpireId, list: AbilityList) {
        let mut state = self.state.lock().expect("ability cache poisoned");
        if state.enabled {
            state.viewer.insert((id.0, viewer.0), list);
        }
    }
}

/// Cached lookup of treaty clauses given by each empire, cleared whenever
/// treaties may have changed (start of turn, after command execution).
#[derive(Debug, Default)]
pub struct TreatyCache {
    given: Mutex<HashMap<u16, Arc<Vec<(EmpireId, TreatyClause)>>>>,
}

impl TreatyCache {
    pub fn clear(&self) {
        self.given.lock().expect("treaty cache poisoned").clear();
    }
}

/// All clauses `grantor` has given, paired with the receiving empire.
pub fn given_clauses(world: &World, grantor: EmpireId) -> Arc<Vec<(EmpireId, TreatyClause)>> {
    if let Some(found) = world
        .caches
        .treaties
        .given
        .lock()
        .expect("treaty cache poisoned")
        .get(&grantor.0)
    {
        return Arc::clone(found);
    }
    let computed: Arc<Vec<_>> = Arc::new(
        world
            .empire(grantor)
            .map(|emp| {
                emp.treaties
                    .iter()
                    .flat_map(|t| t.clauses.iter().map(|c| (t.partner, c.clone())))
                    .collect()
            })
            .unwrap_or_default(),
    );
    world
        .caches
        .treaties
        .given
        .lock()
        .expect("treaty cache poisoned")
        .insert(grantor.0, Arc::clone(&computed));
    computed
}

/// Ability keys `grantor` shares with `viewer` through treaties.
fn shared_keys(world: &World, grantor: EmpireId, viewer: EmpireId) -> Vec<AbilityKey> {
    given_clauses(world, grantor)
        .iter()
        .filter(|(to, _)| *to == viewer)
        .filter_map(|(_, clause)| match clause {
            TreatyClause::ShareAbility { key } => Some(*key),
            _ => None,
        })
        .collect()
}

fn derive_base(world: &World, id: ObjectId) -> Vec<Ability> {
    match world.tag_of(id) {
        Some(EntityTag::Planet) => {
            let Some(planet) = world.planet(id) else {
                return Vec::new();
            };
            let Some(colony) = planet.colony.as_ref() else {
                return Vec::new();
            };
            colony
                .facilities
                .iter()
                .filter(|f| f.damage < FACILITY_OFFLINE_DAMAGE)
                .flat_map(|f| facility_abilities(f.kind))
                .collect()
        }
        Some(EntityTag::Vehicle) => {
            let Some(vehicle) = world.vehicle(id) else {
                return Vec::new();
            };
            world
                .design(vehicle.design)
                .map(|d| d.components.iter().flat_map(component_abilities).collect())
                .unwrap_or_default()
        }
        Some(EntityTag::Empire) => world
            .empires
            .iter()
            .find(|e| e.object_id == id)
            .map(|e| e.traits.clone())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// The ability list of an object as seen by `viewer`.
///
/// A viewer other than the owner only sees (and benefits from) the keys the
/// owner shares with them by treaty.
pub fn effective_abilities(
    world: &World,
    id: ObjectId,
    viewer: Option<EmpireId>,
) -> AbilityList {
    let owner = world.owner_of(id);
    let viewer_dependent = matches!((owner, viewer), (Some(o), Some(v)) if o != v);

    if !viewer_dependent {
        if let Some(cached) = world.caches.abilities.get_object(id) {
            return cached;
        }
        let list = Arc::new(derive_base(world, id));
        world.caches.abilities.put_object(id, Arc::clone(&list));
        return list;
    }

    let viewer = viewer.expect("viewer-dependent path requires a viewer");
    if let Some(cached) = world.caches.abilities.get_viewer(id, viewer) {
        return cached;
    }
    let owner = owner.expect("viewer-dependent path requires an owner");
    let keys = shared_keys(world, owner, viewer);
    let list: Arc<Vec<Ability>> = Arc::new(
        derive_base(world, id)
            .into_iter()
            .filter(|a| keys.contains(&a.key))
            .collect(),
    );
    world
        .caches
        .abilities
        .put_viewer(id, viewer, Arc::clone(&list));
    list
}

pub fn ability_value(
    world: &World,
    id: ObjectId,
    key: AbilityKey,
    viewer: Option<EmpireId>,
) -> i64 {
    effective_abilities(world, id, viewer)
        .iter()
        .filter(|a| a.key == key)
        .map(|a| a.amount)
        .sum()
}

pub fn has_ability(world: &World, id: ObjectId, key: AbilityKey, viewer: Option<EmpireId>) -> bool {
    effective_abilities(world, id, viewer)
        .iter()
        .any(|a| a.key == key)
}

/// Sum of an ability over everything co-located at `loc` that benefits
/// `empire`: its own objects plus treaty-shared ones.
pub fn empire_ability_in_sector(world: &World, loc: Loc, empire: EmpireId, key: AbilityKey) -> i64 {
    let mut total = 0;
    for sys in world.systems.iter() {
        for planet in sys.planets.iter() {
            if planet.id.is_live() && planet.loc == loc {
                total += ability_value(world, planet.id, key, Some(empire));
            }
        }
    }
    for vehicle in world.vehicles.iter() {
        if vehicle.id.is_live() && !vehicle.fog.memory && vehicle.loc == loc {
            total += ability_value(world, vehicle.id, key, Some(empire));
        }
    }
    total
}
