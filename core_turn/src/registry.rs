//! The object identity registry.
//!
//! Every referrable object carries a signed 64-bit id: zero until assigned,
//! positive while live, negative forever once disposed. The registry tracks
//! which positive ids are in use and issues fresh ones from a seeded RNG so
//! that id assignment replays identically from the same world seed.
//!
//! The registry is not serialized. After a load (or at the top of each
//! turn) it is rebuilt by a full sweep over the world graph, which is also
//! where duplicate-id claims left over from merging deserialized state get
//! repaired: the first claimant reached by the sweep keeps the id, later
//! ones are re-issued.

use std::collections::HashMap;

use rand::{rngs::SmallRng, Rng, SeedableRng};
use sim_wire::ObjectId;
use thiserror::Error;

use crate::world::EntityTag;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("object id space is exhausted")]
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Registry {
    assigned: HashMap<i64, EntityTag>,
    rng: SmallRng,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            assigned: HashMap::new(),
            rng: SmallRng::seed_from_u64(0),
        }
    }
}

/// What a sweep did with one id slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Kept,
    Issued,
    /// The id was already claimed this sweep; the object got a fresh one.
    Reassigned { previous: i64 },
    Tombstone,
}

impl Registry {
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn clear_mappings(&mut self) {
        self.assigned.clear();
    }

    pub fn contains(&self, id: i64) -> bool {
        self.assigned.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    fn fresh_id(&mut self, preferred: i64) -> Result<i64, RegistryError> {
        // With a 63-bit space this is unreachable in practice, but the
        // failure must be loud rather than a spin.
        if self.assigned.len() as u64 >= u64::MAX >> 1 {
            return Err(RegistryError::Exhausted);
        }
        let mut candidate = preferred;
        while candidate <= 0 || self.assigned.contains_key(&candidate) {
            candidate = self.rng.gen_range(1..=i64::MAX);
        }
        Ok(candidate)
    }

    /// Assign an id to the slot, following the lifecycle rules:
    ///
    /// - tombstoned slots stay tombstoned (disposal is idempotent and the
    ///   negative id is returned unchanged),
    /// - a live id that is already registered is a no-op,
    /// - a live id not yet registered is kept and registered (this is what
    ///   lets a client-chosen id survive when it happens to be free),
    /// - an unassigned slot gets a fresh id.
    pub fn assign(&mut self, slot: &mut ObjectId, tag: EntityTag) -> Result<i64, RegistryError> {
        self.assign_with(slot, tag, 0)
    }

    /// Like [`assign`](Self::assign) but with a preferred id for the
    /// unassigned case.
    pub fn assign_with(
        &mut self,
        slot: &mut ObjectId,
        tag: EntityTag,
        requested: i64,
    ) -> Result<i64, RegistryError> {
        if slot.is_tombstone() {
            return Ok(slot.0);
        }
        if slot.is_live() && self.assigned.contains_key(&slot.0) {
            return Ok(slot.0);
        }

        let preferred = if slot.is_live() { slot.0 } else { requested };
        let id = self.fresh_id(preferred)?;
        self.assigned.insert(id, tag);
        if slot.is_live() && slot.0 != id {
            self.assigned.remove(&slot.0);
        }
        *slot = ObjectId(id);
        Ok(id)
    }

    /// Register a *newly introduced* object (one arriving in a command
    /// batch). Unlike [`assign`](Self::assign), the slot's current id is a
    /// client-chosen candidate, not a claim: it is kept only when free, and
    /// re-issued when some server object already holds it.
    pub fn assign_new(&mut self, slot: &mut ObjectId, tag: EntityTag) -> Result<i64, RegistryError> {
        if slot.is_tombstone() {
            return Ok(slot.0);
        }
        let preferred = if slot.is_live() { slot.0 } else { 0 };
        let id = self.fresh_id(preferred)?;
        self.assigned.insert(id, tag);
        *slot = ObjectId(id);
        Ok(id)
    }

    /// Remove the mapping and tombstone the slot.
    pub fn release(&mut self, slot: &mut ObjectId) {
        if slot.is_live() {
            self.assigned.remove(&slot.0);
        }
        *slot = ObjectId::TOMBSTONE;
    }

    /// One step of a full-world sweep. Unlike [`assign`](Self::assign), a
    /// live id that is already claimed **this sweep** is a duplicate and the
    /// object is re-issued a fresh id.
    pub fn sweep_assign(
        &mut self,
        slot: &mut ObjectId,
        tag: EntityTag,
    ) -> Result<SweepOutcome, RegistryError> {
        if slot.is_tombstone() {
            return Ok(SweepOutcome::Tombstone);
        }
        if slot.is_live() {
            if self.assigned.contains_key(&slot.0) {
                let previous = slot.0;
                let id = self.fresh_id(0)?;
                self.assigned.insert(id, tag);
                *slot = ObjectId(id);
                return Ok(SweepOutcome::Reassigned { previous });
            }
            self.assigned.insert(slot.0, tag);
            return Ok(SweepOutcome::Kept);
        }
        let id = self.fresh_id(0)?;
        self.assigned.insert(id, tag);
        *slot = ObjectId(id);
        Ok(SweepOutcome::Issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut r = Registry::default();
        r.reseed(42);
        r
    }

    #[test]
    fn fresh_ids_are_unique_and_live() {
        let mut reg = registry();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..256 {
            let mut slot = ObjectId::UNASSIGNED;
            let id = reg.assign(&mut slot, EntityTag::Vehicle).unwrap();
            assert!(slot.is_live());
            assert!(ids.insert(id), "id {id} issued twice");
        }
    }

    #[test]
    fn tombstones_are_permanent() {
        let mut reg = registry();
        let mut slot = ObjectId::UNASSIGNED;
        reg.assign(&mut slot, EntityTag::Vehicle).unwrap();
        let live = slot;

        reg.release(&mut slot);
        assert_eq!(slot, ObjectId::TOMBSTONE);
        assert!(!reg.contains(live.0));

        // Assigning a disposed object is idempotent and keeps the negative id.
        let id = reg.assign(&mut slot, EntityTag::Vehicle).unwrap();
        assert_eq!(id, ObjectId::TOMBSTONE.0);
        assert!(slot.is_tombstone());
    }

    #[test]
    fn registered_ids_are_a_no_op() {
        let mut reg = registry();
        let mut slot = ObjectId::UNASSIGNED;
        let first = reg.assign(&mut slot, EntityTag::Planet).unwrap();
        let second = reg.assign(&mut slot, EntityTag::Planet).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn free_client_ids_survive_remap() {
        let mut reg = registry();
        let mut slot = ObjectId(5);
        let id = reg.assign(&mut slot, EntityTag::Order).unwrap();
        assert_eq!(id, 5, "a free client id is kept");

        let mut taken = ObjectId(5);
        // Not a duplicate from assign's perspective: it is registered, so
        // this is a no-op. Sweeps are the layer that repairs true duplicates.
        assert_eq!(reg.assign(&mut taken, EntityTag::Order).unwrap(), 5);
    }

    #[test]
    fn new_objects_never_steal_taken_ids() {
        let mut reg = registry();
        let mut squatter = ObjectId(5);
        reg.assign(&mut squatter, EntityTag::Design).unwrap();

        let mut incoming = ObjectId(5);
        let id = reg.assign_new(&mut incoming, EntityTag::Order).unwrap();
        assert_ne!(id, 5, "taken client id must be re-issued");
        assert!(incoming.is_live());
        assert!(reg.contains(5) && reg.contains(id));

        let mut free = ObjectId(9);
        assert_eq!(reg.assign_new(&mut free, EntityTag::Order).unwrap(), 9);
    }

    #[test]
    fn sweep_repairs_duplicate_claims() {
        let mut reg = registry();
        reg.clear_mappings();
        let mut a = ObjectId(77);
        let mut b = ObjectId(77);
        assert_eq!(
            reg.sweep_assign(&mut a, EntityTag::Vehicle).unwrap(),
            SweepOutcome::Kept
        );
        let outcome = reg.sweep_assign(&mut b, EntityTag::Vehicle).unwrap();
        assert!(matches!(outcome, SweepOutcome::Reassigned { previous: 77 }));
        assert_ne!(a, b);
        assert!(b.is_live());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn id_generation_is_deterministic_per_seed() {
        let run = || {
            let mut reg = registry();
            (0..16)
                .map(|_| {
                    let mut slot = ObjectId::UNASSIGNED;
                    reg.assign(&mut slot, EntityTag::Design).unwrap()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
