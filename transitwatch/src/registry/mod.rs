//! In-memory table of tracked vehicles.
//!
//! The [`VehicleRegistry`] holds exactly one [`TrackedVehicle`] per id and
//! iterates in insertion order. Re-seen ids are updated in place and keep
//! their original slot.
//!
//! # Sharing
//!
//! The scheduler applies reconciliation results while presentation code reads
//! them, so the registry is usually held through a [`SharedVehicleRegistry`]:
//!
//! ```
//! use transitwatch::registry::SharedVehicleRegistry;
//!
//! let registry = SharedVehicleRegistry::new();
//! let reader = registry.clone();
//!
//! assert!(reader.list_all().is_empty());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::reconcile::Reconciliation;
use crate::vehicle::TrackedVehicle;

/// Insertion-ordered table of tracked vehicles keyed by id.
#[derive(Debug, Default, Clone)]
pub struct VehicleRegistry {
    vehicles: HashMap<String, TrackedVehicle>,
    /// Ids in insertion order.
    order: Vec<String>,
}

impl VehicleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vehicle or replace the existing entry with the same id.
    pub fn upsert(&mut self, vehicle: TrackedVehicle) {
        if !self.vehicles.contains_key(&vehicle.id) {
            self.order.push(vehicle.id.clone());
        }
        self.vehicles.insert(vehicle.id.clone(), vehicle);
    }

    /// Remove a vehicle by id. Absent ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<TrackedVehicle> {
        let removed = self.vehicles.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    /// Look up a vehicle by id.
    pub fn get(&self, id: &str) -> Option<&TrackedVehicle> {
        self.vehicles.get(id)
    }

    /// Returns true if a vehicle with this id is tracked.
    pub fn contains(&self, id: &str) -> bool {
        self.vehicles.contains_key(id)
    }

    /// Snapshot copy of all vehicles in insertion order.
    pub fn list_all(&self) -> Vec<TrackedVehicle> {
        self.iter().cloned().collect()
    }

    /// Iterate vehicles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedVehicle> {
        self.order.iter().filter_map(|id| self.vehicles.get(id))
    }

    /// Tracked ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Remove every vehicle.
    pub fn clear(&mut self) {
        self.vehicles.clear();
        self.order.clear();
    }

    /// Number of tracked vehicles.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Returns true if no vehicles are tracked.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Apply a reconciliation result: removals first, then upserts.
    ///
    /// Returns how many vehicles were removed, added, or changed state.
    /// Re-seeing a vehicle with only a newer `last_seen_at` does not count.
    pub fn apply(&mut self, reconciliation: &Reconciliation) -> usize {
        let mut changed = 0;
        for id in &reconciliation.removals {
            if self.remove(id).is_some() {
                changed += 1;
            }
        }
        for vehicle in &reconciliation.upserts {
            let unchanged = self
                .get(&vehicle.id)
                .is_some_and(|existing| existing.same_state(vehicle));
            if !unchanged {
                changed += 1;
            }
            self.upsert(vehicle.clone());
        }
        changed
    }
}

/// Cloneable, thread-safe handle to a [`VehicleRegistry`].
#[derive(Debug, Default, Clone)]
pub struct SharedVehicleRegistry {
    inner: Arc<RwLock<VehicleRegistry>>,
}

impl SharedVehicleRegistry {
    /// Create a handle to a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot copy of all vehicles in insertion order.
    pub fn list_all(&self) -> Vec<TrackedVehicle> {
        self.inner.read().list_all()
    }

    /// Clone of the vehicle with this id, if tracked.
    pub fn get(&self, id: &str) -> Option<TrackedVehicle> {
        self.inner.read().get(id).cloned()
    }

    /// Number of tracked vehicles.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if no vehicles are tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Remove every vehicle.
    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Acquire the read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, VehicleRegistry> {
        self.inner.read()
    }

    /// Acquire the write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, VehicleRegistry> {
        self.inner.write()
    }
}
