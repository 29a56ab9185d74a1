use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::model::Vehicle;

/// In-memory keyed vehicle store shared by the demo handlers. Vehicle ids are
/// assigned here so they stay unique regardless of what the client sent.
pub struct VehicleCollection {
    items: RwLock<BTreeMap<i64, Vehicle>>,
    created_at: DateTime<Utc>,
    next_id: AtomicI64,
}

impl Default for VehicleCollection {
    fn default() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            created_at: Utc::now(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl VehicleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: i64, mut vehicle: Vehicle) -> Result<Vehicle, String> {
        vehicle.validate()?;
        let mut items = self.items.write();
        if items.contains_key(&key) {
            return Err(format!("key {} already exists", key));
        }
        vehicle.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        items.insert(key, vehicle.clone());
        Ok(vehicle)
    }

    pub fn update(&self, key: i64, mut vehicle: Vehicle) -> Result<Vehicle, String> {
        vehicle.validate()?;
        let mut items = self.items.write();
        match items.get(&key) {
            Some(existing) => {
                vehicle.id = existing.id;
                items.insert(key, vehicle.clone());
                Ok(vehicle)
            }
            None => Err(format!("no vehicle under key {}", key)),
        }
    }

    pub fn remove(&self, key: i64) -> Option<Vehicle> {
        self.items.write().remove(&key)
    }

    pub fn clear(&self) -> usize {
        let mut items = self.items.write();
        let removed = items.len();
        items.clear();
        removed
    }

    /// Snapshot in key order.
    pub fn all(&self) -> Vec<(i64, Vehicle)> {
        self.items
            .read()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
