//! Food pellets and the bookkeeping the snapshot delta is built from.
//!
//! Ids are handed out monotonically and items are kept in a `BTreeMap`, so
//! iteration order is insertion order and evicting the oldest pellet is a
//! `pop_first`.

use rand::Rng;
use shared::{FoodId, GRID_SIZE};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    pub id: FoodId,
    pub x: f32,
    pub y: f32,
    pub value: u8,
}

/// Food changes accumulated since the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoodDelta {
    pub eaten: Vec<FoodId>,
    pub added: Vec<Food>,
}

#[derive(Debug, Default)]
pub struct FoodStore {
    items: BTreeMap<FoodId, Food>,
    next_id: FoodId,
    /// Removed ids the clients already know about.
    eaten: Vec<FoodId>,
    /// Ids added since the last delta was taken.
    added: BTreeSet<FoodId>,
}

impl FoodStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, x: f32, y: f32, value: u8) -> FoodId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, Food { id, x, y, value });
        self.added.insert(id);
        id
    }

    /// Places a pellet of random value (1..=5) at a random integer point.
    pub fn spawn_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> FoodId {
        let bound = GRID_SIZE as u32;
        let x = rng.gen_range(0..bound) as f32;
        let y = rng.gen_range(0..bound) as f32;
        let value = rng.gen_range(1..=5);
        self.insert(x, y, value)
    }

    pub fn remove(&mut self, id: FoodId) -> Option<Food> {
        let food = self.items.remove(&id)?;
        self.forget(id);
        Some(food)
    }

    /// Removes and returns every pellet strictly closer than `reach` to the
    /// point.
    pub fn consume_near(&mut self, x: f32, y: f32, reach: f32) -> Vec<Food> {
        let reach_sq = reach * reach;
        let hits: Vec<FoodId> = self
            .items
            .values()
            .filter(|food| {
                let dx = food.x - x;
                let dy = food.y - y;
                dx * dx + dy * dy < reach_sq
            })
            .map(|food| food.id)
            .collect();

        hits.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Evicts the oldest pellets until at most `cap` remain. Returns how many
    /// were evicted.
    pub fn enforce_cap(&mut self, cap: usize) -> usize {
        let mut evicted = 0;
        while self.items.len() > cap {
            let Some((id, _)) = self.items.pop_first() else {
                break;
            };
            self.forget(id);
            evicted += 1;
        }
        evicted
    }

    /// Drains the changes since the previous call. A pellet that was added
    /// and removed in between shows up in neither list.
    pub fn take_delta(&mut self) -> FoodDelta {
        let added_ids = std::mem::take(&mut self.added);
        FoodDelta {
            eaten: std::mem::take(&mut self.eaten),
            added: added_ids
                .into_iter()
                .filter_map(|id| self.items.get(&id).cloned())
                .collect(),
        }
    }

    /// Merges an undelivered delta back in front of the pending changes.
    pub fn restore_delta(&mut self, delta: FoodDelta) {
        let mut eaten = delta.eaten;
        eaten.append(&mut self.eaten);
        self.eaten = eaten;
        for food in delta.added {
            if self.items.contains_key(&food.id) {
                self.added.insert(food.id);
            }
        }
    }

    pub fn get(&self, id: FoodId) -> Option<&Food> {
        self.items.get(&id)
    }

    /// Pellets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Food> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn forget(&mut self, id: FoodId) {
        if !self.added.remove(&id) {
            self.eaten.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spawn_random_within_grid() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut store = FoodStore::new();
        for _ in 0..200 {
            store.spawn_random(&mut rng);
        }

        assert_eq!(store.len(), 200);
        for food in store.iter() {
            assert!((0.0..GRID_SIZE).contains(&food.x));
            assert!((0.0..GRID_SIZE).contains(&food.y));
            assert_eq!(food.x.fract(), 0.0);
            assert!((1..=5).contains(&food.value));
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut store = FoodStore::new();
        let a = store.insert(1.0, 1.0, 1);
        let b = store.insert(2.0, 2.0, 1);
        store.remove(a);
        let c = store.insert(3.0, 3.0, 1);

        assert!(a < b && b < c);
    }

    #[test]
    fn test_consume_near() {
        let mut store = FoodStore::new();
        let near = store.insert(103.0, 100.0, 3);
        let edge = store.insert(110.0, 100.0, 1);
        let far = store.insert(300.0, 300.0, 2);

        let eaten = store.consume_near(100.0, 100.0, 10.0);

        assert_eq!(eaten.len(), 1);
        assert_eq!(eaten[0].id, near);
        assert!(store.get(edge).is_some());
        assert!(store.get(far).is_some());
    }

    #[test]
    fn test_enforce_cap_evicts_oldest_first() {
        let mut store = FoodStore::new();
        let ids: Vec<FoodId> = (0..10).map(|i| store.insert(i as f32, 0.0, 1)).collect();

        let evicted = store.enforce_cap(7);

        assert_eq!(evicted, 3);
        assert_eq!(store.len(), 7);
        for id in &ids[..3] {
            assert!(store.get(*id).is_none());
        }
        for id in &ids[3..] {
            assert!(store.get(*id).is_some());
        }
        assert_eq!(store.enforce_cap(7), 0);
    }

    #[test]
    fn test_delta_tracks_changes_between_drains() {
        let mut store = FoodStore::new();
        let old = store.insert(1.0, 1.0, 1);
        store.take_delta();

        let new = store.insert(2.0, 2.0, 4);
        store.remove(old);

        let delta = store.take_delta();
        assert_eq!(delta.eaten, vec![old]);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].id, new);

        assert_eq!(store.take_delta(), FoodDelta::default());
    }

    #[test]
    fn test_restore_delta_merges_with_newer_changes() {
        let mut store = FoodStore::new();
        let old = store.insert(1.0, 1.0, 1);
        store.take_delta();

        store.remove(old);
        let first = store.insert(2.0, 2.0, 2);
        let undelivered = store.take_delta();

        let second = store.insert(3.0, 3.0, 3);
        store.restore_delta(undelivered);

        let delta = store.take_delta();
        assert_eq!(delta.eaten, vec![old]);
        let added: Vec<FoodId> = delta.added.iter().map(|food| food.id).collect();
        assert_eq!(added, vec![first, second]);
    }

    #[test]
    fn test_delta_hides_short_lived_food() {
        let mut store = FoodStore::new();
        store.take_delta();

        let flash = store.insert(5.0, 5.0, 2);
        store.remove(flash);
        let evicted = store.insert(6.0, 6.0, 2);
        store.insert(7.0, 7.0, 2);
        store.enforce_cap(1);

        let delta = store.take_delta();
        assert!(delta.eaten.is_empty());
        assert_eq!(delta.added.len(), 1);
        assert_ne!(delta.added[0].id, evicted);
    }
}
