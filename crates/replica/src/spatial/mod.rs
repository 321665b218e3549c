//! Per-map spatial indexing of entities.

mod aabb;
mod tree;

use std::collections::HashMap;
use std::hash::Hash;

use glam::Vec2;

use crate::types::MapId;

pub use aabb::Box2;
pub use tree::{DynamicTree, GrowthPolicy};

/// One dynamic tree per map, created on first insertion. Queries against a
/// map that never held anything return nothing and allocate nothing.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    trees: HashMap<MapId, DynamicTree<T>>,
    locations: HashMap<T, MapId>,
    margin: f32,
    growth: GrowthPolicy,
}

impl<T> Default for SpatialIndex<T>
where
    T: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new(0.1, GrowthPolicy::default())
    }
}

impl<T> SpatialIndex<T>
where
    T: Copy + Eq + Hash,
{
    pub fn new(margin: f32, growth: GrowthPolicy) -> Self {
        Self {
            trees: HashMap::new(),
            locations: HashMap::new(),
            margin,
            growth,
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn map_count(&self) -> usize {
        self.trees.len()
    }

    pub fn tree(&self, map: MapId) -> Option<&DynamicTree<T>> {
        self.trees.get(&map)
    }

    pub fn map_of(&self, item: &T) -> Option<MapId> {
        self.locations.get(item).copied()
    }

    pub fn aabb(&self, item: &T) -> Option<Box2> {
        let map = self.locations.get(item)?;
        self.trees.get(map)?.aabb(item)
    }

    /// Places the item on `map` at `aabb`, moving it off any other map first.
    pub fn insert_or_update(&mut self, item: T, map: MapId, aabb: Box2) -> bool {
        if let Some(previous) = self.locations.get(&item).copied() {
            if previous != map {
                if let Some(tree) = self.trees.get_mut(&previous) {
                    tree.remove(&item);
                }
            }
        }
        self.locations.insert(item, map);

        let (margin, growth) = (self.margin, self.growth);
        self.trees
            .entry(map)
            .or_insert_with(|| DynamicTree::new(margin, growth))
            .insert_or_update(item, aabb)
    }

    pub fn remove(&mut self, item: &T) -> bool {
        let Some(map) = self.locations.remove(item) else {
            return false;
        };
        self.trees
            .get_mut(&map)
            .map(|tree| tree.remove(item))
            .unwrap_or(false)
    }

    pub fn query_region(&self, map: MapId, aabb: &Box2, approximate: bool) -> Vec<T> {
        self.trees
            .get(&map)
            .map(|tree| tree.query_region(aabb, approximate))
            .unwrap_or_default()
    }

    pub fn query_point(&self, map: MapId, point: Vec2, approximate: bool) -> Vec<T> {
        self.trees
            .get(&map)
            .map(|tree| tree.query_point(point, approximate))
            .unwrap_or_default()
    }

    pub fn query_any<F>(&self, map: MapId, aabb: &Box2, filter: F) -> bool
    where
        F: FnMut(T) -> bool,
    {
        self.trees
            .get(&map)
            .is_some_and(|tree| tree.query_any(aabb, filter))
    }

    pub fn clear(&mut self) {
        self.trees.clear();
        self.locations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trees_are_created_lazily_per_map() {
        let mut index: SpatialIndex<u32> = SpatialIndex::default();
        assert!(index.query_point(MapId(3), Vec2::ZERO, false).is_empty());
        assert_eq!(index.map_count(), 0);

        index.insert_or_update(1, MapId(1), Box2::from_point(Vec2::ZERO));
        assert_eq!(index.map_count(), 1);
        assert!(index.tree(MapId(2)).is_none());
    }

    #[test]
    fn moving_between_maps_leaves_one_entry() {
        let mut index: SpatialIndex<u32> = SpatialIndex::default();
        let aabb = Box2::centered(Vec2::ZERO, Vec2::ONE);

        index.insert_or_update(1, MapId(1), aabb);
        index.insert_or_update(1, MapId(2), aabb);

        assert!(index.query_region(MapId(1), &aabb, true).is_empty());
        assert_eq!(index.query_region(MapId(2), &aabb, false), vec![1]);
        assert_eq!(index.map_of(&1), Some(MapId(2)));
        assert_eq!(index.len(), 1);

        assert!(index.remove(&1));
        assert!(!index.remove(&1));
        assert!(!index.query_any(MapId(2), &aabb, |_| true));
    }
}
