use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::trace;

use crate::engine::Grid;

/// Caller-side memo of built grids, keyed by year, first-in first-out.
///
/// The cache never builds. Look up, release any lock around it, build, then
/// [`insert`](Self::insert).
pub struct GridCache {
    capacity: usize,
    grids: HashMap<i32, Arc<Grid>>,
    order: VecDeque<i32>,
    hits: u64,
    misses: u64,
}

impl GridCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            grids: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached grid for `year`, counting the lookup as a hit or a miss.
    pub fn get(&mut self, year: i32) -> Option<Arc<Grid>> {
        match self.grids.get(&year) {
            Some(grid) => {
                self.hits += 1;
                Some(Arc::clone(grid))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, year: i32, grid: Arc<Grid>) {
        if self.grids.insert(year, grid).is_some() {
            return;
        }
        self.order.push_back(year);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.grids.remove(&evicted);
                trace!(year = evicted, "evicted cached grid");
            }
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.grids.contains_key(&year)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::EngineConfig, dataset::Dataset, engine::DensityEngine};

    fn engine() -> DensityEngine {
        let dataset = Dataset {
            name: "empty".into(),
            ..Dataset::default()
        };
        DensityEngine::from_dataset(&dataset, EngineConfig::default())
    }

    #[test]
    fn memoizes_per_year() {
        let engine = engine();
        let mut cache = GridCache::new(4);

        assert!(cache.get(1800).is_none());
        let built = Arc::new(engine.build_grid(1800));
        cache.insert(1800, Arc::clone(&built));

        let cached = cache.get(1800).unwrap();
        assert!(Arc::ptr_eq(&built, &cached));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn evicts_oldest_year() {
        let engine = engine();
        let mut cache = GridCache::new(2);

        for year in [1800, 1810, 1820] {
            cache.insert(year, Arc::new(engine.build_grid(year)));
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(1800));
        assert!(cache.contains(1810));
        assert!(cache.contains(1820));
    }

    #[test]
    fn reinserting_a_year_keeps_its_slot() {
        let engine = engine();
        let mut cache = GridCache::new(2);

        cache.insert(1800, Arc::new(engine.build_grid(1800)));
        cache.insert(1810, Arc::new(engine.build_grid(1810)));
        cache.insert(1800, Arc::new(engine.build_grid(1800)));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(1800) && cache.contains(1810));
    }
}
