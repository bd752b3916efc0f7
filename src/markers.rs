//! Display-side view of individual settlements.
//!
//! The engine never rounds; populations are rounded here, at display time.
//! [`PopulationTracker`] is the caller-side memo that keeps marker popups
//! from being refreshed on every small change.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    dataset::{Category, Dataset},
    geodesic::Coordinates,
    influence::settlement_population,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementStatus {
    pub name: String,
    pub category: Category,
    pub coords: Coordinates,
    pub founded: i32,
    pub population: u64,
}

/// Settlements with a positive rounded population in `year`, in dataset order.
pub fn settlement_statuses(dataset: &Dataset, year: i32) -> Vec<SettlementStatus> {
    dataset
        .settlements
        .iter()
        .filter_map(|settlement| {
            let population = settlement_population(settlement, year).round();
            if population < 1.0 {
                return None;
            }
            Some(SettlementStatus {
                name: settlement.name.clone(),
                category: settlement.category,
                coords: settlement.coords,
                founded: settlement.founded,
                population: population as u64,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerChange {
    Appeared(SettlementStatus),
    Updated(SettlementStatus),
    Removed(String),
}

pub struct PopulationTracker {
    threshold: f64,
    last_reported: HashMap<String, u64>,
}

impl Default for PopulationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PopulationTracker {
    /// Reports updates larger than 10% of the last reported population.
    pub fn new() -> Self {
        Self::with_threshold(0.1)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            last_reported: HashMap::new(),
        }
    }

    pub fn last_reported(&self, name: &str) -> Option<u64> {
        self.last_reported.get(name).copied()
    }

    /// Diff `statuses` against what was last reported. Removals come last,
    /// sorted by name.
    pub fn observe(&mut self, statuses: &[SettlementStatus]) -> Vec<MarkerChange> {
        let mut changes = Vec::new();
        let mut seen = HashSet::with_capacity(statuses.len());

        for status in statuses {
            seen.insert(status.name.as_str());
            match self.last_reported.get(&status.name).copied() {
                None => {
                    self.last_reported
                        .insert(status.name.clone(), status.population);
                    changes.push(MarkerChange::Appeared(status.clone()));
                }
                Some(last) => {
                    let delta = status.population.abs_diff(last) as f64;
                    if delta > last as f64 * self.threshold {
                        self.last_reported
                            .insert(status.name.clone(), status.population);
                        changes.push(MarkerChange::Updated(status.clone()));
                    }
                }
            }
        }

        let mut removed: Vec<String> = self
            .last_reported
            .keys()
            .filter(|name| !seen.contains(name.as_str()))
            .cloned()
            .collect();
        removed.sort();
        for name in removed {
            self.last_reported.remove(&name);
            changes.push(MarkerChange::Removed(name));
        }
        changes
    }
}
