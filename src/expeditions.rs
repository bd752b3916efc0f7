//! Exploration routes active in a given year.
//!
//! Two route sets are kept: the early exploration voyages, shown for years
//! before colonization, and the colonial-era expeditions from 1769 on. A
//! query only ever draws from one of them.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::geodesic::Coordinates;

/// First year served from `Dataset::expeditions` instead of
/// `Dataset::early_expeditions`.
pub const COLONIAL_ROUTES_FROM: i32 = 1769;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Land,
    Sea,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub path: Vec<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expedition {
    pub name: String,
    pub leader: String,
    pub start_year: i32,
    /// Missing means the expedition is shown in `start_year` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RouteKind>,
    pub description: String,
    pub color: String,
    pub route: Vec<RouteSegment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl Expedition {
    /// Inclusive on both ends.
    pub fn is_active(&self, year: i32) -> bool {
        let end = self.end_year.unwrap_or(self.start_year);
        self.start_year <= year && year <= end
    }

    /// All segments joined into one line, in route order.
    pub fn path(&self) -> impl Iterator<Item = Coordinates> + '_ {
        self.route
            .iter()
            .flat_map(|segment| segment.path.iter().copied())
    }
}

/// An annotation tagged with the expedition it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpeditionAnnotation {
    pub expedition: String,
    #[serde(flatten)]
    pub annotation: Annotation,
}

/// Expeditions shown in `year`, in dataset order.
pub fn active_expeditions(dataset: &Dataset, year: i32) -> Vec<&Expedition> {
    let routes = if year < COLONIAL_ROUTES_FROM {
        &dataset.early_expeditions
    } else {
        &dataset.expeditions
    };
    routes
        .iter()
        .filter(|expedition| expedition.is_active(year))
        .collect()
}

pub fn active_annotations(dataset: &Dataset, year: i32) -> Vec<ExpeditionAnnotation> {
    active_expeditions(dataset, year)
        .into_iter()
        .flat_map(|expedition| {
            expedition
                .annotations
                .iter()
                .map(|annotation| ExpeditionAnnotation {
                    expedition: expedition.name.clone(),
                    annotation: annotation.clone(),
                })
        })
        .collect()
}
