//! Spatial contribution of historical sources to a grid cell.
//!
//! Each layer owns one kind of source and adds its decayed densities into a
//! [`GroupDensities`] accumulator. Layers run in registration order and
//! visit their sources in stored order, which fixes the floating-point
//! summation order for every cell.

mod native;
mod settlement;

use serde::{Deserialize, Serialize};

use crate::config::EraConfig;
use crate::geodesic::Coordinates;

pub use native::{native_influence, NativeLayer};
pub use settlement::{
    effective_radius, settlement_influence, settlement_population, Routing,
    SettlementContribution, SettlementLayer,
};

/// Political period used to route colonial-era density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    Spanish,
    Mexican,
    American,
}

impl Era {
    pub fn of(year: i32, eras: &EraConfig) -> Self {
        if year < eras.mexican_from {
            Era::Spanish
        } else if year < eras.american_from {
            Era::Mexican
        } else {
            Era::American
        }
    }

    /// Display name for the prior-colonial bucket in this era.
    pub fn prior_colonial_label(self) -> &'static str {
        match self {
            Era::Spanish => "Spanish",
            Era::Mexican => "Mexican",
            Era::American => "Spanish/Mexican",
        }
    }
}

/// Per-cell densities (people per square mile) by demographic group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDensities {
    pub native: f64,
    pub prior_colonial: f64,
    pub current_power: f64,
}

impl GroupDensities {
    pub fn total(&self) -> f64 {
        self.native + self.prior_colonial + self.current_power
    }
}

pub trait InfluenceLayer: Send + Sync {
    fn name(&self) -> &str;

    /// Number of sources this layer iterates per cell.
    fn source_count(&self) -> usize;

    fn accumulate(&self, center: Coordinates, year: i32, densities: &mut GroupDensities);
}
