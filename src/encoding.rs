//! Colour encoding of classified cells for the map overlay.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EncodingConfig;
use crate::engine::{DominantGroup, GridCell};
use crate::grid::CellBounds;

/// Hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({}, {}%, {:.1}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}

/// Fixed `(hue, saturation)` per dominant group.
pub fn palette(group: DominantGroup) -> (f64, f64) {
    match group {
        DominantGroup::Native => (30.0, 35.0),
        DominantGroup::Spanish => (45.0, 50.0),
        DominantGroup::Mexican => (40.0, 45.0),
        DominantGroup::American => (210.0, 40.0),
        DominantGroup::Mixed => (35.0, 30.0),
    }
}

/// Encode one cell. `max_density` must cover every cell in the batch; a
/// non-positive value is treated as 1.
pub fn encode(cell: &GridCell, max_density: f64, config: &EncodingConfig) -> Hsl {
    let max_density = if max_density > 0.0 { max_density } else { 1.0 };
    let normalized = (cell.total_density / max_density).powf(config.gamma);
    let (hue, saturation) = palette(cell.dominant);
    Hsl {
        hue,
        saturation,
        lightness: config.lightness_max - normalized * config.lightness_range,
    }
}

/// Everything the map layer needs to draw and annotate one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderCell {
    pub bounds: CellBounds,
    pub total_density: f64,
    pub native: f64,
    pub prior_colonial: f64,
    pub current_power: f64,
    pub dominant: DominantGroup,
    pub color: Hsl,
    pub css: String,
}

impl RenderCell {
    pub fn new(cell: &GridCell, max_density: f64, config: &EncodingConfig) -> Self {
        let color = encode(cell, max_density, config);
        Self {
            bounds: cell.bounds,
            total_density: cell.total_density,
            native: cell.densities.native,
            prior_colonial: cell.densities.prior_colonial,
            current_power: cell.densities.current_power,
            dominant: cell.dominant,
            color,
            css: color.to_string(),
        }
    }
}
