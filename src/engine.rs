//! Grid aggregation: one density grid per queried year.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::{EncodingConfig, EngineConfig, EraConfig},
    dataset::Dataset,
    encoding::RenderCell,
    grid::{CellBounds, CellPos, LatLonGrid},
    influence::{Era, GroupDensities, InfluenceLayer, NativeLayer, SettlementLayer},
};

/// Group a cell is coloured by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DominantGroup {
    Native,
    Spanish,
    Mexican,
    American,
    Mixed,
}

impl DominantGroup {
    pub fn label(self) -> &'static str {
        match self {
            DominantGroup::Native => "Native",
            DominantGroup::Spanish => "Spanish",
            DominantGroup::Mexican => "Mexican",
            DominantGroup::American => "American",
            DominantGroup::Mixed => "Mixed",
        }
    }
}

/// Resolve the dominant group of a cell.
///
/// Precedence: a strictly largest current-power share, then a near tie
/// between native and prior-colonial densities, then a strictly largest
/// prior-colonial share, and finally native.
pub fn classify(
    densities: &GroupDensities,
    year: i32,
    mixed_threshold: f64,
    eras: &EraConfig,
) -> DominantGroup {
    let GroupDensities {
        native,
        prior_colonial,
        current_power,
    } = *densities;

    if current_power > 0.0 && current_power > prior_colonial && current_power > native {
        return DominantGroup::American;
    }
    if native > 0.0 && prior_colonial > 0.0 && (native - prior_colonial).abs() < mixed_threshold {
        return DominantGroup::Mixed;
    }
    if prior_colonial > 0.0 && prior_colonial > native && prior_colonial > current_power {
        return match Era::of(year, eras) {
            Era::Spanish => DominantGroup::Spanish,
            Era::Mexican | Era::American => DominantGroup::Mexican,
        };
    }
    DominantGroup::Native
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub pos: CellPos,
    pub bounds: CellBounds,
    pub densities: GroupDensities,
    pub total_density: f64,
    pub dominant: DominantGroup,
}

/// Cells that cleared the density threshold, in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub year: i32,
    pub cell_size: f64,
    pub cells: Vec<GridCell>,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Largest total density, or 1 when no cell is positive.
    pub fn max_density(&self) -> f64 {
        let max = self
            .cells
            .iter()
            .map(|cell| cell.total_density)
            .fold(0.0_f64, f64::max);
        if max > 0.0 {
            max
        } else {
            1.0
        }
    }

    pub fn count_by_group(&self, group: DominantGroup) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.dominant == group)
            .count()
    }

    /// Emitted cell at `pos`; cells are sorted, so this is a binary search.
    pub fn cell(&self, pos: CellPos) -> Option<&GridCell> {
        self.cells
            .binary_search_by_key(&pos, |cell| cell.pos)
            .ok()
            .map(|index| &self.cells[index])
    }

    pub fn render(&self, config: &EncodingConfig) -> Vec<RenderCell> {
        let max_density = self.max_density();
        self.cells
            .iter()
            .map(|cell| RenderCell::new(cell, max_density, config))
            .collect()
    }
}

pub struct EngineBuilder {
    config: EngineConfig,
    layers: Vec<Box<dyn InfluenceLayer>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
        }
    }

    /// Native population centers first, then settlements.
    pub fn from_dataset(dataset: &Dataset, config: EngineConfig) -> Self {
        let native = NativeLayer::new(
            dataset.population_centers.clone(),
            config.influence.cutoff_radii,
        );
        let settlements = SettlementLayer::new(
            dataset.settlements.clone(),
            config.influence.clone(),
            config.eras.clone(),
        );
        Self::new(config).with_layer(native).with_layer(settlements)
    }

    pub fn with_layer(mut self, layer: impl InfluenceLayer + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn build(self) -> DensityEngine {
        DensityEngine {
            grid: LatLonGrid::new(&self.config.grid),
            layers: self.layers,
            config: self.config,
        }
    }
}

/// Stateless between queries: every grid is a pure function of the year.
pub struct DensityEngine {
    grid: LatLonGrid,
    layers: Vec<Box<dyn InfluenceLayer>>,
    config: EngineConfig,
}

impl DensityEngine {
    pub fn from_dataset(dataset: &Dataset, config: EngineConfig) -> Self {
        EngineBuilder::from_dataset(dataset, config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lat_lon_grid(&self) -> &LatLonGrid {
        &self.grid
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    /// Summed densities for one cell, whether or not it clears the threshold.
    pub fn densities_at(&self, pos: CellPos, year: i32) -> GroupDensities {
        let center = self.grid.center(pos);
        let mut densities = GroupDensities::default();
        for layer in &self.layers {
            layer.accumulate(center, year, &mut densities);
        }
        densities
    }

    /// Classified cell at `pos`, or `None` below the density threshold.
    pub fn cell_at(&self, pos: CellPos, year: i32) -> Option<GridCell> {
        let densities = self.densities_at(pos, year);
        let total_density = densities.total();
        if total_density <= self.config.grid.min_total_density {
            return None;
        }
        Some(GridCell {
            pos,
            bounds: self.grid.bounds(pos),
            densities,
            total_density,
            dominant: classify(
                &densities,
                year,
                self.config.influence.mixed_threshold,
                &self.config.eras,
            ),
        })
    }

    pub fn build_grid(&self, year: i32) -> Grid {
        let start = Instant::now();
        let cells: Vec<GridCell> = self
            .grid
            .positions()
            .filter_map(|pos| self.cell_at(pos, year))
            .collect();
        self.finish(year, cells, start, "sequential")
    }

    /// Rows are evaluated on the rayon pool; output matches [`build_grid`].
    ///
    /// [`build_grid`]: DensityEngine::build_grid
    pub fn build_grid_parallel(&self, year: i32) -> Grid {
        let start = Instant::now();
        let rows: Vec<Vec<GridCell>> = (0..self.grid.rows())
            .into_par_iter()
            .map(|row| {
                self.grid
                    .row_positions(row)
                    .filter_map(|pos| self.cell_at(pos, year))
                    .collect()
            })
            .collect();
        let cells = rows.into_iter().flatten().collect();
        self.finish(year, cells, start, "parallel")
    }

    fn finish(&self, year: i32, cells: Vec<GridCell>, start: Instant, mode: &str) -> Grid {
        debug!(
            year,
            mode,
            emitted = cells.len(),
            evaluated = self.grid.cell_count(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0,
            "built density grid"
        );
        Grid {
            year,
            cell_size: self.grid.cell_size(),
            cells,
        }
    }
}
