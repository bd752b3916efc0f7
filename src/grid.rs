//! Regular latitude/longitude grid over a bounding box.

use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::geodesic::Coordinates;

/// Cell position in the grid; `row` counts north from the southern edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub row: u32,
    pub col: u32,
}

/// South-west and north-east corners of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellBounds {
    pub sw: Coordinates,
    pub ne: Coordinates,
}

impl CellBounds {
    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            (self.sw.lat + self.ne.lat) / 2.0,
            (self.sw.lon + self.ne.lon) / 2.0,
        )
    }
}

#[derive(Debug, Clone)]
pub struct LatLonGrid {
    south: f64,
    west: f64,
    cell_size: f64,
    rows: u32,
    cols: u32,
}

impl LatLonGrid {
    pub fn new(config: &GridConfig) -> Self {
        let rows = steps_below(config.south, config.north, config.cell_size_deg);
        let cols = steps_below(config.west, config.east, config.cell_size_deg);
        Self {
            south: config.south,
            west: config.west,
            cell_size: config.cell_size_deg,
            rows,
            cols,
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.cols)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn bounds(&self, pos: CellPos) -> CellBounds {
        let lat = self.south + f64::from(pos.row) * self.cell_size;
        let lon = self.west + f64::from(pos.col) * self.cell_size;
        CellBounds {
            sw: Coordinates::new(lat, lon),
            ne: Coordinates::new(lat + self.cell_size, lon + self.cell_size),
        }
    }

    pub fn center(&self, pos: CellPos) -> Coordinates {
        let lat = self.south + f64::from(pos.row) * self.cell_size;
        let lon = self.west + f64::from(pos.col) * self.cell_size;
        Coordinates::new(lat + self.cell_size / 2.0, lon + self.cell_size / 2.0)
    }

    /// Positions in row-major order: south to north, west to east.
    pub fn positions(&self) -> impl Iterator<Item = CellPos> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| CellPos { row, col }))
    }

    pub fn row_positions(&self, row: u32) -> impl Iterator<Item = CellPos> {
        (0..self.cols).map(move |col| CellPos { row, col })
    }
}

/// Number of `start + k * step` values strictly below `end`.
fn steps_below(start: f64, end: f64, step: f64) -> u32 {
    let mut count = 0_u32;
    while start + f64::from(count) * step < end {
        count += 1;
    }
    count
}
