//! Engine configuration.
//!
//! Every field is defaulted, so an empty YAML document is the same as
//! `EngineConfig::default()`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Category;

/// Largest grid `validate` accepts.
pub const MAX_GRID_CELLS: f64 = 4_000_000.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub influence: InfluenceConfig,
    pub eras: EraConfig,
    pub encoding: EncodingConfig,
    pub logging: LoggingConfig,
}

/// Bounding box and resolution of the density grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
    pub cell_size_deg: f64,
    /// Cells whose total density does not exceed this are dropped.
    pub min_total_density: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            south: 32.5,
            north: 42.0,
            west: -124.5,
            east: -114.0,
            cell_size_deg: 0.5,
            min_total_density: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiusTable {
    pub pueblo: f64,
    pub city: f64,
    pub mining: f64,
    pub mission: f64,
    pub presidio: f64,
    pub default: f64,
}

impl Default for RadiusTable {
    fn default() -> Self {
        Self {
            pueblo: 15.0,
            city: 15.0,
            mining: 20.0,
            mission: 12.0,
            presidio: 12.0,
            default: 10.0,
        }
    }
}

impl RadiusTable {
    pub fn radius_for(&self, category: Category) -> f64 {
        match category {
            Category::Pueblo => self.pueblo,
            Category::City => self.city,
            Category::Mining => self.mining,
            Category::Mission => self.mission,
            Category::Presidio => self.presidio,
            Category::Ranch | Category::Russian => self.default,
        }
    }

    fn all(&self) -> [f64; 6] {
        [
            self.pueblo,
            self.city,
            self.mining,
            self.mission,
            self.presidio,
            self.default,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluenceConfig {
    pub radius_miles: RadiusTable,
    /// Sources farther than `cutoff_radii * radius` are skipped.
    pub cutoff_radii: f64,
    /// Multiplier applied to settlement densities.
    pub settlement_scale: f64,
    /// Native/prior-colonial difference below which a cell is "mixed".
    pub mixed_threshold: f64,
}

impl Default for InfluenceConfig {
    fn default() -> Self {
        Self {
            radius_miles: RadiusTable::default(),
            cutoff_radii: 2.0,
            settlement_scale: 10.0,
            mixed_threshold: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EraConfig {
    pub mexican_from: i32,
    pub american_from: i32,
    /// Share of a settlement's density still credited to the prior-colonial
    /// group once the American era begins, on top of the full current share.
    pub carryover_fraction: f64,
}

impl Default for EraConfig {
    fn default() -> Self {
        Self {
            mexican_from: 1821,
            american_from: 1847,
            carryover_fraction: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub gamma: f64,
    pub lightness_max: f64,
    pub lightness_range: f64,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            gamma: 0.7,
            lightness_max: 85.0,
            lightness_range: 35.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as a map.
        let config: EngineConfig = if contents.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = &self.grid;
        if !(grid.cell_size_deg > 0.0) {
            return Err(ConfigError::Validation(format!(
                "cell_size_deg must be positive, got {}",
                grid.cell_size_deg
            )));
        }
        if grid.south >= grid.north || grid.west >= grid.east {
            return Err(ConfigError::Validation(format!(
                "grid bounds are inverted: south {} north {} west {} east {}",
                grid.south, grid.north, grid.west, grid.east
            )));
        }
        let rows = ((grid.north - grid.south) / grid.cell_size_deg).ceil();
        let cols = ((grid.east - grid.west) / grid.cell_size_deg).ceil();
        if !(rows * cols <= MAX_GRID_CELLS) {
            return Err(ConfigError::Validation(format!(
                "cell_size_deg {} gives {} x {} cells, more than {}",
                grid.cell_size_deg, rows, cols, MAX_GRID_CELLS
            )));
        }
        if self
            .influence
            .radius_miles
            .all()
            .iter()
            .any(|radius| !(*radius > 0.0))
        {
            return Err(ConfigError::Validation(
                "every settlement radius must be positive".into(),
            ));
        }
        if !(self.influence.cutoff_radii > 0.0) {
            return Err(ConfigError::Validation(
                "cutoff_radii must be positive".into(),
            ));
        }
        if self.eras.mexican_from > self.eras.american_from {
            return Err(ConfigError::Validation(format!(
                "mexican_from ({}) must not be after american_from ({})",
                self.eras.mexican_from, self.eras.american_from
            )));
        }
        Ok(())
    }
}
