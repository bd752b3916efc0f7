use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::expeditions::Expedition;
use crate::geodesic::Coordinates;
use crate::series::TimeSeries;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("dataset validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Mission,
    Presidio,
    Pueblo,
    City,
    Mining,
    Ranch,
    Russian,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Mission => "Mission",
            Category::Presidio => "Presidio",
            Category::Pueblo => "Pueblo",
            Category::City => "City",
            Category::Mining => "Mining",
            Category::Ranch => "Ranch",
            Category::Russian => "Russian",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Affiliation {
    Spanish,
    Mexican,
    American,
    Russian,
}

impl Affiliation {
    /// Foreign settlements are credited to the contemporaneous colonial
    /// group regardless of era.
    pub fn is_foreign(self) -> bool {
        matches!(self, Affiliation::Russian)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub name: String,
    pub coords: Coordinates,
    pub category: Category,
    pub founded: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandoned: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<Affiliation>,
    #[serde(default)]
    pub population: TimeSeries,
}

impl Settlement {
    /// Whether the founding/abandonment gates allow any effect in `year`.
    pub fn is_active(&self, year: i32) -> bool {
        year >= self.founded && self.abandoned.map_or(true, |end| year <= end)
    }

    pub fn is_foreign(&self) -> bool {
        self.affiliation.is_some_and(Affiliation::is_foreign)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationCenter {
    pub name: String,
    pub coords: Coordinates,
    pub radius_miles: f64,
    #[serde(default)]
    pub density: TimeSeries,
}

/// Immutable historical inputs, kept in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default)]
    pub settlements: Vec<Settlement>,
    #[serde(default)]
    pub population_centers: Vec<PopulationCenter>,
    #[serde(default)]
    pub early_expeditions: Vec<Expedition>,
    #[serde(default)]
    pub expeditions: Vec<Expedition>,
}

impl Dataset {
    pub fn from_yaml_str(text: &str) -> Result<Self, DatasetError> {
        let dataset: Dataset = serde_yaml::from_str(text)?;
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.name.trim().is_empty() {
            return Err(DatasetError::Validation(
                "dataset must define a name".to_string(),
            ));
        }

        for settlement in &self.settlements {
            if settlement.name.trim().is_empty() {
                return Err(DatasetError::Validation(
                    "settlement names must not be empty".into(),
                ));
            }
            if let Some(abandoned) = settlement.abandoned {
                if abandoned < settlement.founded {
                    return Err(DatasetError::Validation(format!(
                        "settlement '{}' abandoned in {} before founding in {}",
                        settlement.name, abandoned, settlement.founded
                    )));
                }
            }
        }

        for center in &self.population_centers {
            if center.name.trim().is_empty() {
                return Err(DatasetError::Validation(
                    "population center names must not be empty".into(),
                ));
            }
            if !(center.radius_miles > 0.0) {
                return Err(DatasetError::Validation(format!(
                    "population center '{}' must have a positive radius, got {}",
                    center.name, center.radius_miles
                )));
            }
        }

        for expedition in self.early_expeditions.iter().chain(&self.expeditions) {
            if expedition.name.trim().is_empty() {
                return Err(DatasetError::Validation(
                    "expedition names must not be empty".into(),
                ));
            }
            if expedition.end_year.is_some_and(|end| end < expedition.start_year) {
                return Err(DatasetError::Validation(format!(
                    "expedition '{}' ends before it starts in {}",
                    expedition.name, expedition.start_year
                )));
            }
            if expedition.path().nth(1).is_none() {
                return Err(DatasetError::Validation(format!(
                    "expedition '{}' needs a route of at least two points",
                    expedition.name
                )));
            }
        }

        Ok(())
    }

    pub fn settlement(&self, name: &str) -> Option<&Settlement> {
        self.settlements.iter().find(|s| s.name == name)
    }
}

/// Boundary to whatever store holds the historical records.
pub trait DatasetSource {
    fn load_settlements(&self) -> Result<Vec<Settlement>, DatasetError>;
    fn load_population_centers(&self) -> Result<Vec<PopulationCenter>, DatasetError>;

    fn load_early_expeditions(&self) -> Result<Vec<Expedition>, DatasetError> {
        Ok(Vec::new())
    }

    fn load_expeditions(&self) -> Result<Vec<Expedition>, DatasetError> {
        Ok(Vec::new())
    }
}

impl DatasetSource for Dataset {
    fn load_settlements(&self) -> Result<Vec<Settlement>, DatasetError> {
        Ok(self.settlements.clone())
    }

    fn load_population_centers(&self) -> Result<Vec<PopulationCenter>, DatasetError> {
        Ok(self.population_centers.clone())
    }

    fn load_early_expeditions(&self) -> Result<Vec<Expedition>, DatasetError> {
        Ok(self.early_expeditions.clone())
    }

    fn load_expeditions(&self) -> Result<Vec<Expedition>, DatasetError> {
        Ok(self.expeditions.clone())
    }
}

/// Reads the dataset YAML on every call.
pub struct YamlDatasetSource {
    path: PathBuf,
}

impl YamlDatasetSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Result<Dataset, DatasetError> {
        let text = fs::read_to_string(&self.path)?;
        Dataset::from_yaml_str(&text)
    }
}

impl DatasetSource for YamlDatasetSource {
    fn load_settlements(&self) -> Result<Vec<Settlement>, DatasetError> {
        Ok(self.read()?.settlements)
    }

    fn load_population_centers(&self) -> Result<Vec<PopulationCenter>, DatasetError> {
        Ok(self.read()?.population_centers)
    }

    fn load_early_expeditions(&self) -> Result<Vec<Expedition>, DatasetError> {
        Ok(self.read()?.early_expeditions)
    }

    fn load_expeditions(&self) -> Result<Vec<Expedition>, DatasetError> {
        Ok(self.read()?.expeditions)
    }
}

pub struct DatasetLoader {
    base_dir: PathBuf,
}

impl DatasetLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Dataset> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read dataset file {}", path.display()))?;
        let dataset = Dataset::from_yaml_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(
            dataset = %dataset.name,
            settlements = dataset.settlements.len(),
            population_centers = dataset.population_centers.len(),
            expeditions = dataset.early_expeditions.len() + dataset.expeditions.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Assemble a dataset from any source.
    pub fn from_source(name: &str, source: &dyn DatasetSource) -> Result<Dataset> {
        let dataset = Dataset {
            name: name.to_string(),
            settlements: source
                .load_settlements()
                .context("Failed to load settlements")?,
            population_centers: source
                .load_population_centers()
                .context("Failed to load population centers")?,
            early_expeditions: source
                .load_early_expeditions()
                .context("Failed to load early expeditions")?,
            expeditions: source
                .load_expeditions()
                .context("Failed to load expeditions")?,
        };
        dataset.validate()?;
        Ok(dataset)
    }
}
