pub mod cache;
pub mod config;
pub mod dataset;
pub mod encoding;
pub mod engine;
pub mod expeditions;
pub mod geodesic;
pub mod grid;
pub mod influence;
pub mod markers;
pub mod series;
pub mod snapshot;
pub mod telemetry;
pub mod web;

pub use config::EngineConfig;
pub use dataset::{Dataset, DatasetLoader};
pub use engine::{DensityEngine, DominantGroup, EngineBuilder, Grid, GridCell};
