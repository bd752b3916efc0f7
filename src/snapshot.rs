use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::EncodingConfig;
use crate::encoding::RenderCell;
use crate::engine::Grid;
use crate::expeditions::Expedition;
use crate::markers::SettlementStatus;

/// Render-ready picture of one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub dataset: String,
    pub year: i32,
    pub cell_size: f64,
    pub max_density: f64,
    pub cells: Vec<RenderCell>,
    pub settlements: Vec<SettlementStatus>,
}

impl GridSnapshot {
    pub fn new(
        dataset: &str,
        grid: &Grid,
        settlements: Vec<SettlementStatus>,
        encoding: &EncodingConfig,
    ) -> Self {
        Self {
            dataset: dataset.to_string(),
            year: grid.year,
            cell_size: grid.cell_size,
            max_density: grid.max_density(),
            cells: grid.render(encoding),
            settlements,
        }
    }
}

/// One Polygon feature per cell, ring in `[lon, lat]` order.
pub fn grid_geojson(grid: &Grid, encoding: &EncodingConfig) -> Value {
    let features: Vec<Value> = grid
        .render(encoding)
        .into_iter()
        .map(|cell| {
            let (sw, ne) = (cell.bounds.sw, cell.bounds.ne);
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [sw.lon, sw.lat],
                        [ne.lon, sw.lat],
                        [ne.lon, ne.lat],
                        [sw.lon, ne.lat],
                        [sw.lon, sw.lat],
                    ]],
                },
                "properties": {
                    "year": grid.year,
                    "total_density": cell.total_density,
                    "native": cell.native,
                    "prior_colonial": cell.prior_colonial,
                    "current_power": cell.current_power,
                    "dominant": cell.dominant,
                    "fill": cell.css,
                },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// One Point feature per active settlement.
pub fn settlements_geojson(statuses: &[SettlementStatus]) -> Value {
    let features: Vec<Value> = statuses
        .iter()
        .map(|status| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [status.coords.lon, status.coords.lat],
                },
                "properties": {
                    "name": status.name,
                    "type": status.category,
                    "founded": status.founded,
                    "population": status.population,
                },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// One LineString feature per expedition, segments joined in route order.
pub fn expeditions_geojson(expeditions: &[&Expedition]) -> Value {
    let features: Vec<Value> = expeditions
        .iter()
        .map(|expedition| {
            let coordinates: Vec<[f64; 2]> = expedition
                .path()
                .map(|point| [point.lon, point.lat])
                .collect();
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "LineString",
                    "coordinates": coordinates,
                },
                "properties": {
                    "name": expedition.name,
                    "leader": expedition.leader,
                    "year": expedition.start_year,
                    "end_year": expedition.end_year.unwrap_or(expedition.start_year),
                    "kind": expedition.kind,
                    "color": expedition.color,
                    "description": expedition.description,
                },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Writes `<dir>/<dataset>/year_YYYY.json` snapshots.
pub struct SnapshotWriter {
    output_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, dataset: &str, year: i32) -> PathBuf {
        self.output_dir
            .join(dataset)
            .join(format!("year_{year:04}.json"))
    }

    pub fn write(&self, snapshot: &GridSnapshot) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(&snapshot.dataset, snapshot.year);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn read(&self, dataset: &str, year: i32) -> Result<GridSnapshot, SnapshotError> {
        let text = fs::read_to_string(self.path_for(dataset, year))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Category;
    use crate::engine::{DominantGroup, GridCell};
    use crate::expeditions::{RouteKind, RouteSegment};
    use crate::geodesic::Coordinates;
    use crate::grid::{CellBounds, CellPos};
    use crate::influence::GroupDensities;

    fn grid() -> Grid {
        Grid {
            year: 1800,
            cell_size: 0.5,
            cells: vec![GridCell {
                pos: CellPos { row: 8, col: 5 },
                bounds: CellBounds {
                    sw: Coordinates::new(36.5, -122.0),
                    ne: Coordinates::new(37.0, -121.5),
                },
                densities: GroupDensities {
                    native: 3.0,
                    prior_colonial: 9.0,
                    current_power: 0.0,
                },
                total_density: 12.0,
                dominant: DominantGroup::Spanish,
            }],
        }
    }

    fn carmel() -> SettlementStatus {
        SettlementStatus {
            name: "Carmel".into(),
            category: Category::Mission,
            coords: Coordinates::new(36.5397, -121.9256),
            founded: 1770,
            population: 250,
        }
    }

    #[test]
    fn grid_features_are_closed_polygons() {
        let geojson = grid_geojson(&grid(), &EncodingConfig::default());
        let feature = &geojson["features"][0];
        let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();

        assert_eq!(geojson["type"], "FeatureCollection");
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(ring[0], json!([-122.0, 36.5]));
        assert_eq!(feature["properties"]["dominant"], "spanish");
        assert_eq!(feature["properties"]["fill"], "hsl(45, 50%, 50.0%)");
    }

    #[test]
    fn settlement_points_use_lon_lat() {
        let geojson = settlements_geojson(&[carmel()]);
        let feature = &geojson["features"][0];
        assert_eq!(
            feature["geometry"]["coordinates"],
            json!([-121.9256, 36.5397])
        );
        assert_eq!(feature["properties"]["type"], "mission");
        assert_eq!(feature["properties"]["population"], 250);
    }

    #[test]
    fn expedition_routes_are_joined_line_strings() {
        let segment = |path: Vec<Coordinates>| RouteSegment {
            path,
            start_date: None,
            end_date: None,
            description: None,
        };
        let cabrillo = Expedition {
            name: "Cabrillo-Ferrer Expedition".into(),
            leader: "Juan Rodríguez Cabrillo".into(),
            start_year: 1542,
            end_year: Some(1543),
            sponsor: None,
            purpose: None,
            kind: Some(RouteKind::Sea),
            description: String::new(),
            color: "#4169E1".into(),
            route: vec![
                segment(vec![
                    Coordinates::new(32.718, -117.183),
                    Coordinates::new(38.033, -122.932),
                ]),
                segment(vec![
                    Coordinates::new(38.033, -122.932),
                    Coordinates::new(41.755, -124.211),
                ]),
            ],
            annotations: Vec::new(),
        };

        let geojson = expeditions_geojson(&[&cabrillo]);
        let feature = &geojson["features"][0];
        assert_eq!(feature["geometry"]["type"], "LineString");
        assert_eq!(
            feature["geometry"]["coordinates"],
            json!([
                [-117.183, 32.718],
                [-122.932, 38.033],
                [-122.932, 38.033],
                [-124.211, 41.755]
            ])
        );
        assert_eq!(feature["properties"]["year"], 1542);
        assert_eq!(feature["properties"]["end_year"], 1543);
        assert_eq!(feature["properties"]["kind"], "sea");
    }

    #[test]
    fn writes_and_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let snapshot = GridSnapshot::new(
            "california",
            &grid(),
            vec![carmel()],
            &EncodingConfig::default(),
        );

        let path = writer.write(&snapshot).unwrap();
        assert_eq!(path, dir.path().join("california").join("year_1800.json"));
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"dataset\": \"california\""));

        let loaded = writer.read("california", 1800).unwrap();
        assert_eq!(loaded.cells.len(), 1);
        assert_eq!(loaded.settlements[0].name, "Carmel");
        assert_eq!(loaded.max_density, 12.0);
    }
}
