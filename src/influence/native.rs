use crate::{
    dataset::PopulationCenter,
    geodesic::{haversine_miles, Coordinates},
    series::ClampPolicy,
};

use super::{GroupDensities, InfluenceLayer};

/// Native density one population center adds at `center`.
pub fn native_influence(
    population_center: &PopulationCenter,
    center: Coordinates,
    year: i32,
    cutoff_radii: f64,
) -> f64 {
    let radius = population_center.radius_miles;
    let distance = haversine_miles(center, population_center.coords);
    if distance >= radius * cutoff_radii {
        return 0.0;
    }
    let density = population_center
        .density
        .interpolate(year, ClampPolicy::HoldFirst);
    density * (-distance / radius).exp()
}

pub struct NativeLayer {
    centers: Vec<PopulationCenter>,
    cutoff_radii: f64,
}

impl NativeLayer {
    pub fn new(centers: Vec<PopulationCenter>, cutoff_radii: f64) -> Self {
        Self {
            centers,
            cutoff_radii,
        }
    }
}

impl InfluenceLayer for NativeLayer {
    fn name(&self) -> &str {
        "native"
    }

    fn source_count(&self) -> usize {
        self.centers.len()
    }

    fn accumulate(&self, center: Coordinates, year: i32, densities: &mut GroupDensities) {
        for population_center in &self.centers {
            densities.native += native_influence(population_center, center, year, self.cutoff_radii);
        }
    }
}
