use std::f64::consts::PI;

use crate::{
    config::{EraConfig, InfluenceConfig},
    dataset::Settlement,
    geodesic::{haversine_miles, Coordinates},
    series::ClampPolicy,
};

use super::{Era, GroupDensities, InfluenceLayer};

/// Which groups receive a settlement's density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Routing {
    PriorColonial,
    /// Full density to the current power plus `carryover` of it, again, to
    /// the prior-colonial group.
    CurrentWithCarryover { carryover: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementContribution {
    pub density: f64,
    pub routing: Routing,
}

impl SettlementContribution {
    pub fn apply_to(&self, densities: &mut GroupDensities) {
        match self.routing {
            Routing::PriorColonial => densities.prior_colonial += self.density,
            Routing::CurrentWithCarryover { carryover } => {
                densities.current_power += self.density;
                densities.prior_colonial += self.density * carryover;
            }
        }
    }
}

/// Interpolated population, zero outside the founding/abandonment window.
pub fn settlement_population(settlement: &Settlement, year: i32) -> f64 {
    if !settlement.is_active(year) {
        return 0.0;
    }
    settlement
        .population
        .interpolate(year, ClampPolicy::ZeroBefore)
}

pub fn effective_radius(settlement: &Settlement, influence: &InfluenceConfig) -> f64 {
    influence.radius_miles.radius_for(settlement.category)
}

fn routing_for(settlement: &Settlement, year: i32, eras: &EraConfig) -> Routing {
    if settlement.is_foreign() {
        return Routing::PriorColonial;
    }
    match Era::of(year, eras) {
        Era::Spanish | Era::Mexican => Routing::PriorColonial,
        Era::American => Routing::CurrentWithCarryover {
            carryover: eras.carryover_fraction,
        },
    }
}

/// Density one settlement adds at `center`, or `None` when it adds nothing.
pub fn settlement_influence(
    settlement: &Settlement,
    center: Coordinates,
    year: i32,
    influence: &InfluenceConfig,
    eras: &EraConfig,
) -> Option<SettlementContribution> {
    let population = settlement_population(settlement, year);
    if population <= 0.0 {
        return None;
    }

    let radius = effective_radius(settlement, influence);
    let distance = haversine_miles(center, settlement.coords);
    if distance >= radius * influence.cutoff_radii {
        return None;
    }

    let base_density = population / (PI * radius * radius);
    let decay = (-distance / radius).exp();
    Some(SettlementContribution {
        density: base_density * decay * influence.settlement_scale,
        routing: routing_for(settlement, year, eras),
    })
}

pub struct SettlementLayer {
    settlements: Vec<Settlement>,
    influence: InfluenceConfig,
    eras: EraConfig,
}

impl SettlementLayer {
    pub fn new(settlements: Vec<Settlement>, influence: InfluenceConfig, eras: EraConfig) -> Self {
        Self {
            settlements,
            influence,
            eras,
        }
    }
}

impl InfluenceLayer for SettlementLayer {
    fn name(&self) -> &str {
        "settlements"
    }

    fn source_count(&self) -> usize {
        self.settlements.len()
    }

    fn accumulate(&self, center: Coordinates, year: i32, densities: &mut GroupDensities) {
        for settlement in &self.settlements {
            if let Some(contribution) =
                settlement_influence(settlement, center, year, &self.influence, &self.eras)
            {
                contribution.apply_to(densities);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::{Affiliation, Category},
        series::TimeSeries,
    };

    fn settlement(category: Category, series: &[(i32, f64)]) -> Settlement {
        Settlement {
            name: "test".into(),
            coords: Coordinates::new(36.6, -121.9),
            category,
            founded: 1770,
            abandoned: None,
            affiliation: None,
            population: TimeSeries::new(series.iter().copied()).unwrap(),
        }
    }

    fn influence_at(
        settlement: &Settlement,
        center: Coordinates,
        year: i32,
    ) -> Option<SettlementContribution> {
        settlement_influence(
            settlement,
            center,
            year,
            &InfluenceConfig::default(),
            &EraConfig::default(),
        )
    }

    #[test]
    fn interpolates_population_inside_window() {
        let mission = settlement(Category::Mission, &[(1770, 50.0), (1800, 200.0)]);
        assert_eq!(settlement_population(&mission, 1785), 125.0);
        assert_eq!(settlement_population(&mission, 1769), 0.0);
    }

    #[test]
    fn zero_before_founding_even_with_earlier_records() {
        let mut mission = settlement(Category::Mission, &[(1760, 40.0), (1800, 200.0)]);
        mission.founded = 1780;
        assert_eq!(settlement_population(&mission, 1779), 0.0);
        assert!(settlement_population(&mission, 1780) > 0.0);
    }

    #[test]
    fn nothing_after_abandonment() {
        let mut fort = settlement(Category::Russian, &[(1812, 25.0), (1840, 50.0)]);
        fort.abandoned = Some(1841);
        assert_eq!(settlement_population(&fort, 1841), 50.0);
        assert_eq!(settlement_population(&fort, 1842), 0.0);
        assert!(influence_at(&fort, fort.coords, 1842).is_none());
    }

    #[test]
    fn radius_by_category() {
        let influence = InfluenceConfig::default();
        let radius = |category| effective_radius(&settlement(category, &[]), &influence);
        assert_eq!(radius(Category::Pueblo), 15.0);
        assert_eq!(radius(Category::City), 15.0);
        assert_eq!(radius(Category::Mining), 20.0);
        assert_eq!(radius(Category::Mission), 12.0);
        assert_eq!(radius(Category::Presidio), 12.0);
        assert_eq!(radius(Category::Ranch), 10.0);
    }

    #[test]
    fn scale_factor_at_source() {
        let pueblo = settlement(Category::Pueblo, &[(1770, 900.0)]);
        let contribution = influence_at(&pueblo, pueblo.coords, 1800).unwrap();

        let expected = 900.0 / (PI * 225.0) * 10.0;
        assert!((contribution.density - expected).abs() < 1e-9);
        assert!((contribution.density - 12.732).abs() < 1e-3);
        assert_eq!(contribution.routing, Routing::PriorColonial);
    }

    #[test]
    fn decays_exponentially_and_cuts_off() {
        let mission = settlement(Category::Mission, &[(1770, 500.0)]);
        let at_source = influence_at(&mission, mission.coords, 1800).unwrap().density;

        // One degree of latitude is ~69 miles, well past 2 x 12 miles.
        let far = Coordinates::new(37.6, -121.9);
        assert!(influence_at(&mission, far, 1800).is_none());

        // ~0.1 degree north is ~6.9 miles.
        let near = Coordinates::new(36.7, -121.9);
        let distance = haversine_miles(near, mission.coords);
        let contribution = influence_at(&mission, near, 1800).unwrap().density;
        assert!((contribution - at_source * (-distance / 12.0).exp()).abs() < 1e-9);
    }

    #[test]
    fn american_era_carries_over_thirty_percent() {
        let mission = settlement(Category::Mission, &[(1770, 500.0)]);
        let contribution = influence_at(&mission, mission.coords, 1850).unwrap();

        let mut densities = GroupDensities::default();
        contribution.apply_to(&mut densities);
        assert_eq!(densities.current_power, contribution.density);
        assert!((densities.prior_colonial - contribution.density * 0.3).abs() < 1e-12);
        assert!(densities.total() > contribution.density);
    }

    #[test]
    fn mexican_era_stays_prior_colonial() {
        let mission = settlement(Category::Mission, &[(1770, 500.0)]);
        let contribution = influence_at(&mission, mission.coords, 1830).unwrap();
        assert_eq!(contribution.routing, Routing::PriorColonial);
    }

    #[test]
    fn foreign_settlement_ignores_era() {
        let mut fort = settlement(Category::Russian, &[(1812, 100.0)]);
        fort.affiliation = Some(Affiliation::Russian);
        let contribution = influence_at(&fort, fort.coords, 1850).unwrap();
        assert_eq!(contribution.routing, Routing::PriorColonial);

        fort.affiliation = Some(Affiliation::American);
        let contribution = influence_at(&fort, fort.coords, 1850).unwrap();
        assert!(matches!(contribution.routing, Routing::CurrentWithCarryover { .. }));
    }

    #[test]
    fn empty_series_contributes_nothing() {
        let ranch = settlement(Category::Ranch, &[]);
        assert!(influence_at(&ranch, ranch.coords, 1830).is_none());
    }
}
