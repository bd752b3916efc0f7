//! Sparse year-indexed series and their interpolation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetError;

/// Behaviour for years earlier than the first recorded point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampPolicy {
    /// Settlement populations: nothing exists before the first record.
    ZeroBefore,
    /// Regional densities: hold the first recorded value.
    HoldFirst,
}

/// Ordered `year -> value` points, strictly increasing years, values >= 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<i32, f64>", into = "BTreeMap<i32, f64>")]
pub struct TimeSeries {
    points: Vec<(i32, f64)>,
}

impl TimeSeries {
    pub fn new(points: impl IntoIterator<Item = (i32, f64)>) -> Result<Self, DatasetError> {
        let mut points: Vec<(i32, f64)> = points.into_iter().collect();
        points.sort_by_key(|(year, _)| *year);
        for window in points.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(DatasetError::Validation(format!(
                    "year {} recorded more than once",
                    window[0].0
                )));
            }
        }
        if let Some((year, value)) = points
            .iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(DatasetError::Validation(format!(
                "value {value} for year {year} must be finite and non-negative"
            )));
        }
        Ok(Self { points })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.points.first().map(|(year, _)| *year)
    }

    pub fn last_year(&self) -> Option<i32> {
        self.points.last().map(|(year, _)| *year)
    }

    pub fn points(&self) -> &[(i32, f64)] {
        &self.points
    }

    /// Continuous estimate for `year`. Empty series yield 0 for every year.
    pub fn interpolate(&self, year: i32, policy: ClampPolicy) -> f64 {
        let (Some(&(first_year, first_value)), Some(&(last_year, last_value))) =
            (self.points.first(), self.points.last())
        else {
            return 0.0;
        };

        if year < first_year {
            return match policy {
                ClampPolicy::ZeroBefore => 0.0,
                ClampPolicy::HoldFirst => first_value,
            };
        }
        if year >= last_year {
            return last_value;
        }

        // first_year <= year < last_year, so exactly one bracket matches.
        let upper = self.points.partition_point(|(y, _)| *y <= year);
        let (y0, v0) = self.points[upper - 1];
        let (y1, v1) = self.points[upper];
        let ratio = f64::from(year - y0) / f64::from(y1 - y0);
        v0 + (v1 - v0) * ratio
    }
}

impl TryFrom<BTreeMap<i32, f64>> for TimeSeries {
    type Error = DatasetError;

    fn try_from(value: BTreeMap<i32, f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TimeSeries> for BTreeMap<i32, f64> {
    fn from(value: TimeSeries) -> Self {
        value.points.into_iter().collect()
    }
}
