use crate::config::{AnnualAggregation, ValidationConfig};
use crate::error::{LossValuationError, Result};
use crate::utils::{current_year, parse_day_month_year, year_start};
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataOrigin {
    /// Exactly one input point fell inside the year
    Observed,
    /// Several input points were collapsed into the annual value
    Aggregated { count: usize },
    /// No input point for the year; left for the forecaster to fill
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSlot {
    pub value: Option<f64>,
    pub origin: DataOrigin,
}

/// Year-start keyed slots, one per calendar year, contiguous from the first to
/// the last observed year.
pub type AnnualSeries = BTreeMap<NaiveDate, AnnualSlot>;

/// Only built by [`DateSeriesValidator`]; no public constructor or
/// `Deserialize`, so its slot invariants always hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedSeries {
    slots: AnnualSeries,
    first_year: i32,
    last_year: i32,
}

impl ValidatedSeries {
    pub fn slots(&self) -> &AnnualSeries {
        &self.slots
    }

    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    /// Last year that carried an observation.
    pub fn last_year(&self) -> i32 {
        self.last_year
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn missing_years(&self) -> Vec<i32> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.value.is_none())
            .map(|(date, _)| date.year())
            .collect()
    }

    /// (year, value) for every observed year, ascending.
    pub fn observed(&self) -> Vec<(i32, f64)> {
        self.slots
            .iter()
            .filter_map(|(date, slot)| slot.value.map(|v| (date.year(), v)))
            .collect()
    }
}

pub struct DateSeriesValidator {
    config: ValidationConfig,
}

impl DateSeriesValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    fn max_year(&self) -> i32 {
        self.config.reference_year.unwrap_or_else(current_year) + self.config.max_years_ahead
    }

    /// Parses `DD.MM.YYYY` strings paired with values and hands them to
    /// [`DateSeriesValidator::validate_points`].
    pub fn validate(&self, dates: &[String], values: &[f64]) -> Result<ValidatedSeries> {
        if dates.len() != values.len() {
            return Err(LossValuationError::FormatError(format!(
                "Got {} dates but {} values; both lists must have the same length",
                dates.len(),
                values.len()
            )));
        }

        if dates.len() < 2 {
            return Err(LossValuationError::InsufficientSpanError(format!(
                "At least two observations in two distinct years are required, got {}",
                dates.len()
            )));
        }

        let points = dates
            .iter()
            .zip(values)
            .map(|(raw, &value)| {
                let date = parse_day_month_year(raw)?;
                Ok(TimeSeriesPoint { date, value })
            })
            .collect::<Result<Vec<_>>>()?;

        self.validate_points(points)
    }

    pub fn validate_points(&self, mut points: Vec<TimeSeriesPoint>) -> Result<ValidatedSeries> {
        let max_year = self.max_year();

        for point in &points {
            if !point.value.is_finite() {
                return Err(LossValuationError::FormatError(format!(
                    "Value for {} is not a finite number",
                    point.date
                )));
            }

            let year = point.date.year();
            if year < self.config.min_year || year > max_year {
                return Err(LossValuationError::RangeError(format!(
                    "Year {} of {} is outside [{}, {}]",
                    year, point.date, self.config.min_year, max_year
                )));
            }
        }

        points.sort_by_key(|p| p.date);

        if let Some(pair) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(LossValuationError::FormatError(format!(
                "Date {} appears more than once",
                pair[0].date
            )));
        }

        let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        for point in &points {
            by_year.entry(point.date.year()).or_default().push(point.value);
        }

        let (first_year, last_year) = match (by_year.keys().next(), by_year.keys().next_back()) {
            (Some(&first), Some(&last)) if first != last => (first, last),
            _ => {
                return Err(LossValuationError::InsufficientSpanError(
                    "All dates fall within a single calendar year; at least two are required"
                        .to_string(),
                ))
            }
        };

        let mut slots = AnnualSeries::new();
        for year in first_year..=last_year {
            let slot = match by_year.get(&year) {
                Some(values) => AnnualSlot {
                    value: Some(self.aggregate(values)),
                    origin: if values.len() == 1 {
                        DataOrigin::Observed
                    } else {
                        DataOrigin::Aggregated {
                            count: values.len(),
                        }
                    },
                },
                None => AnnualSlot {
                    value: None,
                    origin: DataOrigin::Missing,
                },
            };
            slots.insert(year_start(year)?, slot);
        }

        let series = ValidatedSeries {
            slots,
            first_year,
            last_year,
        };

        let missing = series.missing_years();
        if !missing.is_empty() {
            warn!("Series has no observations for years {:?}", missing);
        }
        debug!(
            "Validated {} points into {} annual slots ({}..={})",
            points.len(),
            series.len(),
            first_year,
            last_year
        );

        Ok(series)
    }

    fn aggregate(&self, values: &[f64]) -> f64 {
        match self.config.aggregation {
            AnnualAggregation::Sum => values.iter().sum(),
            AnnualAggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            AnnualAggregation::Last => values.last().copied().unwrap_or_default(),
        }
    }
}
