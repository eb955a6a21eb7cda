use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reference year every discounting offset is measured from.
pub const BASE_YEAR: i32 = 2021;

/// Number of annual points every forecast produces.
pub const FORECAST_HORIZON: usize = 3;

pub const DEFAULT_DISCOUNT_RATE: f64 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AnnualAggregation {
    #[default]
    #[schemars(description = "Add up every value that falls inside the calendar year.")]
    Sum,

    #[schemars(description = "Average the values that fall inside the calendar year.")]
    Mean,

    #[schemars(description = "Keep only the latest-dated value of the calendar year.")]
    Last,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ValidationConfig {
    #[schemars(description = "Earliest calendar year accepted in the input series.")]
    pub min_year: i32,

    #[schemars(description = "How many years past the reference year an input date may lie.")]
    pub max_years_ahead: i32,

    #[schemars(
        description = "Year treated as 'now' for the upper bound. When absent the current UTC year is used."
    )]
    pub reference_year: Option<i32>,

    #[schemars(description = "How several values inside one calendar year collapse to one annual value.")]
    pub aggregation: AnnualAggregation,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_year: 2000,
            max_years_ahead: 5,
            reference_year: None,
            aggregation: AnnualAggregation::Sum,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ForecastConfig {
    #[schemars(
        description = "Train on the whole observed series. When false only years before cutoff_year are used for fitting."
    )]
    pub use_full_history: bool,

    #[schemars(description = "First year excluded from training when use_full_history is false.")]
    pub cutoff_year: i32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            use_full_history: true,
            cutoff_year: BASE_YEAR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct DiscountConfig {
    #[schemars(description = "Rate applied when a forecast request does not carry its own discount_rate.")]
    pub default_rate: f64,
}

impl Default for DiscountConfig {
    fn default() -> Self {
        Self {
            default_rate: DEFAULT_DISCOUNT_RATE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    pub validation: ValidationConfig,
    pub forecast: ForecastConfig,
    pub discount: DiscountConfig,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
