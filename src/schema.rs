use crate::error::{LossValuationError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A calendar date exposed as plain fields so presentation layers own formatting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn to_naive_date(self) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).ok_or_else(|| {
            LossValuationError::RangeError(format!(
                "{:04}-{:02}-{:02} is not a calendar date",
                self.year, self.month, self.day
            ))
        })
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForecastRequest {
    #[schemars(
        description = "Observation dates in DD.MM.YYYY format. Must cover at least two distinct calendar years."
    )]
    pub dates: Vec<String>,

    #[schemars(description = "Observed trade or production value for each date, in the same order.")]
    pub values: Vec<f64>,

    #[serde(default)]
    #[schemars(
        description = "Annual discount rate used for present values (e.g. 0.1 for 10%). Must be greater than -1. Defaults to the configured rate."
    )]
    pub discount_rate: Option<f64>,
}

impl ForecastRequest {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ForecastRequest)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct HistoryPoint {
    pub date: CalendarDate,
    pub value: f64,
    #[schemars(description = "True when the year had no observation and the value was interpolated.")]
    pub interpolated: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ModelSummary {
    pub phi: f64,
    pub theta: f64,
    pub sigma2: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ForecastResponse {
    #[schemars(description = "Year-start dates of the forecast years, ascending.")]
    pub forecast_dates: Vec<CalendarDate>,

    pub forecast_values: Vec<f64>,

    #[schemars(description = "Present value of each forecast value, discounted to the base year.")]
    pub dcf_values: Vec<f64>,

    pub total_npv: f64,

    #[serde(default)]
    pub discount_rate: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Annual series the model was fitted against, gap years interpolated.")]
    pub history: Vec<HistoryPoint>,

    #[serde(default)]
    pub model: Option<ModelSummary>,
}

impl ForecastResponse {
    pub fn is_empty(&self) -> bool {
        self.forecast_dates.is_empty() && self.forecast_values.is_empty() && self.dcf_values.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EquipmentInput {
    #[schemars(description = "Machine or tool name (e.g., 'Tractor', 'Combine harvester')")]
    pub name: Option<String>,
    #[schemars(description = "Number of destroyed or damaged units")]
    pub quantity: Option<f64>,
    #[schemars(description = "Price of one unit")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnimalInput {
    #[schemars(description = "Livestock kind (e.g., 'Cows', 'Pigs')")]
    pub name: Option<String>,
    #[schemars(description = "Number of lost animals")]
    pub quantity: Option<f64>,
    #[schemars(description = "Market price of one animal")]
    pub price_per_unit: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TerritoryInput {
    #[schemars(description = "Land parcel description (e.g., 'Arable field near the river')")]
    pub name: Option<String>,
    #[schemars(description = "Damaged area in square metres")]
    pub area_m2: Option<f64>,
    #[schemars(description = "Cost of restoring one square metre")]
    pub repair_price_per_m2: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BuildingInput {
    #[schemars(description = "Building name (e.g., 'Grain storage')")]
    pub name: Option<String>,
    #[schemars(description = "Floor area in square metres, informational only")]
    pub area_m2: Option<f64>,
    #[schemars(description = "Total loss for the building, used as the line total directly")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReportRequest {
    #[serde(default)]
    pub technique: Vec<EquipmentInput>,

    #[serde(default)]
    pub animals: Vec<AnimalInput>,

    #[serde(default)]
    pub territories: Vec<TerritoryInput>,

    #[serde(default)]
    pub buildings: Vec<BuildingInput>,

    #[serde(default)]
    #[schemars(
        description = "Output of the forecast step. May be omitted or carry empty lists when no forecast was made."
    )]
    pub prediction: Option<ForecastResponse>,
}

impl ReportRequest {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportRequest)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
