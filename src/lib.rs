//! # Farm Loss Valuation
//!
//! Estimates the economic loss of an agricultural enterprise from a short annual
//! history of trade/production value and an itemized damage inventory.
//!
//! ## Pipeline
//!
//! - **Validation**: `DD.MM.YYYY` dates and values become one slot per calendar year
//! - **Forecasting**: an ARIMA(1,1,1) model projects the 3 years after the last observation
//! - **Discounting**: each forecast value is discounted to the 2021 base year
//! - **Damages**: equipment, animals, territories and buildings are totalled per section
//! - **Report**: forecast, present values and damage sections in one payload
//!
//! Every call is self-contained: nothing is cached between requests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use farm_loss_valuation::*;
//!
//! let request = ForecastRequest {
//!     dates: vec!["01.01.2019".into(), "01.01.2020".into(), "01.01.2021".into()],
//!     values: vec![100.0, 110.0, 121.0],
//!     discount_rate: Some(0.1),
//! };
//!
//! let prediction = process_forecast_request(&request).unwrap();
//! assert_eq!(prediction.forecast_dates.len(), 3);
//!
//! let report = process_report_request(&ReportRequest {
//!     prediction: Some(prediction),
//!     ..ReportRequest::default()
//! })
//! .unwrap();
//! ```

pub mod config;
pub mod damages;
pub mod discounting;
pub mod error;
pub mod forecasting;
pub mod ingestion;
pub mod render;
pub mod report;
pub mod schema;
pub mod utils;
pub mod validation;

pub use config::{
    AnnualAggregation, DiscountConfig, ForecastConfig, PipelineConfig, ValidationConfig,
    BASE_YEAR, DEFAULT_DISCOUNT_RATE, FORECAST_HORIZON,
};
pub use damages::{
    DamageAggregator, DamageCategory, DamageItem, DamageLine, DamageSection, DamageSections,
    DamageSummary,
};
pub use discounting::{present_value, DcfValuation, DiscountedPoint, Discounter};
pub use error::{ErrorKind, LossValuationError, Result};
pub use forecasting::{ArimaFit, ForecastOutcome, ForecastPoint, ForecastResult, Forecaster};
pub use ingestion::{convert_records_to_request, HistoricalRecord, AGRICULTURAL_SECTIONS};
pub use render::{JsonReportRenderer, ReportRenderer};
pub use report::{Report, ReportAssembler};
pub use schema::*;
pub use validation::{DateSeriesValidator, TimeSeriesPoint, ValidatedSeries};

use log::{debug, info};

/// Forecast-stage results before they are flattened into a response.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub series: ValidatedSeries,
    pub outcome: ForecastOutcome,
    pub valuation: DcfValuation,
}

pub struct LossValuationProcessor {
    config: PipelineConfig,
}

impl Default for LossValuationProcessor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl LossValuationProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run_forecast(&self, request: &ForecastRequest) -> Result<ForecastRun> {
        let rate = request
            .discount_rate
            .unwrap_or(self.config.discount.default_rate);
        // Reject a bad rate before spending time on the fit
        let discounter = Discounter::new(rate)?;

        info!(
            "Forecasting from {} observation(s) at discount rate {}",
            request.dates.len(),
            rate
        );

        let series = DateSeriesValidator::new(self.config.validation.clone())
            .validate(&request.dates, &request.values)?;
        let outcome = Forecaster::new(self.config.forecast.clone()).forecast(&series)?;
        let valuation = discounter.discount(&outcome.forecast.points);

        debug!(
            "Forecast {}..={} with NPV {:.2}",
            series.last_year() + 1,
            series.last_year() + outcome.forecast.horizon as i32,
            valuation.total_npv
        );

        Ok(ForecastRun {
            series,
            outcome,
            valuation,
        })
    }

    pub fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse> {
        let run = self.run_forecast(request)?;
        Ok(forecast_response(&run))
    }

    /// Builds the full report. Any invalid damage item or prediction fails the
    /// whole request; no partial report is produced.
    pub fn report(&self, request: &ReportRequest) -> Result<Report> {
        info!(
            "Building report: {} equipment, {} animal, {} territory, {} building item(s)",
            request.technique.len(),
            request.animals.len(),
            request.territories.len(),
            request.buildings.len()
        );

        let items = DamageAggregator::items_from_request(request)?;
        let damages = DamageAggregator::aggregate(&items)?;

        let prediction = match &request.prediction {
            Some(prediction) => ReportAssembler::prediction_parts(
                prediction,
                self.config.discount.default_rate,
            )?,
            None => None,
        };

        let (forecast, valuation) = match prediction {
            Some((forecast, valuation)) => (Some(forecast), valuation),
            None => (
                None,
                DcfValuation {
                    points: Vec::new(),
                    total_npv: 0.0,
                },
            ),
        };

        Ok(ReportAssembler::assemble(forecast, valuation, damages))
    }
}

fn forecast_response(run: &ForecastRun) -> ForecastResponse {
    let points = &run.outcome.forecast.points;

    ForecastResponse {
        forecast_dates: points.iter().map(|p| CalendarDate::from(p.date)).collect(),
        forecast_values: points.iter().map(|p| p.value).collect(),
        dcf_values: run
            .valuation
            .points
            .iter()
            .map(|p| p.present_value)
            .collect(),
        total_npv: run.valuation.total_npv,
        discount_rate: run.valuation.points.first().map(|p| p.rate),
        history: run
            .outcome
            .history
            .iter()
            .map(|h| HistoryPoint {
                date: h.date.into(),
                value: h.value,
                interpolated: h.interpolated,
            })
            .collect(),
        model: Some(ModelSummary {
            phi: run.outcome.model.phi,
            theta: run.outcome.model.theta,
            sigma2: run.outcome.model.sigma2,
        }),
    }
}

pub fn process_forecast_request(request: &ForecastRequest) -> Result<ForecastResponse> {
    LossValuationProcessor::default().forecast(request)
}

pub fn process_report_request(request: &ReportRequest) -> Result<Report> {
    LossValuationProcessor::default().report(request)
}
