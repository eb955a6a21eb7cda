use crate::config::{BASE_YEAR, FORECAST_HORIZON};
use crate::damages::{DamageSections, DamageSummary};
use crate::discounting::{present_value, validate_rate, DcfValuation, DiscountedPoint};
use crate::error::{LossValuationError, Result};
use crate::forecasting::{ForecastPoint, ForecastResult};
use crate::schema::ForecastResponse;
use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};

/// Relative tolerance for present values and NPV carried in a prediction
const NPV_TOLERANCE: f64 = 1e-6;

/// Everything the document renderer needs, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Absent when the request carried no prediction
    pub forecast: Option<ForecastResult>,
    pub discounted: Vec<DiscountedPoint>,
    pub total_npv: f64,
    /// Keyed by category; iteration order is Equipment, Animals, Territories, Buildings
    pub damage_sections: DamageSections,
    pub grand_total: f64,
}

pub struct ReportAssembler;

impl ReportAssembler {
    /// Structures the pipeline results into a report. Only reorders; no values
    /// are recomputed.
    pub fn assemble(
        forecast: Option<ForecastResult>,
        valuation: DcfValuation,
        damages: DamageSummary,
    ) -> Report {
        let forecast = forecast.map(|mut f| {
            f.points.sort_by_key(|p| p.date);
            f
        });

        let mut discounted = valuation.points;
        discounted.sort_by_key(|p| p.year);

        debug!(
            "Assembled report: {} forecast point(s), {} damage section(s)",
            forecast.as_ref().map_or(0, |f| f.points.len()),
            damages.sections.len()
        );

        Report {
            forecast,
            discounted,
            total_npv: valuation.total_npv,
            damage_sections: damages.sections,
            grand_total: damages.grand_total,
        }
    }

    /// Rebuilds the forecast and its valuation from a previously returned
    /// forecast response. Empty predictions yield `None`.
    ///
    /// Present values are not recomputed, but each one must agree with
    /// `nominal / (1 + rate)^(year - 2021)` and the NPV with their sum. Without
    /// an explicit rate the rate is recovered from the points themselves;
    /// `default_rate` is used only when no point determines it.
    pub fn prediction_parts(
        prediction: &ForecastResponse,
        default_rate: f64,
    ) -> Result<Option<(ForecastResult, DcfValuation)>> {
        if prediction.is_empty() {
            return Ok(None);
        }

        let n = prediction.forecast_dates.len();
        if prediction.forecast_values.len() != n || prediction.dcf_values.len() != n {
            return Err(LossValuationError::FormatError(format!(
                "Prediction lists differ in length: {} dates, {} values, {} present values",
                n,
                prediction.forecast_values.len(),
                prediction.dcf_values.len()
            )));
        }
        if n != FORECAST_HORIZON {
            return Err(LossValuationError::FormatError(format!(
                "Prediction must cover {} years, got {}",
                FORECAST_HORIZON, n
            )));
        }

        let mut points: Vec<ForecastPoint> = Vec::with_capacity(n);
        let mut present_values = Vec::with_capacity(n);

        for (i, date) in prediction.forecast_dates.iter().enumerate() {
            let date = date.to_naive_date()?;
            let value = prediction.forecast_values[i];
            let pv = prediction.dcf_values[i];

            if !value.is_finite() || !pv.is_finite() {
                return Err(LossValuationError::FormatError(format!(
                    "Prediction for {} is not a finite number",
                    date.year()
                )));
            }

            if let Some(prev) = points.last().map(|p| p.year()) {
                if date.year() != prev + 1 {
                    return Err(LossValuationError::FormatError(format!(
                        "Prediction years must be consecutive and ascending, got {} after {}",
                        date.year(),
                        prev
                    )));
                }
            }

            points.push(ForecastPoint { date, value });
            present_values.push(pv);
        }

        let rate = match prediction.discount_rate {
            Some(rate) => {
                validate_rate(rate)?;
                rate
            }
            None => implied_rate(&points, &present_values)?.unwrap_or_else(|| {
                debug!(
                    "Prediction does not determine its discount rate; using {}",
                    default_rate
                );
                default_rate
            }),
        };

        let mut discounted = Vec::with_capacity(n);
        for (point, &pv) in points.iter().zip(&present_values) {
            let expected = present_value(point.value, rate, point.year())?;
            if !within_tolerance(pv, expected) {
                return Err(LossValuationError::FormatError(format!(
                    "Present value {} for {} does not match {} discounted at {}",
                    pv,
                    point.year(),
                    point.value,
                    rate
                )));
            }
            discounted.push(DiscountedPoint {
                year: point.year(),
                nominal: point.value,
                rate,
                present_value: pv,
            });
        }

        let sum: f64 = present_values.iter().sum();
        if !prediction.total_npv.is_finite() || !within_tolerance(prediction.total_npv, sum) {
            return Err(LossValuationError::FormatError(format!(
                "Prediction total_npv {} does not match the sum of present values {}",
                prediction.total_npv, sum
            )));
        }

        Ok(Some((
            ForecastResult {
                points,
                horizon: FORECAST_HORIZON,
            },
            DcfValuation {
                points: discounted,
                total_npv: prediction.total_npv,
            },
        )))
    }
}

fn within_tolerance(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= NPV_TOLERANCE * expected.abs().max(1.0)
}

/// Solves `pv = nominal / (1 + r)^t` on the first point that pins `r` down:
/// a year other than the base year with non-zero nominal and present value.
fn implied_rate(points: &[ForecastPoint], present_values: &[f64]) -> Result<Option<f64>> {
    let anchor = points
        .iter()
        .zip(present_values)
        .find(|(p, pv)| p.year() != BASE_YEAR && p.value != 0.0 && **pv != 0.0);

    let Some((point, &pv)) = anchor else {
        return Ok(None);
    };

    let ratio = point.value / pv;
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(LossValuationError::FormatError(format!(
            "Present value {} for {} cannot be a discounted {}",
            pv,
            point.year(),
            point.value
        )));
    }

    let rate = ratio.powf(1.0 / f64::from(point.year() - BASE_YEAR)) - 1.0;
    validate_rate(rate)?;
    Ok(Some(rate))
}
