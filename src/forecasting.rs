//! ARIMA(1,1,1) forecasting over annual series.
//!
//! The model works on first differences `y_t = x_t - x_{t-1}`:
//!
//! ```text
//! y_t = phi * y_{t-1} + theta * e_{t-1} + e_t
//! ```
//!
//! Parameters are estimated by conditional sum of squares (CSS) with the
//! pre-sample difference and residual set to zero, so every difference
//! contributes to the objective. Both parameters live in `[-0.99, 0.99]`.
//! Estimation is a fixed grid scan followed by a pattern search; nothing is
//! randomized, so the same series always yields the same forecast.

use crate::config::{ForecastConfig, FORECAST_HORIZON};
use crate::error::{LossValuationError, Result};
use crate::utils::year_start;
use crate::validation::ValidatedSeries;
use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use splines::{Interpolation, Key, Spline};

const PARAM_BOUND: f64 = 0.99;
const GRID_STEPS: i32 = 99;
/// Weight of the `phi^2 + theta^2` penalty relative to the mean squared
/// difference. Only decides between parameter pairs with equal CSS.
const RIDGE_WEIGHT: f64 = 1e-6;
const REFINE_START_STEP: f64 = 0.005;
const REFINE_MIN_STEP: f64 = 1e-7;
const REFINE_MAX_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub interpolated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl ForecastPoint {
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Ascending, consecutive years starting right after the last observed year
    pub points: Vec<ForecastPoint>,
    pub horizon: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub forecast: ForecastResult,
    pub model: ArimaFit,
    /// Annual series after gap filling, including years excluded from training
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArimaFit {
    pub phi: f64,
    pub theta: f64,
    /// CSS divided by the number of differences
    pub sigma2: f64,
    pub css: f64,
    pub n_obs: usize,
    last_level: f64,
    last_diff: f64,
    last_residual: f64,
}

impl ArimaFit {
    /// Fits the model to a level series (not yet differenced).
    pub fn fit(levels: &[f64]) -> Result<Self> {
        if levels.len() < 2 {
            return Err(LossValuationError::ModelFitError(format!(
                "Series is too short to difference: {} point(s), at least 2 required",
                levels.len()
            )));
        }

        if levels.iter().any(|x| !x.is_finite()) {
            return Err(LossValuationError::ModelFitError(
                "Series contains NaN or infinite values".to_string(),
            ));
        }

        let diffs: Vec<f64> = levels.windows(2).map(|w| w[1] - w[0]).collect();
        if diffs.iter().any(|d| !d.is_finite()) {
            return Err(LossValuationError::ModelFitError(
                "Differenced series overflows".to_string(),
            ));
        }

        let max_abs = diffs.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
        if max_abs == 0.0 {
            return Err(LossValuationError::ModelFitError(
                "Series is constant; the differenced series has no variance to estimate from"
                    .to_string(),
            ));
        }

        // Estimate on unit-scale differences so squares cannot overflow. A power
        // of two keeps the scaling exact.
        let scale = 2.0_f64.powi((max_abs.log2().floor() as i32).clamp(-1000, 1000));
        let scaled: Vec<f64> = diffs.iter().map(|d| d / scale).collect();
        let mean_square = scaled.iter().map(|d| d * d).sum::<f64>() / scaled.len() as f64;

        let ridge = RIDGE_WEIGHT * mean_square;
        let (phi, theta) = estimate_parameters(&scaled, ridge);

        let scaled_residuals = residuals(&scaled, phi, theta);
        let scaled_css: f64 = scaled_residuals.iter().map(|e| e * e).sum();

        if !scaled_css.is_finite() || !phi.is_finite() || !theta.is_finite() {
            return Err(LossValuationError::ModelFitError(
                "Estimation did not converge to finite parameters".to_string(),
            ));
        }

        let css = scaled_css * scale * scale;
        let css = if css.is_finite() {
            css
        } else {
            warn!("Residual sum of squares exceeds the f64 range; reporting f64::MAX");
            f64::MAX
        };
        let sigma2 = css / diffs.len() as f64;
        let last_residual = scaled_residuals[scaled_residuals.len() - 1] * scale;

        if phi.abs() >= PARAM_BOUND || theta.abs() >= PARAM_BOUND {
            warn!(
                "ARIMA parameters reached the stationarity bound (phi={:.4}, theta={:.4})",
                phi, theta
            );
        }

        Ok(Self {
            phi,
            theta,
            sigma2,
            css,
            n_obs: diffs.len(),
            last_level: levels[levels.len() - 1],
            last_diff: diffs[diffs.len() - 1],
            last_residual,
        })
    }

    /// Level forecasts for the next `steps` periods. Future shocks are zero.
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>> {
        let mut level = self.last_level;
        let mut prev_diff = self.last_diff;
        let mut prev_residual = self.last_residual;
        let mut result = Vec::with_capacity(steps);

        for _ in 0..steps {
            let diff = self.phi * prev_diff + self.theta * prev_residual;
            level += diff;
            result.push(level);
            prev_diff = diff;
            prev_residual = 0.0;
        }

        if result.iter().any(|v| !v.is_finite()) {
            return Err(LossValuationError::ModelFitError(
                "Forecast produced non-finite values".to_string(),
            ));
        }

        Ok(result)
    }
}

fn residuals(diffs: &[f64], phi: f64, theta: f64) -> Vec<f64> {
    let mut prev_diff = 0.0;
    let mut prev_residual = 0.0;

    diffs
        .iter()
        .map(|&y| {
            let e = y - phi * prev_diff - theta * prev_residual;
            prev_diff = y;
            prev_residual = e;
            e
        })
        .collect()
}

fn objective(diffs: &[f64], phi: f64, theta: f64, ridge: f64) -> f64 {
    let css: f64 = residuals(diffs, phi, theta).iter().map(|e| e * e).sum();
    css + ridge * (phi * phi + theta * theta)
}

fn estimate_parameters(diffs: &[f64], ridge: f64) -> (f64, f64) {
    let grid_value = |i: i32| i as f64 / (GRID_STEPS as f64 + 1.0);

    let mut best = (0.0, 0.0);
    let mut best_score = objective(diffs, 0.0, 0.0, ridge);

    for i in -GRID_STEPS..=GRID_STEPS {
        for j in -GRID_STEPS..=GRID_STEPS {
            let (phi, theta) = (grid_value(i), grid_value(j));
            let score = objective(diffs, phi, theta, ridge);
            if score < best_score {
                best = (phi, theta);
                best_score = score;
            }
        }
    }

    let mut step = REFINE_START_STEP;
    let mut iterations = 0;
    while step > REFINE_MIN_STEP && iterations < REFINE_MAX_ITERATIONS {
        iterations += 1;

        let candidates = [
            (best.0 + step, best.1),
            (best.0 - step, best.1),
            (best.0, best.1 + step),
            (best.0, best.1 - step),
        ];

        let mut improved = false;
        for (phi, theta) in candidates {
            let phi = phi.clamp(-PARAM_BOUND, PARAM_BOUND);
            let theta = theta.clamp(-PARAM_BOUND, PARAM_BOUND);
            let score = objective(diffs, phi, theta, ridge);
            if score < best_score {
                best = (phi, theta);
                best_score = score;
                improved = true;
                break;
            }
        }

        if !improved {
            step /= 2.0;
        }
    }

    debug!(
        "CSS estimation finished after {} refinement steps: phi={:.6}, theta={:.6}, objective={:.6}",
        iterations, best.0, best.1, best_score
    );

    best
}

/// Fills years without observations by linear interpolation between the
/// observed neighbours. The series always starts and ends on an observed year.
pub fn fill_missing_years(series: &ValidatedSeries) -> Result<Vec<HistoryPoint>> {
    let keys: Vec<Key<f64, f64>> = series
        .observed()
        .into_iter()
        .map(|(year, value)| Key::new(year as f64, value, Interpolation::Linear))
        .collect();

    let spline = Spline::from_vec(keys);

    series
        .slots()
        .iter()
        .map(|(date, slot)| match slot.value {
            Some(value) => Ok(HistoryPoint {
                date: *date,
                value,
                interpolated: false,
            }),
            None => {
                let value = spline.clamped_sample(date.year() as f64).ok_or_else(|| {
                    LossValuationError::ModelFitError(format!(
                        "Could not interpolate a value for {}",
                        date.year()
                    ))
                })?;
                Ok(HistoryPoint {
                    date: *date,
                    value,
                    interpolated: true,
                })
            }
        })
        .collect()
}

pub struct Forecaster {
    config: ForecastConfig,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn forecast(&self, series: &ValidatedSeries) -> Result<ForecastOutcome> {
        let history = fill_missing_years(series)?;

        let training: Vec<&HistoryPoint> = if self.config.use_full_history {
            history.iter().collect()
        } else {
            history
                .iter()
                .filter(|p| p.date.year() < self.config.cutoff_year)
                .collect()
        };

        let last_training_year = match training.last() {
            Some(point) if training.len() >= 2 => point.date.year(),
            _ => {
                return Err(LossValuationError::ModelFitError(format!(
                    "Training window has {} annual point(s); at least 2 are required{}",
                    training.len(),
                    if self.config.use_full_history {
                        String::new()
                    } else {
                        format!(" before {}", self.config.cutoff_year)
                    }
                )))
            }
        };

        if !self.config.use_full_history {
            info!(
                "Training on {}..={} only; cutoff year {}",
                series.first_year(),
                last_training_year,
                self.config.cutoff_year
            );
        }

        let levels: Vec<f64> = training.iter().map(|p| p.value).collect();
        let model = ArimaFit::fit(&levels)?;

        debug!(
            "Fitted ARIMA(1,1,1) on {} differences: phi={:.4}, theta={:.4}, sigma2={:.4}",
            model.n_obs, model.phi, model.theta, model.sigma2
        );

        // Years between the end of training and the last observation are
        // forecast too, then dropped, so output always follows the last year.
        let skipped = (series.last_year() - last_training_year) as usize;
        let raw = model.forecast(skipped + FORECAST_HORIZON)?;

        let points = raw
            .into_iter()
            .skip(skipped)
            .enumerate()
            .map(|(i, value)| {
                Ok(ForecastPoint {
                    date: year_start(series.last_year() + 1 + i as i32)?,
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ForecastOutcome {
            forecast: ForecastResult {
                points,
                horizon: FORECAST_HORIZON,
            },
            model,
            history,
        })
    }
}
