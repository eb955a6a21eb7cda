use crate::config::BASE_YEAR;
use crate::error::{LossValuationError, Result};
use crate::forecasting::ForecastPoint;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountedPoint {
    pub year: i32,
    pub nominal: f64,
    pub rate: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfValuation {
    pub points: Vec<DiscountedPoint>,
    pub total_npv: f64,
}

pub fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate <= -1.0 {
        return Err(LossValuationError::InvalidRateError(rate));
    }
    Ok(())
}

/// `nominal / (1 + rate)^(year - BASE_YEAR)`. Years before the base year get a
/// negative exponent and are compounded up rather than discounted.
pub fn present_value(nominal: f64, rate: f64, year: i32) -> Result<f64> {
    validate_rate(rate)?;
    Ok(nominal / (1.0 + rate).powi(year - BASE_YEAR))
}

pub struct Discounter {
    rate: f64,
}

impl Discounter {
    pub fn new(rate: f64) -> Result<Self> {
        validate_rate(rate)?;
        Ok(Self { rate })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn discount_values(&self, values: &[(i32, f64)]) -> DcfValuation {
        let factor = 1.0 + self.rate;

        let points: Vec<DiscountedPoint> = values
            .iter()
            .map(|&(year, nominal)| DiscountedPoint {
                year,
                nominal,
                rate: self.rate,
                present_value: nominal / factor.powi(year - BASE_YEAR),
            })
            .collect();

        let total_npv = points.iter().map(|p| p.present_value).sum();

        debug!(
            "Discounted {} points at rate {} to NPV {:.2}",
            points.len(),
            self.rate,
            total_npv
        );

        DcfValuation { points, total_npv }
    }

    pub fn discount(&self, forecast: &[ForecastPoint]) -> DcfValuation {
        let values: Vec<(i32, f64)> = forecast.iter().map(|p| (p.year(), p.value)).collect();
        self.discount_values(&values)
    }
}
