use crate::error::Result;
use crate::schema::ForecastRequest;
use crate::utils::{format_day_month_year, year_start};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trade statistics sections that count as agricultural produce.
pub const AGRICULTURAL_SECTIONS: [u32; 4] = [1, 2, 3, 4];

/// One row of the yearly trade statistics export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRecord {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Section ID")]
    pub section_id: u32,
    #[serde(rename = "Value")]
    pub value: f64,
}

/// Sums the records of the given sections per year and emits a forecast
/// request with one `01.01.YYYY` date per year, ascending.
pub fn convert_records_to_request(
    records: &[HistoricalRecord],
    sections: &[u32],
    discount_rate: Option<f64>,
) -> Result<ForecastRequest> {
    let mut totals: BTreeMap<i32, f64> = BTreeMap::new();

    for record in records.iter().filter(|r| sections.contains(&r.section_id)) {
        *totals.entry(record.year).or_insert(0.0) += record.value;
    }

    let mut dates = Vec::with_capacity(totals.len());
    let mut values = Vec::with_capacity(totals.len());
    for (year, total) in totals {
        dates.push(format_day_month_year(year_start(year)?));
        values.push(total);
    }

    Ok(ForecastRequest {
        dates,
        values,
        discount_rate,
    })
}
