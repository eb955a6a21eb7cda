use farm_loss_valuation::utils::round_to_cents;
use farm_loss_valuation::*;

fn processor() -> LossValuationProcessor {
    LossValuationProcessor::new(PipelineConfig {
        validation: ValidationConfig {
            reference_year: Some(2025),
            ..ValidationConfig::default()
        },
        ..PipelineConfig::default()
    })
}

fn forecast_request(dates: &[&str], values: &[f64], rate: Option<f64>) -> ForecastRequest {
    ForecastRequest {
        dates: dates.iter().map(|s| s.to_string()).collect(),
        values: values.to_vec(),
        discount_rate: rate,
    }
}

fn equipment(name: &str, quantity: f64, price: f64) -> EquipmentInput {
    EquipmentInput {
        name: Some(name.to_string()),
        quantity: Some(quantity),
        price: Some(price),
    }
}

fn animal(name: &str, quantity: f64, price_per_unit: f64) -> AnimalInput {
    AnimalInput {
        name: Some(name.to_string()),
        quantity: Some(quantity),
        price_per_unit: Some(price_per_unit),
    }
}

fn territory(name: &str, area_m2: f64, repair_price_per_m2: f64) -> TerritoryInput {
    TerritoryInput {
        name: Some(name.to_string()),
        area_m2: Some(area_m2),
        repair_price_per_m2: Some(repair_price_per_m2),
    }
}

fn building(name: &str, area_m2: f64, price: f64) -> BuildingInput {
    BuildingInput {
        name: Some(name.to_string()),
        area_m2: Some(area_m2),
        price: Some(price),
    }
}

#[test]
fn test_reference_example() {
    let response = processor()
        .forecast(&forecast_request(
            &["01.01.2019", "01.01.2020", "01.01.2021"],
            &[100.0, 110.0, 121.0],
            Some(0.1),
        ))
        .unwrap();

    let years: Vec<i32> = response.forecast_dates.iter().map(|d| d.year).collect();
    assert_eq!(years, vec![2022, 2023, 2024]);
    for date in &response.forecast_dates {
        assert_eq!((date.month, date.day), (1, 1));
    }

    assert!(response.total_npv.is_finite());
    assert_eq!(response.dcf_values[0], response.forecast_values[0] / 1.1);
}

#[test]
fn test_forecast_always_three_consecutive_years() {
    let cases: Vec<(Vec<&str>, Vec<f64>)> = vec![
        (vec!["01.01.2020", "01.01.2021"], vec![10.0, 12.0]),
        (
            vec!["15.03.2015", "20.08.2017", "01.12.2018", "05.05.2023"],
            vec![500.0, 480.0, 530.0, 610.0],
        ),
        (
            vec!["01.01.2010", "01.06.2010", "01.01.2011", "01.01.2012", "01.01.2013"],
            vec![1.0, 2.0, 7.5, 3.0, 9.0],
        ),
        (
            vec!["31.12.2021", "01.01.2022", "29.02.2024"],
            vec![-40.0, 25.0, 80.0],
        ),
    ];

    for (dates, values) in cases {
        let response = processor()
            .forecast(&forecast_request(&dates, &values, None))
            .unwrap();

        let last_observed = response.history.last().unwrap().date.year;
        let years: Vec<i32> = response.forecast_dates.iter().map(|d| d.year).collect();
        assert_eq!(
            years,
            vec![last_observed + 1, last_observed + 2, last_observed + 3],
            "dates {:?}",
            dates
        );
        assert_eq!(response.forecast_values.len(), 3);
        assert!(response.forecast_values.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_gap_years_show_as_interpolated_history() {
    let response = processor()
        .forecast(&forecast_request(
            &["01.01.2016", "01.01.2019", "01.01.2020"],
            &[100.0, 130.0, 150.0],
            None,
        ))
        .unwrap();

    let flags: Vec<(i32, bool)> = response
        .history
        .iter()
        .map(|h| (h.date.year, h.interpolated))
        .collect();
    assert_eq!(
        flags,
        vec![
            (2016, false),
            (2017, true),
            (2018, true),
            (2019, false),
            (2020, false)
        ]
    );
    assert!((response.history[1].value - 110.0).abs() < 1e-9);
}

#[test]
fn test_forecast_errors_are_tagged() {
    let p = processor();

    let err = p
        .forecast(&forecast_request(&["01.01.2021", "31.02.2022"], &[1.0, 2.0], None))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Range | ErrorKind::Format));

    let err = p
        .forecast(&forecast_request(&["01.01.2021", "05.05.2021"], &[1.0, 2.0], None))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientSpan);

    let err = p
        .forecast(&forecast_request(
            &["01.01.2019", "01.01.2020", "01.01.2021"],
            &[7.0, 7.0, 7.0],
            None,
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelFit);
    assert!(!err.is_client_error());

    let err = p
        .forecast(&forecast_request(&["01.01.2020", "01.01.2021"], &[1.0, 2.0], Some(-1.0)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRate);
}

#[test]
fn test_discounting_is_monotonic_in_rate() {
    let dates = ["01.01.2019", "01.01.2020", "01.01.2021", "01.01.2022"];
    let values = [200.0, 230.0, 250.0, 290.0];

    let mut previous: Option<Vec<f64>> = None;
    for rate in [0.0, 0.05, 0.1, 0.2, 0.5] {
        let response = processor()
            .forecast(&forecast_request(&dates, &values, Some(rate)))
            .unwrap();
        assert!(response.forecast_values.iter().all(|v| *v > 0.0));

        if let Some(prev) = &previous {
            for (lower_rate_pv, pv) in prev.iter().zip(&response.dcf_values) {
                assert!(pv < lower_rate_pv);
            }
        }
        previous = Some(response.dcf_values.clone());
    }
}

#[test]
fn test_use_full_history_switch() {
    let dates = [
        "01.01.2016",
        "01.01.2017",
        "01.01.2018",
        "01.01.2019",
        "01.01.2020",
        "01.01.2021",
        "01.01.2022",
    ];
    let values = [100.0, 98.0, 103.0, 101.0, 104.0, 400.0, 700.0];

    let full = processor()
        .forecast(&forecast_request(&dates, &values, None))
        .unwrap();

    let cutoff = LossValuationProcessor::new(PipelineConfig {
        validation: ValidationConfig {
            reference_year: Some(2025),
            ..ValidationConfig::default()
        },
        forecast: ForecastConfig {
            use_full_history: false,
            cutoff_year: 2021,
        },
        ..PipelineConfig::default()
    })
    .forecast(&forecast_request(&dates, &values, None))
    .unwrap();

    assert_eq!(full.forecast_dates, cutoff.forecast_dates);
    assert_eq!(cutoff.forecast_dates[0].year, 2023);
    // Only the full-history model sees the jump after 2020
    assert!(full.forecast_values[0] > 600.0);
    assert!(cutoff.forecast_values[0] < 200.0);
}

#[test]
fn test_report_sections_and_totals() {
    let request = ReportRequest {
        technique: vec![equipment("Tractor", 2.0, 15_000.0), equipment("Sprayer", 1.0, 3_499.995)],
        animals: vec![],
        territories: vec![territory("Wheat field", 12_500.0, 0.333)],
        buildings: vec![building("Grain storage", 640.0, 250_000.0)],
        prediction: None,
    };

    let report = processor().report(&request).unwrap();

    let sections: Vec<DamageCategory> = report.damage_sections.keys().copied().collect();
    assert_eq!(
        sections,
        vec![
            DamageCategory::Equipment,
            DamageCategory::Territories,
            DamageCategory::Buildings
        ]
    );
    assert!(!report.damage_sections.contains_key(&DamageCategory::Animals));

    let subtotal_sum: f64 = report.damage_sections.values().map(|s| s.subtotal).sum();
    assert_eq!(report.grand_total, subtotal_sum);

    let territory = report
        .damage_sections
        .get(&DamageCategory::Territories)
        .unwrap();
    assert_eq!(territory.items[0].total, 4_162.5);

    let buildings = report
        .damage_sections
        .get(&DamageCategory::Buildings)
        .unwrap();
    assert_eq!(buildings.subtotal, 250_000.0);
}

#[test]
fn test_subtotals_reproduce_from_manual_rounding() {
    let animals = vec![
        animal("Cows", 3.0, 1_333.333),
        animal("Sheep", 7.0, 98.765),
        animal("Hens", 120.0, 4.129),
        animal("Goats", 1.0, 0.005),
    ];
    let request = ReportRequest {
        animals: animals.clone(),
        ..ReportRequest::default()
    };

    let report = processor().report(&request).unwrap();
    let section = report
        .damage_sections
        .get(&DamageCategory::Animals)
        .unwrap();

    let manual: f64 = animals
        .iter()
        .map(|a| round_to_cents(a.quantity.unwrap() * a.price_per_unit.unwrap()))
        .fold(0.0, |acc, line| acc + line);

    assert_eq!(section.subtotal.to_bits(), manual.to_bits());

    // Running the same request again gives identical bits
    let again = processor().report(&request).unwrap();
    assert_eq!(
        again
            .damage_sections
            .get(&DamageCategory::Animals)
            .unwrap()
            .subtotal
            .to_bits(),
        section.subtotal.to_bits()
    );
}

#[test]
fn test_empty_animals_contribute_nothing() {
    let with_animals = ReportRequest {
        technique: vec![equipment("Plough", 1.0, 1_200.0)],
        animals: vec![],
        ..ReportRequest::default()
    };

    let report = processor().report(&with_animals).unwrap();
    assert!(!report.damage_sections.contains_key(&DamageCategory::Animals));
    assert_eq!(report.grand_total, 1_200.0);
}

#[test]
fn test_invalid_item_fails_whole_report() {
    let mut broken = territory("Orchard", 500.0, 2.0);
    broken.area_m2 = None;

    let request = ReportRequest {
        technique: vec![equipment("Tractor", 1.0, 10_000.0)],
        territories: vec![territory("Field", 100.0, 1.0), broken],
        ..ReportRequest::default()
    };

    let err = processor().report(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingField);
    assert!(err.to_string().contains("Territories item #1"));
}

#[test]
fn test_json_round_trip_through_both_requests() {
    let p = processor();

    let forecast_json = r#"{
        "dates": ["01.01.2018", "01.01.2019", "01.01.2020", "01.01.2021"],
        "values": [1000, 1150, 1100, 1300],
        "discount_rate": 0.12
    }"#;
    let forecast_req: ForecastRequest = serde_json::from_str(forecast_json).unwrap();
    let prediction = p.forecast(&forecast_req).unwrap();
    let prediction_json = serde_json::to_value(&prediction).unwrap();

    assert_eq!(prediction_json["forecast_dates"][0]["year"], 2022);
    assert_eq!(prediction_json["forecast_dates"][0]["month"], 1);

    let report_json = serde_json::json!({
        "technique": [{"name": "Combine", "quantity": 1, "price": 85000}],
        "animals": [{"name": "Pigs", "quantity": 40, "price_per_unit": 210.5}],
        "territories": [],
        "buildings": [],
        "prediction": prediction_json,
    });
    let report_req: ReportRequest = serde_json::from_value(report_json).unwrap();
    let report = p.report(&report_req).unwrap();

    assert_eq!(report.total_npv, prediction.total_npv);
    assert_eq!(report.grand_total, 85_000.0 + 8_420.0);
    let years: Vec<i32> = report.discounted.iter().map(|d| d.year).collect();
    assert_eq!(years, vec![2022, 2023, 2024]);
    assert!(report.discounted.iter().all(|d| d.rate == 0.12));

    let rendered = JsonReportRenderer::default().render(&report).unwrap();
    let parsed: Report = serde_json::from_slice(&rendered).unwrap();
    assert_eq!(parsed.damage_sections.len(), 2);
}

#[test]
fn test_frontend_empty_prediction() {
    let json = r#"{
        "technique": [],
        "animals": [],
        "territories": [],
        "buildings": [{"name": "Barn", "area_m2": 200, "price": 40000}],
        "prediction": {"forecast_dates": [], "forecast_values": [], "dcf_values": [], "total_npv": 0}
    }"#;
    let request: ReportRequest = serde_json::from_str(json).unwrap();
    let report = processor().report(&request).unwrap();

    assert!(report.forecast.is_none());
    assert_eq!(report.total_npv, 0.0);
    assert_eq!(report.grand_total, 40_000.0);
}

#[test]
fn test_concurrent_requests_are_independent() {
    let requests: Vec<ForecastRequest> = (0..8)
        .map(|i| {
            let base = 100.0 + i as f64 * 10.0;
            forecast_request(
                &["01.01.2017", "01.01.2018", "01.01.2019", "01.01.2020"],
                &[base, base * 1.2, base * 0.9, base * 1.5],
                Some(0.05 * i as f64),
            )
        })
        .collect();

    let sequential: Vec<ForecastResponse> = requests
        .iter()
        .map(|r| processor().forecast(r).unwrap())
        .collect();

    let instance = processor();
    let shared = &instance;
    let parallel: Vec<ForecastResponse> = std::thread::scope(|scope| {
        let handles: Vec<_> = requests
            .iter()
            .map(|r| scope.spawn(move || shared.forecast(r).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, parallel);
}

#[test]
fn test_ingestion_from_csv_export() {
    let data = "\
Year,Section ID,Value
2019,1,1200.5
2019,2,300.0
2019,9,99999.0
2020,1,1300.0
2020,4,250.25
2021,3,1700.0
";

    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let records: Vec<HistoricalRecord> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 6);

    let request = convert_records_to_request(&records, &AGRICULTURAL_SECTIONS, Some(0.1)).unwrap();
    assert_eq!(request.dates, vec!["01.01.2019", "01.01.2020", "01.01.2021"]);
    assert_eq!(request.values, vec![1500.5, 1550.25, 1700.0]);

    let response = processor().forecast(&request).unwrap();
    assert_eq!(response.forecast_dates[0].year, 2022);
}
