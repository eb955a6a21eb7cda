use farm_loss_valuation::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let processor = LossValuationProcessor::default();

    let prediction = processor.forecast(&ForecastRequest {
        dates: vec![
            "01.01.2018".to_string(),
            "01.01.2019".to_string(),
            "01.07.2020".to_string(),
            "01.01.2021".to_string(),
        ],
        values: vec![820_000.0, 905_500.0, 870_000.0, 960_250.0],
        discount_rate: Some(0.1),
    })?;

    println!("Forecast:");
    for ((date, value), pv) in prediction
        .forecast_dates
        .iter()
        .zip(&prediction.forecast_values)
        .zip(&prediction.dcf_values)
    {
        println!(
            "  {:02}.{:02}.{:04}  {:>14.2}  PV {:>14.2}",
            date.day, date.month, date.year, value, pv
        );
    }
    println!("  NPV {:.2}", prediction.total_npv);

    let report = processor.report(&ReportRequest {
        technique: vec![EquipmentInput {
            name: Some("Tractor".to_string()),
            quantity: Some(2.0),
            price: Some(35_000.0),
        }],
        animals: vec![AnimalInput {
            name: Some("Dairy cows".to_string()),
            quantity: Some(14.0),
            price_per_unit: Some(1_850.75),
        }],
        territories: vec![TerritoryInput {
            name: Some("Winter wheat field".to_string()),
            area_m2: Some(48_000.0),
            repair_price_per_m2: Some(0.42),
        }],
        buildings: vec![BuildingInput {
            name: Some("Machine shed".to_string()),
            area_m2: Some(360.0),
            price: Some(120_000.0),
        }],
        prediction: Some(prediction),
    })?;

    println!("\nDamages:");
    for section in report.damage_sections.values() {
        println!("  {:<12} {:>14.2}", section.category, section.subtotal);
    }
    println!("  {:<12} {:>14.2}", "Total", report.grand_total);

    let rendered = JsonReportRenderer::pretty().render(&report)?;
    println!("\n{}", String::from_utf8(rendered)?);

    Ok(())
}
