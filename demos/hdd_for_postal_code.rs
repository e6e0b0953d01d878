//! Prints daily heating degree days for a postal code.
//!
//! cargo run --example hdd_for_postal_code -- 10115 15 2024-01

use heizgradtage::{DatePeriod, DateRange, HddError, HeatingDegreeDays, Month};
use std::env;

#[tokio::main]
async fn main() -> Result<(), HddError> {
    let mut args = env::args().skip(1);
    let postal_code = args.next().unwrap_or_else(|| "10115".to_string());
    let base_temperature: f64 = args
        .next()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(15.0);
    // Optional `YYYY-MM`; the last 365 days otherwise.
    let period: Option<DateRange> = args.next().and_then(|raw| {
        let (year, month) = raw.split_once('-')?;
        Month::new(month.parse().ok()?, year.parse().ok()?).get_date_period()
    });

    let client = HeatingDegreeDays::new()?;
    let series = client
        .compute_hdd()
        .postal_code(&postal_code)
        .base_temperature(base_temperature)
        .maybe_period(period)
        .call()
        .await?;

    println!(
        "{} -> station {} {} ({:.1} km away){}",
        series.postal_code,
        series.station.id,
        series.station.name,
        series.distance_km,
        if series.catalog_stale { " [stale catalog]" } else { "" }
    );
    for record in &series.records {
        match record.hdd {
            Some(hdd) => println!("{}  {:>5.1}", record.date, hdd),
            None => println!("{}      -", record.date),
        }
    }
    println!(
        "Total {:.1} HDD (base {} °C) over {} days, {} missing",
        series.total(),
        series.base_temperature,
        series.present_days(),
        series.missing_days()
    );
    Ok(())
}
