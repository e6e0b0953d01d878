//! Heating degree days from daily mean temperatures.

use crate::error::InvalidInput;
use crate::types::observation::{HddRecord, TemperatureObservation};

/// Maps every observation to `max(0, base_temperature - tmk)`.
///
/// Days without a TMK value stay absent; they are never counted as zero.
///
/// # Errors
///
/// [`InvalidInput::BaseTemperature`] when `base_temperature` is NaN or
/// infinite.
///
/// # Examples
///
/// ```
/// use heizgradtage::{heating_degree_days, TemperatureObservation};
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let observations = [TemperatureObservation { date: day, station_id: "00433".into(), tmk: Some(3.2) }];
/// let records = heating_degree_days(&observations, 15.0).unwrap();
/// assert!((records[0].hdd.unwrap() - 11.8).abs() < 1e-9);
/// ```
pub fn heating_degree_days(
    observations: &[TemperatureObservation],
    base_temperature: f64,
) -> Result<Vec<HddRecord>, InvalidInput> {
    if !base_temperature.is_finite() {
        return Err(InvalidInput::BaseTemperature(base_temperature));
    }
    Ok(observations
        .iter()
        .map(|observation| HddRecord {
            date: observation.date,
            hdd: observation
                .tmk
                .map(|tmk| (base_temperature - tmk).max(0.0)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn observation(day: u32, tmk: Option<f64>) -> TemperatureObservation {
        TemperatureObservation {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            station_id: "00433".to_string(),
            tmk,
        }
    }

    #[test]
    fn test_cold_day() {
        let records = heating_degree_days(&[observation(1, Some(3.2))], 15.0).unwrap();
        assert!((records[0].hdd.unwrap() - 11.8).abs() < 1e-9);
    }

    #[test]
    fn test_never_negative() {
        let observations: Vec<_> = (1..=31)
            .map(|day| observation(day, Some(day as f64 - 10.0)))
            .collect();
        let records = heating_degree_days(&observations, 15.0).unwrap();
        assert!(records.iter().all(|r| r.hdd.unwrap() >= 0.0));
        assert_eq!(records[30].hdd, Some(0.0));
    }

    #[test]
    fn test_absent_stays_absent() {
        let records =
            heating_degree_days(&[observation(1, None), observation(2, Some(20.0))], 15.0).unwrap();
        assert!(records[0].is_missing());
        assert_eq!(records[1].hdd, Some(0.0));
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_rejects_non_finite_base() {
        for base in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                heating_degree_days(&[observation(1, Some(1.0))], base),
                Err(InvalidInput::BaseTemperature(_))
            ));
        }
    }
}
