//! Turns a DWD daily-climate zip archive into temperature observations.
//!
//! Each archive (`tageswerte_KL_*.zip`) holds a handful of metadata files
//! and one `produkt_klima_tag_*.txt`: semicolon-separated, header names
//! padded with spaces, dates as `yyyymmdd`, `-999` for missing values.

use crate::types::observation::TemperatureObservation;
use crate::weather_data::error::WeatherDataError;
use chrono::NaiveDate;
use log::{debug, warn};
use polars::prelude::*;
use std::io::{Cursor, Read, Write};
use tempfile::NamedTempFile;
use tokio::task;
use ::zip::ZipArchive;

const PRODUCT_FILE_PREFIX: &str = "produkt_klima_tag";
const DWD_DATE_FORMAT: &str = "%Y%m%d";
/// DWD marker for a value that was not measured.
const MISSING_VALUE: f64 = -999.0;

/// Extracts and parses the product file of `archive` on the blocking pool.
/// Rows come back sorted by date, one per day.
pub async fn parse_product_archive(
    archive: &str,
    bytes: Vec<u8>,
) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
    let archive = archive.to_string();
    task::spawn_blocking(move || {
        let product = extract_product_file(&archive, bytes)?;
        let df = read_product_csv(&archive, product)?;
        let observations = observations_from_frame(&archive, &df)?;
        debug!(
            "Parsed {} daily rows from {}",
            observations.len(),
            archive
        );
        Ok(observations)
    })
    .await?
}

fn extract_product_file(archive: &str, bytes: Vec<u8>) -> Result<Vec<u8>, WeatherDataError> {
    let zip_error = |source| WeatherDataError::ZipArchive {
        archive: archive.to_string(),
        source,
    };
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;

    let product_name = zip
        .file_names()
        .find(|name| name.starts_with(PRODUCT_FILE_PREFIX) && name.ends_with(".txt"))
        .map(str::to_string)
        .ok_or_else(|| WeatherDataError::MissingProductFile {
            archive: archive.to_string(),
        })?;

    let mut file = zip.by_name(&product_name).map_err(zip_error)?;
    let mut content = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut content)
        .map_err(|e| WeatherDataError::CsvReadIo {
            archive: archive.to_string(),
            source: e,
        })?;
    Ok(content)
}

/// Reads every column as a string; values are trimmed and converted later.
fn read_product_csv(archive: &str, content: Vec<u8>) -> Result<DataFrame, WeatherDataError> {
    let io_error = |e| WeatherDataError::CsvReadIo {
        archive: archive.to_string(),
        source: e,
    };
    let polars_error = |e| WeatherDataError::CsvReadPolars {
        archive: archive.to_string(),
        source: e,
    };

    let mut temp_file = NamedTempFile::new().map_err(io_error)?;
    temp_file.write_all(&content).map_err(io_error)?;
    temp_file.flush().map_err(io_error)?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|options| options.with_separator(b';'))
        .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
        .map_err(polars_error)?
        .finish()
        .map_err(polars_error)
}

/// Header names carry padding (`"  TMK"`), so columns are matched trimmed.
fn string_column<'a>(
    df: &'a DataFrame,
    archive: &str,
    name: &str,
) -> Result<&'a StringChunked, WeatherDataError> {
    let column_name = df
        .get_column_names()
        .into_iter()
        .find(|column| column.trim() == name)
        .ok_or_else(|| WeatherDataError::MissingColumn {
            archive: archive.to_string(),
            column: name.to_string(),
        })?;
    df.column(column_name.as_str())
        .and_then(|column| column.str())
        .map_err(|e| WeatherDataError::CsvReadPolars {
            archive: archive.to_string(),
            source: e,
        })
}

fn observations_from_frame(
    archive: &str,
    df: &DataFrame,
) -> Result<Vec<TemperatureObservation>, WeatherDataError> {
    let ids = string_column(df, archive, "STATIONS_ID")?;
    let dates = string_column(df, archive, "MESS_DATUM")?;
    let tmk = string_column(df, archive, "TMK")?;

    let mut observations = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for ((id, date), value) in ids.into_iter().zip(dates).zip(tmk) {
        let Some(date) = date.and_then(|d| NaiveDate::parse_from_str(d.trim(), DWD_DATE_FORMAT).ok())
        else {
            skipped += 1;
            continue;
        };
        observations.push(TemperatureObservation {
            date,
            station_id: id
                .map(|id| format!("{:0>5}", id.trim()))
                .unwrap_or_default(),
            tmk: value.and_then(parse_tmk),
        });
    }
    if skipped > 0 {
        warn!("Skipped {} rows without a valid date in {}", skipped, archive);
    }

    observations.sort_by_key(|o| o.date);
    observations.dedup_by_key(|o| o.date);
    Ok(observations)
}

fn parse_tmk(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    (value.is_finite() && value != MISSING_VALUE).then_some(value)
}
