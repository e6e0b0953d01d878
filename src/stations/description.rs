//! Parser for the DWD station description file
//! (`KL_Tageswerte_Beschreibung_Stationen.txt`).
//!
//! The file is whitespace-aligned, ISO-8859-1 encoded, and starts with a
//! header line followed by a `-----` separator line:
//!
//! ```text
//! Stations_id von_datum bis_datum Stationshoehe geoBreite geoLaenge Stationsname Bundesland Abgabe
//! ----------- --------- --------- ------------- --------- --------- ------------ ---------- ------
//! 00001 19370101 19860630            478     47.8413    8.8493 Aach       Baden-Württemberg  Frei
//! ```

use crate::types::coordinate::Coordinate;
use crate::types::station::Station;
use chrono::NaiveDate;
use log::{debug, warn};

const DWD_DATE_FORMAT: &str = "%Y%m%d";
const DELIVERY_MARKERS: [&str; 2] = ["Frei", "Kostenpflichtig"];

/// Decodes the raw file. DWD ships ISO-8859-1; UTF-8 is accepted as well.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        // ISO-8859-1 maps every byte to the code point of the same value.
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// Parses every well-formed station row. Header, separator and malformed
/// rows are skipped.
pub fn parse_station_description(text: &str) -> Vec<Station> {
    let stations: Vec<Station> = text.lines().filter_map(parse_station_line).collect();
    debug!("Parsed {} stations from description file", stations.len());
    stations
}

fn parse_station_line(line: &str) -> Option<Station> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 7 {
        return None;
    }
    let id = parts[0];
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        // Header and `-----------` separator rows.
        return None;
    }

    let parsed = (|| {
        let observation_start = NaiveDate::parse_from_str(parts[1], DWD_DATE_FORMAT).ok()?;
        let observation_end = NaiveDate::parse_from_str(parts[2], DWD_DATE_FORMAT).ok()?;
        let elevation_m = parts[3].parse::<i32>().ok();
        let latitude = parts[4].parse::<f64>().ok()?;
        let longitude = parts[5].parse::<f64>().ok()?;
        let coordinate = Coordinate::new(latitude, longitude).ok()?;

        let mut rest = &parts[6..];
        if let Some((last, init)) = rest.split_last() {
            if DELIVERY_MARKERS.contains(last) {
                rest = init;
            }
        }
        let (name, state) = match rest {
            [] => return None,
            [name] => (name.to_string(), String::new()),
            [name @ .., state] => (name.join(" "), state.to_string()),
        };

        Some(Station {
            id: format!("{:0>5}", id),
            name,
            state,
            elevation_m,
            coordinate,
            observation_start,
            observation_end,
        })
    })();

    if parsed.is_none() {
        warn!("Skipping malformed station row: {}", line.trim());
    }
    parsed
}
