//! Trip loading from CSV and JSON files
//!
//! Rows need a destination; traveler count defaults to 1 and spend is
//! optional. Rows that fail validation are skipped and counted, never passed
//! on to scoring.

use crate::{ExposureError, Result, TripRecord};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// Accepted header names, compared case-insensitively
const DESTINATION_COLUMNS: &[&str] = &["destination", "dest", "pays", "country"];
const TRAVELER_COLUMNS: &[&str] = &["pax", "travelers", "travellers", "voyageurs"];
const SPEND_COLUMNS: &[&str] = &["spend", "avg_spend", "average_spend", "budget"];

/// Max destination length kept from source data
const MAX_DESTINATION_LEN: usize = 256;

/// Raw trip row from JSON
#[derive(Debug, Deserialize)]
struct RawTripRow {
    #[serde(alias = "Destination", alias = "dest", alias = "pays", alias = "country")]
    destination: Option<String>,
    #[serde(alias = "Pax", alias = "pax", alias = "travellers", alias = "voyageurs")]
    travelers: Option<f64>,
    #[serde(alias = "Spend", alias = "avg_spend", alias = "average_spend", alias = "budget")]
    spend: Option<f64>,
}

/// Container for JSON files wrapping the rows in an object
///
/// Rows stay untyped until each one is converted on its own.
#[derive(Debug, Deserialize)]
struct TripFile {
    trips: Vec<serde_json::Value>,
}

fn sanitize_destination(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DESTINATION_LEN)
        .collect()
}

fn invalid(row: usize, reason: impl Into<String>) -> ExposureError {
    ExposureError::InvalidRow {
        row,
        reason: reason.into(),
    }
}

/// Non-negative whole traveler count
fn validate_travelers(row: usize, value: f64) -> Result<u32> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(invalid(row, format!("invalid traveler count {value}")));
    }
    Ok(value as u32)
}

fn validate_spend(row: usize, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(row, format!("invalid spend {value}")));
    }
    Ok(value)
}

fn build_trip(
    row: usize,
    destination: Option<&str>,
    travelers: Option<f64>,
    spend: Option<f64>,
) -> Result<TripRecord> {
    let destination = destination
        .map(sanitize_destination)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| invalid(row, "empty destination"))?;

    let travelers = match travelers {
        Some(value) => validate_travelers(row, value)?,
        None => 1,
    };

    let mut trip = TripRecord::new(destination, travelers);
    if let Some(value) = spend {
        trip = trip.with_spend(validate_spend(row, value)?);
    }
    Ok(trip)
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Traveler count written as plain digits; separators are rejected
fn parse_count(row: usize, text: &str) -> Result<f64> {
    text.parse::<u32>()
        .map(f64::from)
        .map_err(|_| invalid(row, format!("Pax is not a whole number: {text:?}")))
}

/// Amount with an optional `.` or `,` decimal separator
///
/// The separator must be unique and followed by one or two digits, so
/// thousands groups such as `1,200` or `1.000` are rejected.
fn parse_decimal(row: usize, column: &str, text: &str) -> Result<f64> {
    let reject = || invalid(row, format!("{column} is not a number: {text:?}"));
    let is_separator = |c: char| c == ',' || c == '.';

    let normalized = match text.rfind(is_separator) {
        None => text.to_string(),
        Some(pos) => {
            let fraction_len = text.len() - pos - 1;
            if text.matches(is_separator).count() > 1 || !(1..=2).contains(&fraction_len) {
                return Err(reject());
            }
            text.replacen(',', ".", 1)
        }
    };
    normalized.parse::<f64>().map_err(|_| reject())
}

/// Parse trips from CSV
///
/// Fails only when the destination column is missing; bad rows are skipped.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<TripRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let destination_col = find_column(&headers, DESTINATION_COLUMNS)
        .ok_or(ExposureError::MissingColumn("Destination"))?;
    let travelers_col = find_column(&headers, TRAVELER_COLUMNS);
    let spend_col = find_column(&headers, SPEND_COLUMNS);

    let mut trips = Vec::new();
    let mut skipped = 0;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1
        let row = idx + 2;
        let parsed = result.map_err(ExposureError::from).and_then(|record| {
            let field = |col: Option<usize>| {
                col.and_then(|i| record.get(i))
                    .filter(|s| !s.is_empty())
            };
            let travelers = field(travelers_col)
                .map(|s| parse_count(row, s))
                .transpose()?;
            let spend = field(spend_col)
                .map(|s| parse_decimal(row, "Spend", s))
                .transpose()?;
            build_trip(row, field(Some(destination_col)), travelers, spend)
        });

        match parsed {
            Ok(trip) => trips.push(trip),
            Err(e) => {
                warn!("Skipping row {}: {}", row, e);
                skipped += 1;
            }
        }
    }

    info!("Loaded {} trips from CSV ({} rows skipped)", trips.len(), skipped);
    Ok(trips)
}

/// Parse trips from JSON: a bare array or `{"trips": [...]}`
pub fn parse_json<R: Read>(reader: R) -> Result<Vec<TripRecord>> {
    let raw: serde_json::Value = serde_json::from_reader(reader)?;

    let rows: Vec<serde_json::Value> = if raw.is_array() {
        serde_json::from_value(raw)?
    } else {
        serde_json::from_value::<TripFile>(raw)?.trips
    };

    let mut trips = Vec::new();
    let mut skipped = 0;

    for (idx, value) in rows.into_iter().enumerate() {
        let parsed = serde_json::from_value::<RawTripRow>(value)
            .map_err(ExposureError::from)
            .and_then(|raw_row| {
                build_trip(idx, raw_row.destination.as_deref(), raw_row.travelers, raw_row.spend)
            });

        match parsed {
            Ok(trip) => trips.push(trip),
            Err(e) => {
                warn!("Skipping row {}: {}", idx, e);
                skipped += 1;
            }
        }
    }

    info!("Loaded {} trips from JSON ({} rows skipped)", trips.len(), skipped);
    Ok(trips)
}

/// Load trips from a `.csv` or `.json` file
pub fn load_trips(path: impl AsRef<Path>) -> Result<Vec<TripRecord>> {
    let path = path.as_ref();
    info!("Loading trips from {:?}", path);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => parse_csv(BufReader::new(File::open(path)?)),
        "json" => parse_json(BufReader::new(File::open(path)?)),
        _ => Err(ExposureError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_fixture(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_csv() {
        let csv = "Destination,Pax,Spend\nMaroc,4,1200\nÉgypte,2,\nNorvège,,900\n";
        let trips = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(trips.len(), 3);
        assert_eq!(trips[0], TripRecord::new("Maroc", 4).with_spend(1200.0));
        assert_eq!(trips[1], TripRecord::new("Égypte", 2));
        assert_eq!(trips[2], TripRecord::new("Norvège", 1).with_spend(900.0));
    }

    #[test]
    fn test_csv_headers_case_insensitive() {
        let csv = "PAX ; DESTINATION\n";
        assert!(parse_csv(csv.as_bytes()).is_err());

        let csv = "pax,destination\n3,Islande\n";
        let trips = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(trips, vec![TripRecord::new("Islande", 3)]);
    }

    #[test]
    fn test_csv_without_pax_column() {
        let csv = "Destination\nJapon\nPérou\n";
        let trips = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(trips.len(), 2);
        assert!(trips.iter().all(|t| t.travelers == 1 && t.spend.is_none()));
    }

    #[test]
    fn test_csv_missing_destination_column() {
        let csv = "Pax,Spend\n2,100\n";
        assert!(matches!(
            parse_csv(csv.as_bytes()),
            Err(ExposureError::MissingColumn("Destination"))
        ));
    }

    #[test]
    fn test_csv_invalid_rows_skipped() {
        let csv = "Destination,Pax,Spend\n\
                   ,2,100\n\
                   Maroc,-1,\n\
                   Grèce,2.5,\n\
                   Italie,deux,\n\
                   Espagne,3,-50\n\
                   Tunisie,1,\"850,5\"\n";
        let trips = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(trips, vec![TripRecord::new("Tunisie", 1).with_spend(850.5)]);
    }

    #[test]
    fn test_csv_thousands_separators_skipped() {
        let csv = "Destination,Pax,Spend\n\
                   Maroc,\"1,000\",\n\
                   Maroc,1.000,\n\
                   Maroc,2,\"1,200\"\n\
                   Maroc,2,1.200\n\
                   Maroc,2,\"1.200,50\"\n\
                   Maroc,3,\"1200,50\"\n\
                   Maroc,4,1200.5\n";
        let trips = parse_csv(csv.as_bytes()).unwrap();

        assert_eq!(
            trips,
            vec![
                TripRecord::new("Maroc", 3).with_spend(1200.5),
                TripRecord::new("Maroc", 4).with_spend(1200.5),
            ]
        );
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(0, "Spend", "850").unwrap(), 850.0);
        assert_eq!(parse_decimal(0, "Spend", "850,5").unwrap(), 850.5);
        assert_eq!(parse_decimal(0, "Spend", "850.25").unwrap(), 850.25);
        assert!(parse_decimal(0, "Spend", "1,000").is_err());
        assert!(parse_decimal(0, "Spend", "1.000").is_err());
        assert!(parse_decimal(0, "Spend", "850,").is_err());
        assert!(matches!(
            parse_decimal(7, "Spend", "1,000.5"),
            Err(ExposureError::InvalidRow { row: 7, .. })
        ));
    }

    #[test]
    fn test_parse_json_skips_mistyped_rows() {
        let json = r#"[
            {"Destination": "Maroc", "Pax": 3},
            {"Destination": "Grèce", "Pax": "3"},
            {"Destination": "Italie", "Spend": "cher"},
            "Espagne",
            {"pays": "Islande", "budget": 2100.0}
        ]"#;
        let trips = parse_json(json.as_bytes()).unwrap();

        assert_eq!(
            trips,
            vec![
                TripRecord::new("Maroc", 3),
                TripRecord::new("Islande", 1).with_spend(2100.0),
            ]
        );
    }

    #[test]
    fn test_parse_json_array() {
        let json = r#"[
            {"Destination": "Maroc", "Pax": 10},
            {"destination": "Islande", "travelers": 2, "spend": 3000.0},
            {"Pax": 5},
            {"Destination": "  ", "Pax": 1}
        ]"#;
        let trips = parse_json(json.as_bytes()).unwrap();

        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0], TripRecord::new("Maroc", 10));
        assert_eq!(trips[1], TripRecord::new("Islande", 2).with_spend(3000.0));
    }

    #[test]
    fn test_parse_json_object() {
        let json = r#"{"trips": [
            {"Destination": "Antarctique", "Pax": 10},
            {"Destination": "Antarctique", "Pax": 5}
        ]}"#;
        let trips = parse_json(json.as_bytes()).unwrap();
        assert_eq!(trips.len(), 2);
        assert_eq!(trips.iter().map(|t| t.travelers).sum::<u32>(), 15);

        assert!(parse_json(r#"{"rows": []}"#.as_bytes()).is_err());
    }

    #[test]
    fn test_load_trips_by_extension() {
        let csv = write_fixture(".csv", "Destination,Pax\nMaroc,4\n");
        assert_eq!(load_trips(csv.path()).unwrap(), vec![TripRecord::new("Maroc", 4)]);

        let json = write_fixture(".JSON", r#"[{"Destination": "Maroc", "Pax": 4}]"#);
        assert_eq!(load_trips(json.path()).unwrap(), vec![TripRecord::new("Maroc", 4)]);

        let xlsx = write_fixture(".xlsx", "");
        assert!(matches!(
            load_trips(xlsx.path()),
            Err(ExposureError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_trips("/nonexistent/trips.csv"),
            Err(ExposureError::Io(_))
        ));
    }
}
