//! Flat CSV table to `PostalRecord`s, as consumed by `build-db`.

use crate::error::ImportError;
use crate::PostalRecord;
use serde::Deserialize;
use std::io;
use tracing::warn;

/// Header: `zip,lat,lng,population,city,state,type`. Empty fields are absent.
#[derive(Debug, Deserialize)]
struct CsvRow {
    zip: String,
    lat: Option<f64>,
    lng: Option<f64>,
    population: Option<i64>,
    city: Option<String>,
    state: Option<String>,
    #[serde(rename = "type")]
    place_type: Option<String>,
}

impl From<CsvRow> for PostalRecord {
    fn from(row: CsvRow) -> Self {
        let code = row.zip.trim().to_string();
        let (latitude, longitude) = match (row.lat, row.lng) {
            (Some(lat), Some(lng)) => (Some(lat), Some(lng)),
            (None, None) => (None, None),
            _ => {
                warn!(zip = %code, "dropping half-present coordinates");
                (None, None)
            }
        };
        PostalRecord {
            id: 0,
            code,
            latitude,
            longitude,
            population: row.population,
            city: row.city,
            state: row.state,
            place_type: row.place_type,
        }
    }
}

#[derive(Debug)]
pub struct Import {
    /// Records sorted by zip code.
    pub records: Vec<PostalRecord>,
    /// Rows dropped for lacking a zip code.
    pub skipped: usize,
}

pub fn read_csv<R: io::Read>(input: R) -> Result<Import, ImportError> {
    let mut reader = csv::Reader::from_reader(input);
    let mut records = Vec::new();
    let mut skipped = 0;
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let record = PostalRecord::from(row?);
        if record.code.is_empty() {
            warn!(line = line + 2, "skipping row without zip code");
            skipped += 1;
            continue;
        }
        records.push(record);
    }
    records.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(Import { records, skipped })
}
