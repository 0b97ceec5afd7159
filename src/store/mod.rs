//! SQLite-backed zip code reference table.
//!
//! `Store` keeps only the database path. Each call opens its own connection
//! and drops it before returning, so any number of readers can use one
//! `Store` concurrently without sharing a handle.

use crate::error::{ImportError, ValidationError};
use crate::PostalRecord;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, instrument, warn};

pub mod import;

const COLUMNS: &str = "id, zip, lat, lng, population, city, state, type";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS zip_codes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        zip TEXT NOT NULL UNIQUE,
        lat REAL,
        lng REAL,
        population INTEGER,
        city TEXT,
        state TEXT,
        type TEXT
    );
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordFilter {
    #[default]
    All,
    /// Only records whose city and state are both non-empty.
    CityAndState,
}

impl RecordFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            RecordFilter::All => "",
            RecordFilter::CityAndState => {
                "WHERE city IS NOT NULL AND city <> '' AND state IS NOT NULL AND state <> ''"
            }
        }
    }
}

impl From<bool> for RecordFilter {
    fn from(city_and_state_only: bool) -> Self {
        if city_and_state_only {
            RecordFilter::CityAndState
        } else {
            RecordFilter::All
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Code,
    Population,
    City,
    State,
    Latitude,
    Longitude,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            SortField::Code => "zip",
            SortField::Population => "population",
            SortField::City => "city",
            SortField::State => "state",
            SortField::Latitude => "lat",
            SortField::Longitude => "lng",
        }
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zip" | "code" => Ok(SortField::Code),
            "population" => Ok(SortField::Population),
            "city" => Ok(SortField::City),
            "state" => Ok(SortField::State),
            "lat" | "latitude" => Ok(SortField::Latitude),
            "lng" | "longitude" => Ok(SortField::Longitude),
            _ => Err(ValidationError::SortField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            _ => Err(ValidationError::Order(s.to_string())),
        }
    }
}

fn record_from_row(row: &Row) -> rusqlite::Result<PostalRecord> {
    Ok(PostalRecord {
        id: row.get("id")?,
        code: row.get("zip")?,
        latitude: row.get("lat")?,
        longitude: row.get("lng")?,
        population: row.get("population")?,
        city: row.get("city")?,
        state: row.get("state")?,
        place_type: row.get("type")?,
    })
}

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Store {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write `records` to a new database at `path`. Record ids are assigned
    /// by the database.
    ///
    /// The table is filled in a sibling `.partial` file that is renamed over
    /// `path` only once the insert has committed, so a failed import leaves
    /// nothing behind.
    pub fn create<P: AsRef<Path>>(path: P, records: &[PostalRecord]) -> Result<Self, ImportError> {
        let mut seen = HashSet::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if record.code.is_empty() {
                return Err(ImportError::EmptyCode(i));
            }
            if record.latitude.is_some() != record.longitude.is_some() {
                return Err(ImportError::HalfCoordinates(record.code.clone()));
            }
            if !seen.insert(record.code.as_str()) {
                return Err(ImportError::DuplicateCode(record.code.clone()));
            }
        }

        let path = path.as_ref();
        let partial = partial_path(path);
        if partial.exists() {
            fs::remove_file(&partial)?;
        }
        if let Err(e) = write_records(&partial, records) {
            if let Err(cleanup) = fs::remove_file(&partial) {
                warn!(error = %cleanup, path = ?partial, "could not remove partial database");
            }
            return Err(e);
        }
        fs::rename(&partial, path)?;
        debug!(count = records.len(), "inserted zip code records");
        Ok(Store::new(path))
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// All rows with both coordinates present, in table order.
    #[instrument(skip(self))]
    pub fn fetch_all_with_coordinates(&self) -> rusqlite::Result<Vec<PostalRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM zip_codes WHERE lat IS NOT NULL AND lng IS NOT NULL ORDER BY id",
            COLUMNS
        ))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    #[instrument(skip(self))]
    pub fn fetch_by_code(&self, code: &str) -> rusqlite::Result<Option<PostalRecord>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("SELECT {} FROM zip_codes WHERE zip = ?1", COLUMNS),
            params![code],
            record_from_row,
        )
        .optional()
    }

    #[instrument(skip(self))]
    pub fn fetch_random(&self, filter: RecordFilter) -> rusqlite::Result<Option<PostalRecord>> {
        let conn = self.connect()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM zip_codes {} ORDER BY RANDOM() LIMIT 1",
                COLUMNS,
                filter.where_clause()
            ),
            [],
            record_from_row,
        )
        .optional()
    }

    /// One page of rows ordered by `sort_by`, then by zip code ascending.
    #[instrument(skip(self))]
    pub fn fetch_page(
        &self,
        offset: u64,
        limit: u64,
        sort_by: SortField,
        order: SortOrder,
        filter: RecordFilter,
    ) -> rusqlite::Result<Vec<PostalRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM zip_codes {} ORDER BY {} {}, zip ASC LIMIT ?1 OFFSET ?2",
            COLUMNS,
            filter.where_clause(),
            sort_by.column(),
            order.keyword()
        ))?;
        let records = stmt
            .query_map(params![limit as i64, offset as i64], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count(&self, filter: RecordFilter) -> rusqlite::Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM zip_codes {}", filter.where_clause()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn write_records(path: &Path, records: &[PostalRecord]) -> Result<(), ImportError> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO zip_codes (zip, lat, lng, population, city, state, type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for record in records {
            stmt.execute(params![
                record.code,
                record.latitude,
                record.longitude,
                record.population,
                record.city,
                record.state,
                record.place_type,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}
