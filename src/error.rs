use std::fmt;
use std::num::ParseFloatError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateField {
    Latitude,
    Longitude,
}

impl CoordinateField {
    pub fn name(&self) -> &'static str {
        match self {
            CoordinateField::Latitude => "lat",
            CoordinateField::Longitude => "lng",
        }
    }

    pub fn range(&self) -> (f64, f64) {
        match self {
            CoordinateField::Latitude => (-90.0, 90.0),
            CoordinateField::Longitude => (-180.0, 180.0),
        }
    }
}

impl fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateField::Latitude => write!(f, "latitude"),
            CoordinateField::Longitude => write!(f, "longitude"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
}

/// Caller-correctable input problems. Each names the offending field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} {value} is below the minimum of {limit}, must be between {} and {}", .field.range().0, .field.range().1)]
    BelowMinimum {
        field: CoordinateField,
        value: f64,
        limit: f64,
    },
    #[error("{field} {value} is above the maximum of {limit}, must be between {} and {}", .field.range().0, .field.range().1)]
    AboveMaximum {
        field: CoordinateField,
        value: f64,
        limit: f64,
    },
    #[error("{field} must be a finite number")]
    NotFinite { field: CoordinateField },
    #[error("invalid sort_by field {0:?}, expected one of zip, population, city, state, lat, lng")]
    SortField(String),
    #[error("invalid order {0:?}, expected asc or desc")]
    Order(String),
    #[error("invalid page {0}, pages start at 1")]
    Page(u32),
}

impl ValidationError {
    /// Name of the request field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::BelowMinimum { field, .. }
            | ValidationError::AboveMaximum { field, .. }
            | ValidationError::NotFinite { field } => field.name(),
            ValidationError::SortField(_) => "sort_by",
            ValidationError::Order(_) => "order",
            ValidationError::Page(_) => "page",
        }
    }

    pub fn bound(&self) -> Option<Bound> {
        match self {
            ValidationError::BelowMinimum { .. } => Some(Bound::Lower),
            ValidationError::AboveMaximum { .. } => Some(Bound::Upper),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("zip code {0} not found")]
    NotFound(String),

    #[error("geospatial index unavailable")]
    Unavailable,

    #[error("index resolved to zip code {0} which is missing from the reference data")]
    Inconsistent(String),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("reference data error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LookupError>;

/// Why a string is not a `lat,lng` pair.
#[derive(Error, Debug)]
pub enum PairError {
    #[error("expected \"lat,lng\", got {0} fields")]
    Arity(usize),

    #[error(transparent)]
    Float(#[from] ParseFloatError),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("record {0} has an empty zip code")]
    EmptyCode(usize),

    #[error("zip code {0} has only one of lat/lng")]
    HalfCoordinates(String),

    #[error("zip code {0} appears more than once")]
    DuplicateCode(String),

    #[error("csv input error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
