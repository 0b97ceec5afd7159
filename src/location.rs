use crate::error::{CoordinateField, PairError, ValidationError};
use crate::spatial::Point2D;

/// A validated coordinate: latitude in [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    lat: f64,
    lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        check(CoordinateField::Latitude, lat)?;
        check(CoordinateField::Longitude, lng)?;
        Ok(Location { lat, lng })
    }
}

fn check(field: CoordinateField, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    let (min, max) = field.range();
    if value < min {
        return Err(ValidationError::BelowMinimum {
            field,
            value,
            limit: min,
        });
    }
    if value > max {
        return Err(ValidationError::AboveMaximum {
            field,
            value,
            limit: max,
        });
    }
    Ok(())
}

impl From<Location> for Point2D {
    fn from(loc: Location) -> Self {
        [loc.lat, loc.lng]
    }
}

/// A free-form lookup: either a `lat,lng` pair or an opaque zip code.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Coordinates { lat: f64, lng: f64 },
    Code(String),
}

impl Query {
    pub fn parse(input: &str) -> Self {
        match parse_pair(input) {
            Ok((lat, lng)) => Query::Coordinates { lat, lng },
            Err(_) => Query::Code(input.to_string()),
        }
    }
}

/// Parse `"lat,lng"` without range checks.
pub fn parse_pair(s: &str) -> Result<(f64, f64), PairError> {
    let coords: Vec<&str> = s.split(',').collect();
    if coords.len() != 2 {
        return Err(PairError::Arity(coords.len()));
    }
    let lat = coords[0].trim().parse::<f64>()?;
    let lng = coords[1].trim().parse::<f64>()?;
    Ok((lat, lng))
}
