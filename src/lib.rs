use serde::{Deserialize, Serialize};
use spatial::{Neighbor, Point2D, SpatialIndex};

pub mod error;
pub mod location;
pub mod lookup;
pub mod service;
pub mod spatial;
pub mod store;

pub use error::{LookupError, ValidationError};
pub use location::{Location, Query};
pub use lookup::{ListRequest, LookupService, PAGE_SIZE};
pub use store::{RecordFilter, SortField, SortOrder, Store};

/// One row of the zip code reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostalRecord {
    pub id: i64,
    #[serde(rename = "zip")]
    pub code: String,
    #[serde(rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(rename = "lng")]
    pub longitude: Option<f64>,
    pub population: Option<i64>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "type")]
    pub place_type: Option<String>,
}

impl PostalRecord {
    pub fn new(code: &str) -> Self {
        PostalRecord {
            id: 0,
            code: code.to_string(),
            latitude: None,
            longitude: None,
            population: None,
            city: None,
            state: None,
            place_type: None,
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lng);
        self
    }

    pub fn with_place(mut self, city: &str, state: &str) -> Self {
        self.city = Some(city.to_string());
        self.state = Some(state.to_string());
        self
    }

    pub fn with_population(mut self, population: i64) -> Self {
        self.population = Some(population);
        self
    }

    pub fn with_type(mut self, place_type: &str) -> Self {
        self.place_type = Some(place_type.to_string());
        self
    }

    pub fn point(&self) -> Option<Point2D> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some([lat, lng]),
            _ => None,
        }
    }

    pub fn has_city_and_state(&self) -> bool {
        let present = |s: &Option<String>| s.as_deref().map_or(false, |s| !s.is_empty());
        present(&self.city) && present(&self.state)
    }
}

/// An immutable spatial index together with the zip code of every point.
///
/// `codes[i]` belongs to the point built at position `i`. Both halves come
/// out of the same pass over the rows and are never touched afterwards.
#[derive(Debug)]
pub struct Snapshot {
    index: SpatialIndex,
    codes: Vec<String>,
}

impl Snapshot {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PostalRecord>,
    {
        let mut points = Vec::new();
        let mut codes = Vec::new();
        for record in records {
            if let Some(point) = record.point() {
                points.push(point);
                codes.push(record.code);
            }
        }
        let index = SpatialIndex::build(&points);
        debug_assert_eq!(index.len(), codes.len());
        Snapshot { index, codes }
    }

    /// Nearest indexed zip code, or `None` for an empty index.
    pub fn nearest(&self, point: &Point2D) -> Option<(&str, Neighbor)> {
        let neighbor = self.index.nearest(point)?;
        // positions come from the same pass that filled `codes`
        Some((self.codes[neighbor.position].as_str(), neighbor))
    }

    /// Number of indexed points.
    pub fn points(&self) -> usize {
        self.codes.len()
    }
}
