use crate::error::{LookupError, Result, ValidationError};
use crate::location::{Location, Query};
use crate::store::{RecordFilter, SortField, SortOrder, Store};
use crate::{PostalRecord, Snapshot};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

pub const PAGE_SIZE: u64 = 250;

/// A validated listing request. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRequest {
    pub page: u32,
    pub sort_by: SortField,
    pub order: SortOrder,
    pub filter: RecordFilter,
}

impl Default for ListRequest {
    fn default() -> Self {
        ListRequest {
            page: 1,
            sort_by: SortField::Population,
            order: SortOrder::Descending,
            filter: RecordFilter::All,
        }
    }
}

impl ListRequest {
    pub fn parse(
        page: u32,
        sort_by: &str,
        order: &str,
        filter: RecordFilter,
    ) -> std::result::Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::Page(page));
        }
        Ok(ListRequest {
            page,
            sort_by: sort_by.parse()?,
            order: order.parse()?,
            filter,
        })
    }

    fn offset(&self) -> u64 {
        (u64::from(self.page) - 1) * PAGE_SIZE
    }
}

/// Answers zip code queries against the reference store and the spatial
/// index built from it.
///
/// Starts unloaded: coordinate queries fail with `Unavailable` until
/// `load` publishes a snapshot, while code and listing queries go straight
/// to the store and work in either state.
pub struct LookupService {
    store: Store,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl LookupService {
    pub fn new(store: Store) -> Self {
        LookupService {
            store,
            snapshot: RwLock::new(None),
        }
    }

    /// Build a fresh snapshot from the store and publish it, replacing any
    /// previous one. In-flight queries keep the snapshot they started with.
    /// Returns the number of indexed points.
    #[instrument(skip(self))]
    pub fn load(&self) -> Result<usize> {
        let started = Instant::now();
        let records = self.store.fetch_all_with_coordinates()?;
        let snapshot = Snapshot::from_records(records);
        let points = snapshot.points();
        if points == 0 {
            warn!("no geospatial data found in reference store");
        }
        *self.snapshot.write() = Some(Arc::new(snapshot));
        info!(
            points,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded geospatial points into index"
        );
        Ok(points)
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().clone()
    }

    #[instrument(skip(self))]
    pub fn exact(&self, code: &str) -> Result<PostalRecord> {
        self.store
            .fetch_by_code(code)?
            .ok_or_else(|| LookupError::NotFound(code.to_string()))
    }

    pub fn nearest(&self, lat: f64, lng: f64) -> Result<PostalRecord> {
        let location = Location::new(lat, lng)?;
        self.nearest_location(&location)
    }

    #[instrument(skip(self))]
    pub fn nearest_location(&self, location: &Location) -> Result<PostalRecord> {
        let code = self.nearest_code(location)?;
        match self.store.fetch_by_code(&code)? {
            Some(record) => Ok(record),
            None => {
                error!(zip = %code, "index and reference store have diverged");
                Err(LookupError::Inconsistent(code))
            }
        }
    }

    /// Zip code of the indexed point closest to `location`.
    pub fn nearest_code(&self, location: &Location) -> Result<String> {
        let snapshot = self.snapshot().ok_or(LookupError::Unavailable)?;
        let (code, _) = snapshot
            .nearest(&(*location).into())
            .ok_or(LookupError::Unavailable)?;
        Ok(code.to_string())
    }

    #[instrument(skip(self))]
    pub fn random(&self, filter: RecordFilter) -> Result<PostalRecord> {
        self.store
            .fetch_random(filter)?
            .ok_or(LookupError::EmptyDataset)
    }

    /// One page of at most `PAGE_SIZE` records. Pages past the end of a
    /// non-empty dataset are empty; a dataset with no matching rows at all
    /// is `EmptyDataset`.
    #[instrument(skip(self))]
    pub fn list(&self, request: &ListRequest) -> Result<Vec<PostalRecord>> {
        if request.page == 0 {
            return Err(ValidationError::Page(0).into());
        }
        let records = self.store.fetch_page(
            request.offset(),
            PAGE_SIZE,
            request.sort_by,
            request.order,
            request.filter,
        )?;
        if records.is_empty() && self.store.count(request.filter)? == 0 {
            return Err(LookupError::EmptyDataset);
        }
        Ok(records)
    }

    /// Resolve a free-form `lat,lng` pair or zip code.
    #[instrument(skip(self))]
    pub fn resolve(&self, query: &str) -> Result<PostalRecord> {
        match Query::parse(query) {
            Query::Coordinates { lat, lng } => self.nearest(lat, lng),
            Query::Code(code) => self.exact(&code),
        }
    }
}
