//! Enrichment pipeline: attach coordinates to name-bearing items.
//!
//! Two tiers per item: a place search for `"{name}, {destination}"`, then a
//! geocode of the same string if the search is unavailable or empty. Items
//! that already carry resolved coordinates are never touched.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::coords::{self, Coordinates};
use crate::model::{Activity, RestaurantSuggestion, SuggestedActivity};
use crate::services::{Geocoder, PlaceQuery, PlaceResult, PlacesLookup};

pub const DEFAULT_BATCH_SIZE: usize = 5;

/// What a successful lookup contributes to an item.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceMatch {
    pub coordinates: Coordinates,
    pub rating: Option<f64>,
    pub place_id: Option<String>,
}

impl From<PlaceResult> for PlaceMatch {
    fn from(r: PlaceResult) -> Self {
        Self {
            coordinates: r.location,
            rating: r.rating,
            place_id: r.place_id,
        }
    }
}

/// Optional spatial scope for the place-search tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchScope {
    pub center: Coordinates,
    pub radius_m: u32,
}

/// An item the pipeline can resolve.
pub trait Enrichable: Send {
    fn lookup_name(&self) -> &str;
    fn coordinates(&self) -> Option<&Coordinates>;
    fn apply(&mut self, found: PlaceMatch);
}

impl Enrichable for Activity {
    fn lookup_name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> Option<&Coordinates> {
        self.coordinates.as_ref()
    }

    fn apply(&mut self, found: PlaceMatch) {
        self.coordinates = Some(found.coordinates);
        if found.rating.is_some() {
            self.rating = found.rating;
        }
        if found.place_id.is_some() {
            self.place_id = found.place_id;
        }
    }
}

impl Enrichable for SuggestedActivity {
    fn lookup_name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> Option<&Coordinates> {
        self.coordinates.as_ref()
    }

    fn apply(&mut self, found: PlaceMatch) {
        self.coordinates = Some(found.coordinates);
        if found.rating.is_some() {
            self.rating = found.rating;
        }
        if found.place_id.is_some() {
            self.place_id = found.place_id;
        }
    }
}

impl Enrichable for RestaurantSuggestion {
    fn lookup_name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> Option<&Coordinates> {
        self.coordinates.as_ref()
    }

    fn apply(&mut self, found: PlaceMatch) {
        self.coordinates = Some(found.coordinates);
        if found.rating.is_some() {
            self.rating = found.rating;
        }
        if found.place_id.is_some() {
            self.place_id = found.place_id;
        }
    }
}

// Mutable references flow through unchanged so callers can enrich items that
// live inside larger records (the meals and periods of a day).
impl<T: Enrichable> Enrichable for &mut T {
    fn lookup_name(&self) -> &str {
        (**self).lookup_name()
    }

    fn coordinates(&self) -> Option<&Coordinates> {
        (**self).coordinates()
    }

    fn apply(&mut self, found: PlaceMatch) {
        (**self).apply(found)
    }
}

/// Per-invocation outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Newly resolved by this run.
    pub resolved: usize,
    /// Already resolved on input.
    pub skipped: usize,
    /// Still unresolved after both tiers.
    pub unresolved: usize,
}

enum Outcome {
    Resolved,
    Skipped,
    Unresolved,
}

impl EnrichmentReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Resolved => self.resolved += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Unresolved => self.unresolved += 1,
        }
    }
}

/// Batched, idempotent coordinate resolution.
///
/// Within a batch every lookup runs concurrently; batches run one after the
/// other, so at most `batch_size` lookups are in flight per invocation.
#[derive(Clone)]
pub struct Enricher {
    places: Option<Arc<dyn PlacesLookup>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    batch_size: usize,
}

impl fmt::Debug for Enricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enricher")
            .field("places", &self.places.is_some())
            .field("geocoder", &self.geocoder.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Enricher {
    pub fn new(
        places: Option<Arc<dyn PlacesLookup>>,
        geocoder: Option<Arc<dyn Geocoder>>,
    ) -> Self {
        Self {
            places,
            geocoder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// No collaborators: every item stays as it is.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn enrich<T: Enrichable>(
        &self,
        items: Vec<T>,
        destination: &str,
        scope: Option<SearchScope>,
    ) -> Vec<T> {
        self.enrich_with_report(items, destination, scope).await.0
    }

    /// Resolve every item in place; the output has the input's length and
    /// order.
    pub async fn enrich_with_report<T: Enrichable>(
        &self,
        mut items: Vec<T>,
        destination: &str,
        scope: Option<SearchScope>,
    ) -> (Vec<T>, EnrichmentReport) {
        let mut report = EnrichmentReport::default();
        for batch in items.chunks_mut(self.batch_size.max(1)) {
            let outcomes = join_all(
                batch
                    .iter_mut()
                    .map(|item| self.enrich_one(item, destination, scope)),
            )
            .await;
            for outcome in outcomes {
                report.record(outcome);
            }
        }
        debug!(
            destination,
            resolved = report.resolved,
            skipped = report.skipped,
            unresolved = report.unresolved,
            "enrichment finished"
        );
        (items, report)
    }

    async fn enrich_one<T: Enrichable>(
        &self,
        item: &mut T,
        destination: &str,
        scope: Option<SearchScope>,
    ) -> Outcome {
        if coords::is_resolved(item.coordinates()) {
            return Outcome::Skipped;
        }
        let name = item.lookup_name().trim();
        if name.is_empty() {
            return Outcome::Unresolved;
        }
        let query = composite_query(name, destination);
        match self.lookup(&query, scope).await {
            Some(found) => {
                item.apply(found);
                Outcome::Resolved
            }
            None => Outcome::Unresolved,
        }
    }

    /// Both tiers for a single free-text query. Failures are logged and
    /// reported as `None`.
    pub async fn lookup(&self, query: &str, scope: Option<SearchScope>) -> Option<PlaceMatch> {
        if let Some(places) = &self.places {
            let mut q = PlaceQuery::text(query);
            if let Some(scope) = scope {
                q = q.near(scope.center, scope.radius_m);
            }
            match places.search(&q).await {
                Ok(results) => {
                    if let Some(first) = results.into_iter().find(|r| r.location.is_finite()) {
                        return Some(first.into());
                    }
                }
                Err(e) => warn!(query, error = %e, "place search failed"),
            }
        }
        self.geocode(query).await.map(|coordinates| PlaceMatch {
            coordinates,
            rating: None,
            place_id: None,
        })
    }

    /// Geocoding tier alone.
    pub async fn geocode(&self, address: &str) -> Option<Coordinates> {
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.geocode(address).await {
            Ok(Some(c)) if c.is_finite() => Some(c),
            Ok(_) => {
                debug!(address, "geocoding returned no match");
                None
            }
            Err(e) => {
                warn!(address, error = %e, "geocoding failed");
                None
            }
        }
    }

    /// Raw ranked place search; empty on failure or when searching is
    /// disabled.
    pub async fn search_places(&self, query: &PlaceQuery) -> Vec<PlaceResult> {
        let Some(places) = &self.places else {
            return Vec::new();
        };
        match places.search(query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(query = %query.text, error = %e, "place search failed");
                Vec::new()
            }
        }
    }
}

fn composite_query(name: &str, destination: &str) -> String {
    let destination = destination.trim();
    if destination.is_empty() {
        name.to_owned()
    } else {
        format!("{name}, {destination}")
    }
}
