//! In-memory collaborator fakes for tests.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature, for
//! downstream crates that drive a [`crate::Workflow`] end to end.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::coords::Coordinates;
use crate::services::{
    GenerationError, GenerationService, Geocoder, LookupError, PlaceQuery, PlaceResult,
    PlacesLookup,
};
use crate::stage::{Stage, StageContext, StagePayload};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A bare place hit at the given point.
pub fn place(name: &str, lat: f64, lng: f64) -> PlaceResult {
    PlaceResult {
        name: name.to_owned(),
        location: Coordinates::new(lat, lng),
        rating: None,
        price_level: None,
        place_id: None,
        vicinity: None,
        types: Vec::new(),
    }
}

impl PlaceResult {
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_place_id(mut self, place_id: &str) -> Self {
        self.place_id = Some(place_id.to_owned());
        self
    }
}

/// Tracks how many calls are running at once.
#[derive(Debug, Default)]
struct InFlight {
    now: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.now.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Place search answering from a table keyed by query text.
///
/// Unknown queries get the fallback results (empty unless set).
#[derive(Debug, Default)]
pub struct FakePlaces {
    results: Mutex<HashMap<String, Vec<PlaceResult>>>,
    failures: Mutex<HashMap<String, LookupError>>,
    fallback: Mutex<Vec<PlaceResult>>,
    calls: Mutex<Vec<PlaceQuery>>,
    delay: Option<Duration>,
    in_flight: InFlight,
}

impl FakePlaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every search sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn insert(&self, query: &str, results: Vec<PlaceResult>) {
        lock(&self.results).insert(query.to_owned(), results);
    }

    pub fn fail(&self, query: &str, error: LookupError) {
        lock(&self.failures).insert(query.to_owned(), error);
    }

    pub fn respond_to_all(&self, results: Vec<PlaceResult>) {
        *lock(&self.fallback) = results;
    }

    pub fn calls(&self) -> Vec<PlaceQuery> {
        lock(&self.calls).clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.in_flight.max.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlacesLookup for FakePlaces {
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<PlaceResult>, LookupError> {
        lock(&self.calls).push(query.clone());
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.leave();

        if let Some(e) = lock(&self.failures).get(&query.text) {
            return Err(e.clone());
        }
        let results = lock(&self.results).get(&query.text).cloned();
        Ok(results.unwrap_or_else(|| lock(&self.fallback).clone()))
    }
}

/// Geocoder answering from a table keyed by address.
#[derive(Debug, Default)]
pub struct FakeGeocoder {
    points: Mutex<HashMap<String, Coordinates>>,
    failures: Mutex<HashMap<String, LookupError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, address: &str, point: Coordinates) {
        lock(&self.points).insert(address.to_owned(), point);
    }

    pub fn fail(&self, address: &str, error: LookupError) {
        lock(&self.failures).insert(address.to_owned(), error);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, LookupError> {
        lock(&self.calls).push(address.to_owned());
        if let Some(e) = lock(&self.failures).get(address) {
            return Err(e.clone());
        }
        Ok(lock(&self.points).get(address).copied())
    }
}

/// Generator replaying queued answers per stage.
///
/// A stage with nothing queued answers [`GenerationError::Unavailable`].
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    queues: Mutex<HashMap<Stage, VecDeque<Result<StagePayload, GenerationError>>>>,
    calls: Mutex<Vec<StageContext>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `payload` as the next answer for its own stage.
    pub fn push(&self, payload: StagePayload) {
        self.push_for(payload.stage(), payload);
    }

    /// Queue `payload` as the next answer for `stage`, even if it belongs
    /// to another stage.
    pub fn push_for(&self, stage: Stage, payload: StagePayload) {
        lock(&self.queues).entry(stage).or_default().push_back(Ok(payload));
    }

    pub fn push_failure(&self, stage: Stage, error: GenerationError) {
        lock(&self.queues).entry(stage).or_default().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<StageContext> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, stage: Stage) -> Vec<StageContext> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.request.stage() == stage)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, context: &StageContext) -> Result<StagePayload, GenerationError> {
        let stage = context.request.stage();
        lock(&self.calls).push(context.clone());
        lock(&self.queues)
            .get_mut(&stage)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(GenerationError::Unavailable(format!("nothing scripted for '{stage}'")))
            })
    }
}
