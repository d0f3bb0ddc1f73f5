//! City data synchronizer: owns the fetched records, the loading flag and
//! the shared error slot.
//!
//! Refreshes fetch every tracked city concurrently and apply all-or-nothing:
//! one failed city leaves the previous records untouched. Every refresh takes
//! a generation number; when a newer refresh has been dispatched, an older
//! one's result is discarded on completion. Changing the city list also
//! invalidates refreshes already in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aether_core::{AppError, FetchError};
use aether_weather::{CityWeatherRecord, WeatherSource};
use futures_util::future::try_join_all;
use parking_lot::RwLock;

use crate::city_list::TrackedCityList;
use crate::view::CityFilter;

/// Point-in-time copy of the synchronizer state for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSnapshot {
    pub records: Vec<CityWeatherRecord>,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

/// How a refresh ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Records replaced with `count` fresh entries.
    Applied { generation: u64, count: usize },
    /// A city failed; records kept, error slot set.
    Failed { generation: u64, error: FetchError },
    /// A newer refresh was dispatched meanwhile; result dropped.
    Superseded { generation: u64 },
}

impl RefreshOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            RefreshOutcome::Applied { generation, .. }
            | RefreshOutcome::Failed { generation, .. }
            | RefreshOutcome::Superseded { generation } => *generation,
        }
    }
}

#[derive(Debug, Default)]
struct SyncState {
    /// (tracked name, record) in dispatch order
    entries: Vec<(String, CityWeatherRecord)>,
    pending: usize,
    last_error: Option<String>,
}

/// Decrements the in-flight count when an operation ends or is dropped.
struct PendingGuard<'a> {
    state: &'a RwLock<SyncState>,
}

impl<'a> PendingGuard<'a> {
    fn start(state: &'a RwLock<SyncState>) -> Self {
        state.write().pending += 1;
        Self { state }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.write();
        state.pending = state.pending.saturating_sub(1);
    }
}

pub struct CityDataSynchronizer<S: WeatherSource> {
    source: Arc<S>,
    state: RwLock<SyncState>,
    generation: AtomicU64,
}

impl<S: WeatherSource> CityDataSynchronizer<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            state: RwLock::new(SyncState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Generation of the most recently dispatched refresh (0 before the first).
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Make any refresh dispatched so far finish as `Superseded`.
    fn invalidate_in_flight(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Fetch every city in `cities` concurrently and replace the records.
    pub async fn refresh_all(&self, cities: &[String]) -> RefreshOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _pending = PendingGuard::start(&self.state);
        self.state.write().last_error = None;

        tracing::debug!(generation, count = cities.len(), "Refreshing cities");

        let result = try_join_all(cities.iter().map(|city| async move {
            let record = self.source.fetch_city_data(city).await?;
            Ok::<_, FetchError>((city.clone(), record))
        }))
        .await;

        if self.current_generation() != generation {
            tracing::debug!(generation, "Discarding superseded refresh");
            return RefreshOutcome::Superseded { generation };
        }

        let mut state = self.state.write();
        match result {
            Ok(entries) => {
                let count = entries.len();
                state.entries = entries;
                tracing::info!(generation, count, "Refresh applied");
                RefreshOutcome::Applied { generation, count }
            }
            Err(error) => {
                tracing::error!(generation, "Refresh failed: {}", error);
                state.last_error = Some(error.to_string());
                RefreshOutcome::Failed { generation, error }
            }
        }
    }

    /// Validate and fetch one new city, appending its record on success.
    ///
    /// The caller owns `cities` and must append the name itself once this
    /// succeeds. Validation failures touch no state and make no requests.
    pub async fn add_city(
        &self,
        name: &str,
        cities: &TrackedCityList,
    ) -> Result<CityWeatherRecord, AppError> {
        let name = cities.validate_new(name)?;

        let _pending = PendingGuard::start(&self.state);
        self.state.write().last_error = None;

        match self.source.fetch_city_data(&name).await {
            Ok(record) => {
                self.invalidate_in_flight();
                let mut state = self.state.write();
                state.entries.retain(|(key, _)| key != &name);
                state.entries.push((name.clone(), record.clone()));
                tracing::info!("Added city {}", name);
                Ok(record)
            }
            Err(e) => {
                tracing::warn!("Failed to add city {}: {}", name, e);
                self.state.write().last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Post a message into the shared error slot.
    pub fn set_error(&self, message: impl Into<String>) {
        self.state.write().last_error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.state.write().last_error = None;
    }

    /// Drop records for cities no longer tracked.
    pub fn retain_cities(&self, cities: &TrackedCityList) {
        self.invalidate_in_flight();
        self.state
            .write()
            .entries
            .retain(|(key, _)| cities.contains(key));
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let state = self.state.read();
        SyncSnapshot {
            records: state.entries.iter().map(|(_, r)| r.clone()).collect(),
            is_loading: state.pending > 0,
            last_error: state.last_error.clone(),
        }
    }

    pub fn records(&self) -> Vec<CityWeatherRecord> {
        self.snapshot().records
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().pending > 0
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// Record for a tracked city, matched by tracked name or reported name.
    pub fn record_for(&self, city: &str) -> Option<CityWeatherRecord> {
        self.state
            .read()
            .entries
            .iter()
            .find(|(key, record)| key == city || record.city_name() == city)
            .map(|(_, r)| r.clone())
    }

    /// Records the grid shows under `filter`.
    pub fn records_for_filter(&self, filter: &CityFilter) -> Vec<CityWeatherRecord> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|(key, record)| filter.matches(key) || filter.matches(record.city_name()))
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, ScriptedSource};
    use aether_core::ValidationError;
    use std::time::Duration;

    fn names(cities: &[&str]) -> Vec<String> {
        cities.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source.clone());

        sync.refresh_all(&names(&["Paris"])).await;
        assert_eq!(sync.records().len(), 1);

        let outcome = sync.refresh_all(&names(&["Seoul", "Tokyo"])).await;
        assert_eq!(outcome, RefreshOutcome::Applied { generation: 2, count: 2 });

        let records = sync.records();
        assert_eq!(records, vec![record("Seoul", 20.0), record("Tokyo", 20.0)]);
        assert!(!sync.is_loading());
        assert_eq!(sync.last_error(), None);
    }

    #[tokio::test]
    async fn test_refresh_order_follows_dispatch_order() {
        let source = Arc::new(ScriptedSource::new());
        source.delay("Seoul", Duration::from_millis(50));
        let sync = CityDataSynchronizer::new(source);

        sync.refresh_all(&names(&["Seoul", "Tokyo", "Lima"])).await;
        let order: Vec<String> = sync
            .records()
            .iter()
            .map(|r| r.city_name().to_string())
            .collect();
        assert_eq!(order, ["Seoul", "Tokyo", "Lima"]);
    }

    #[tokio::test]
    async fn test_refresh_is_all_or_nothing() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source.clone());

        sync.refresh_all(&names(&["Seoul", "Tokyo", "Lima"])).await;
        let before = sync.records();

        source.set_temperature(31.0);
        source.fail(
            "Tokyo",
            FetchError::Timeout {
                city: "Tokyo".into(),
            },
        );

        let outcome = sync.refresh_all(&names(&["Seoul", "Tokyo", "Lima"])).await;
        assert!(matches!(outcome, RefreshOutcome::Failed { generation: 2, .. }));
        assert_eq!(sync.records(), before);
        assert_eq!(sync.last_error().as_deref(), Some("Request timeout for Tokyo"));
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_clears_previous_error_on_success() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source);

        sync.set_error("At least one city must remain");
        sync.refresh_all(&names(&["Seoul"])).await;
        assert_eq!(sync.last_error(), None);
    }

    #[tokio::test]
    async fn test_superseded_refresh_is_discarded() {
        let source = Arc::new(ScriptedSource::new());
        source.delay("Seoul", Duration::from_millis(200));
        let sync = Arc::new(CityDataSynchronizer::new(source));

        let slow = {
            let sync = sync.clone();
            tokio::spawn(async move { sync.refresh_all(&names(&["Seoul", "Tokyo"])).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = sync.refresh_all(&names(&["Tokyo"])).await;
        assert_eq!(fast, RefreshOutcome::Applied { generation: 2, count: 1 });
        assert!(sync.is_loading());

        let slow = slow.await.unwrap();
        assert_eq!(slow, RefreshOutcome::Superseded { generation: 1 });
        assert_eq!(sync.records(), vec![record("Tokyo", 20.0)]);
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn test_add_city_appends_record() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source.clone());
        let cities = TrackedCityList::new(["Seoul"]).unwrap();
        sync.refresh_all(cities.as_slice()).await;

        let added = sync.add_city(" Paris ", &cities).await.unwrap();
        assert_eq!(added, record("Paris", 20.0));
        assert_eq!(sync.records(), vec![record("Seoul", 20.0), record("Paris", 20.0)]);
        assert_eq!(source.calls("Paris"), 1);
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn test_add_duplicate_makes_no_request() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source.clone());
        let cities = TrackedCityList::new(["Seoul"]).unwrap();

        let err = sync.add_city("Seoul", &cities).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::DuplicateCity(ref c)) if c == "Seoul"
        ));

        let err = sync.add_city("   ", &cities).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::EmptyCityName)));

        assert_eq!(source.total_calls(), 0);
        assert_eq!(sync.snapshot(), SyncSnapshot::default());
    }

    #[tokio::test]
    async fn test_add_city_failure_keeps_records() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source.clone());
        let cities = TrackedCityList::new(["Seoul"]).unwrap();
        sync.refresh_all(cities.as_slice()).await;

        source.fail(
            "Atlantis",
            FetchError::Server {
                city: "Atlantis".into(),
                status: 404,
                message: "city not found".into(),
            },
        );

        let err = sync.add_city("Atlantis", &cities).await.unwrap_err();
        assert!(!err.is_validation());
        assert_eq!(sync.records(), vec![record("Seoul", 20.0)]);
        assert_eq!(
            sync.last_error().as_deref(),
            Some("Failed to fetch data for Atlantis: city not found")
        );
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn test_retain_cities_prunes_removed() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source);
        let mut cities = TrackedCityList::new(["Seoul", "Tokyo"]).unwrap();
        sync.refresh_all(cities.as_slice()).await;

        cities.remove("Seoul").unwrap();
        sync.retain_cities(&cities);
        assert_eq!(sync.records(), vec![record("Tokyo", 20.0)]);
    }

    #[tokio::test]
    async fn test_removal_supersedes_refresh_in_flight() {
        let source = Arc::new(ScriptedSource::new());
        source.delay("Seoul", Duration::from_millis(100));
        let sync = Arc::new(CityDataSynchronizer::new(source));
        let mut cities = TrackedCityList::new(["Seoul", "Tokyo"]).unwrap();

        let in_flight = {
            let sync = sync.clone();
            let cities = cities.as_slice().to_vec();
            tokio::spawn(async move { sync.refresh_all(&cities).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        cities.remove("Seoul").unwrap();
        sync.retain_cities(&cities);

        let outcome = in_flight.await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Superseded { generation: 1 });
        assert!(sync.records().is_empty());
    }

    #[tokio::test]
    async fn test_records_for_filter() {
        let source = Arc::new(ScriptedSource::new());
        let sync = CityDataSynchronizer::new(source);
        sync.refresh_all(&names(&["Seoul", "Tokyo"])).await;

        assert_eq!(sync.records_for_filter(&CityFilter::All).len(), 2);
        assert_eq!(
            sync.records_for_filter(&CityFilter::City("Tokyo".into())),
            vec![record("Tokyo", 20.0)]
        );
        assert!(sync
            .records_for_filter(&CityFilter::City("Lima".into()))
            .is_empty());
        assert_eq!(sync.record_for("Seoul"), Some(record("Seoul", 20.0)));
    }

    #[tokio::test]
    async fn test_dropped_refresh_clears_loading() {
        let source = Arc::new(ScriptedSource::new());
        source.delay("Seoul", Duration::from_secs(5));
        let sync = CityDataSynchronizer::new(source);

        let cities = names(&["Seoul"]);
        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), sync.refresh_all(&cities)).await;
        assert!(timed_out.is_err());
        assert!(!sync.is_loading());
    }
}
