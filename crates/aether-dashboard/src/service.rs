//! Dashboard service: the tracked city list, the synchronizer, the view
//! selection and the theme, plus the periodic refresh task.
//!
//! Refreshes run on the tokio runtime, at most one background refresh at a
//! time. A timer tick that fires while one is in flight is skipped. A
//! city-list change during a refresh queues a single follow-up pass over the
//! new list.

use std::sync::Arc;
use std::time::Duration;

use aether_core::{AppError, Config, DashboardConfig, Theme, ThemeProvider};
use aether_weather::{CityWeatherRecord, WeatherClient, WeatherSource};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::city_list::TrackedCityList;
use crate::synchronizer::{CityDataSynchronizer, RefreshOutcome, SyncSnapshot};
use crate::view::{CityFilter, TabActivation, ViewSelection};

/// Notifications for whoever renders the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    RefreshFinished(RefreshSummary),
    CityAdded(String),
    CityRemoved(String),
    /// A message was posted into the shared error slot.
    ErrorPosted(String),
    ThemeChanged(Theme),
}

/// Outcome of one refresh, without the error details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSummary {
    Applied { generation: u64, count: usize },
    Failed { generation: u64, message: String },
    Superseded { generation: u64 },
}

impl From<&RefreshOutcome> for RefreshSummary {
    fn from(outcome: &RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Applied { generation, count } => RefreshSummary::Applied {
                generation: *generation,
                count: *count,
            },
            RefreshOutcome::Failed { generation, error } => RefreshSummary::Failed {
                generation: *generation,
                message: error.to_string(),
            },
            RefreshOutcome::Superseded { generation } => RefreshSummary::Superseded {
                generation: *generation,
            },
        }
    }
}

/// Receive the next event, skipping over any the receiver fell behind on.
///
/// Returns `None` once the dashboard and every task holding its sender are gone.
pub async fn recv_event(rx: &mut broadcast::Receiver<DashboardEvent>) -> Option<DashboardEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event receiver lagged, {} events dropped", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Background refresh bookkeeping.
#[derive(Debug, Default)]
struct DispatchState {
    running: bool,
    /// The city list changed while `running`; refresh once more afterwards.
    rerun: bool,
}

/// Everything needed to run one refresh from a spawned task.
struct RefreshContext<S: WeatherSource> {
    synchronizer: Arc<CityDataSynchronizer<S>>,
    cities: Arc<RwLock<TrackedCityList>>,
    events: broadcast::Sender<DashboardEvent>,
    cancel: CancellationToken,
    dispatch: Arc<Mutex<DispatchState>>,
}

impl<S: WeatherSource> Clone for RefreshContext<S> {
    fn clone(&self) -> Self {
        Self {
            synchronizer: self.synchronizer.clone(),
            cities: self.cities.clone(),
            events: self.events.clone(),
            cancel: self.cancel.clone(),
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<S: WeatherSource + 'static> RefreshContext<S> {
    async fn run(&self) -> Option<RefreshOutcome> {
        let cities = self.cities.read().as_slice().to_vec();

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!("Refresh cancelled by shutdown");
                return None;
            }
            outcome = self.synchronizer.refresh_all(&cities) => outcome,
        };

        let _ = self
            .events
            .send(DashboardEvent::RefreshFinished(RefreshSummary::from(&outcome)));
        Some(outcome)
    }

    /// Start a background refresh unless one is already running.
    ///
    /// While one runs, a timer tick is dropped and a list change is
    /// remembered, so the running refresh is followed by one more pass.
    fn request(&self, list_changed: bool) {
        {
            let mut dispatch = self.dispatch.lock();
            if dispatch.running {
                if list_changed {
                    dispatch.rerun = true;
                } else {
                    tracing::debug!("Refresh still in flight, skipping tick");
                }
                return;
            }
            dispatch.running = true;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime; refresh not dispatched");
            *self.dispatch.lock() = DispatchState::default();
            return;
        };

        let ctx = self.clone();
        handle.spawn(async move {
            loop {
                if ctx.run().await.is_none() {
                    *ctx.dispatch.lock() = DispatchState::default();
                    break;
                }
                if !ctx.take_rerun() {
                    break;
                }
            }
        });
    }

    /// Consume a queued rerun, or mark the background refresh finished.
    fn take_rerun(&self) -> bool {
        let mut dispatch = self.dispatch.lock();
        let rerun = std::mem::take(&mut dispatch.rerun);
        dispatch.running = rerun;
        rerun
    }
}

pub struct Dashboard<S: WeatherSource + 'static = WeatherClient> {
    ctx: RefreshContext<S>,
    view: RwLock<ViewSelection>,
    theme: Arc<ThemeProvider>,
    refresh_interval: Option<Duration>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Dashboard<WeatherClient> {
    /// Build a dashboard talking to the proxy named in `config`.
    pub fn connect(config: &Config, theme: Arc<ThemeProvider>) -> Result<Self, AppError> {
        let client = WeatherClient::new(&config.api.base_url, config.api.request_timeout())?;
        tracing::info!("Using weather proxy at {}", client.base_url());
        Self::new(Arc::new(client), &config.dashboard, theme)
    }
}

impl<S: WeatherSource + 'static> Dashboard<S> {
    pub fn new(
        source: Arc<S>,
        config: &DashboardConfig,
        theme: Arc<ThemeProvider>,
    ) -> Result<Self, AppError> {
        let cities = TrackedCityList::new(&config.default_cities)?;
        let (events, _) = broadcast::channel(64);

        Ok(Self {
            ctx: RefreshContext {
                synchronizer: Arc::new(CityDataSynchronizer::new(source)),
                cities: Arc::new(RwLock::new(cities)),
                events,
                cancel: CancellationToken::new(),
                dispatch: Arc::new(Mutex::new(DispatchState::default())),
            },
            view: RwLock::new(ViewSelection::new()),
            theme,
            refresh_interval: config.refresh_interval(),
            timer: Mutex::new(None),
        })
    }

    /// Start the refresh timer. The first tick fires immediately, so this
    /// also performs the initial load. With the timer disabled, only the
    /// initial load runs. Calling twice has no effect.
    pub fn start(&self) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        let Some(period) = self.refresh_interval else {
            tracing::info!("Periodic refresh disabled");
            self.ctx.request(false);
            return;
        };

        let ctx = self.ctx.clone();
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => break,
                    _ = ticker.tick() => ctx.request(false),
                }
            }
            tracing::debug!("Refresh timer stopped");
        }));
        tracing::info!("Refreshing every {:?}", period);
    }

    /// Stop the timer and drop any refresh still in flight.
    pub fn shutdown(&self) {
        tracing::info!("Dashboard shutting down");
        self.ctx.cancel.cancel();
        self.timer.lock().take();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.ctx.events.subscribe()
    }

    fn emit(&self, event: DashboardEvent) {
        let _ = self.ctx.events.send(event);
    }

    /// Refresh all tracked cities and wait for the result.
    ///
    /// Returns `None` if the dashboard was shut down meanwhile.
    pub async fn refresh_now(&self) -> Option<RefreshOutcome> {
        self.ctx.run().await
    }

    /// Fetch a new city and, on success, start tracking it.
    pub async fn add_city(&self, name: &str) -> Result<CityWeatherRecord, AppError> {
        let cities = self.ctx.cities.read().clone();

        match self.ctx.synchronizer.add_city(name, &cities).await {
            Ok(record) => {
                let name = name.trim();
                if let Err(e) = self.ctx.cities.write().add(name) {
                    // Another add of the same name finished first
                    tracing::debug!("City list unchanged: {}", e);
                }
                self.emit(DashboardEvent::CityAdded(name.to_string()));
                self.ctx.request(true);
                Ok(record)
            }
            Err(e) => {
                if e.is_validation() {
                    self.set_error(e.to_string());
                } else {
                    self.emit(DashboardEvent::ErrorPosted(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Stop tracking a city. The last remaining city cannot be removed.
    pub fn remove_city(&self, name: &str) -> Result<(), AppError> {
        let removed = {
            let mut cities = self.ctx.cities.write();
            match cities.remove(name) {
                Ok(removed) => {
                    self.ctx.synchronizer.retain_cities(&cities);
                    removed
                }
                Err(e) => {
                    drop(cities);
                    self.set_error(e.to_string());
                    return Err(e.into());
                }
            }
        };

        if removed {
            self.view.write().on_city_removed(name);
            self.emit(DashboardEvent::CityRemoved(name.to_string()));
            self.ctx.request(true);
        }
        Ok(())
    }

    /// Post a message into the shared error slot.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.ctx.synchronizer.set_error(message.clone());
        self.emit(DashboardEvent::ErrorPosted(message));
    }

    pub fn clear_error(&self) {
        self.ctx.synchronizer.clear_error();
    }

    pub fn cities(&self) -> Vec<String> {
        self.ctx.cities.read().as_slice().to_vec()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.ctx.synchronizer.snapshot()
    }

    pub fn view(&self) -> ViewSelection {
        self.view.read().clone()
    }

    /// Records the grid shows under the current filter.
    pub fn visible_records(&self) -> Vec<CityWeatherRecord> {
        let filter = self.view.read().selected_filter().clone();
        self.ctx.synchronizer.records_for_filter(&filter)
    }

    pub fn select_filter(&self, filter: CityFilter) {
        self.view.write().select_filter(filter);
    }

    pub fn open_detail(&self, record: CityWeatherRecord) {
        self.view.write().open_detail(record);
    }

    /// Open the detail view for a tracked city; false if it has no record yet.
    pub fn open_detail_for(&self, city: &str) -> bool {
        let sync = &self.ctx.synchronizer;
        self.view.write().open_detail_for(city, |c| sync.record_for(c))
    }

    pub fn close_detail(&self) {
        self.view.write().close_detail();
    }

    pub fn activate_city_tab(&self, city: &str) -> TabActivation {
        let sync = &self.ctx.synchronizer;
        self.view
            .write()
            .activate_city_tab(city, |c| sync.record_for(c))
    }

    pub fn theme(&self) -> Theme {
        self.theme.theme()
    }

    /// Flip the theme. The new value is persisted by the provider.
    pub fn toggle_theme(&self) -> Result<Theme, AppError> {
        let theme = self.theme.toggle()?;
        self.emit(DashboardEvent::ThemeChanged(theme));
        Ok(theme)
    }
}

impl<S: WeatherSource + 'static> Drop for Dashboard<S> {
    fn drop(&mut self) {
        self.ctx.cancel.cancel();
    }
}
