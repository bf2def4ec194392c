//! Refresh Driver
//!
//! Single task that owns the scheduler state, the one-second timer and the
//! in-flight fetch. Ticks, fetch completions and user commands are handled one
//! at a time, so the check-then-fetch in the tick handler needs no locking.

use std::sync::Arc;
use std::time::Duration;

use occupancy_fetcher::{FetchError, MeasurementSource, NormalizedMeasurement, DEFAULT_FETCH_LIMIT};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::interval::RefreshInterval;
use crate::scheduler::{FetchKind, SchedulerState, TickOutcome, TimerAction};

const TICK_PERIOD: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 16;

/// Driver errors
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Refresh driver has stopped")]
    Stopped,
}

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Measurements requested per fetch
    pub fetch_limit: usize,
    /// Interval selected at startup
    pub initial_interval: RefreshInterval,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            fetch_limit: DEFAULT_FETCH_LIMIT,
            initial_interval: RefreshInterval::ThirtySeconds,
        }
    }
}

/// Everything the presentation layer may observe
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub measurements: Arc<Vec<NormalizedMeasurement>>,
    pub interval: RefreshInterval,
    pub countdown: u32,
    pub is_loading: bool,
    pub is_auto_updating: bool,
    pub last_error: Option<String>,
}

impl DashboardSnapshot {
    fn capture(state: &SchedulerState, measurements: &Arc<Vec<NormalizedMeasurement>>) -> Self {
        Self {
            measurements: Arc::clone(measurements),
            interval: state.interval(),
            countdown: state.countdown(),
            is_loading: state.is_loading(),
            is_auto_updating: state.is_auto_updating(),
            last_error: state.last_error().map(str::to_string),
        }
    }
}

enum Command {
    SelectInterval(RefreshInterval, oneshot::Sender<()>),
    Reload(oneshot::Sender<bool>),
    Shutdown(oneshot::Sender<()>),
}

type FetchResult = Result<Vec<NormalizedMeasurement>, FetchError>;

struct InFlight {
    kind: FetchKind,
    handle: JoinHandle<FetchResult>,
}

/// Handle used by the presentation layer
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<DashboardSnapshot>,
    task: JoinHandle<()>,
}

impl DashboardHandle {
    /// Change the refresh interval; resolves once the transition is applied
    pub async fn select_interval(&self, interval: RefreshInterval) -> Result<(), DriverError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::SelectInterval(interval, ack)).await?;
        done.await.map_err(|_| DriverError::Stopped)
    }

    /// Start a foreground fetch; `false` if one was already in flight
    pub async fn reload(&self) -> Result<bool, DriverError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Reload(ack)).await?;
        done.await.map_err(|_| DriverError::Stopped)
    }

    /// Latest published state
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    /// Cancel the timer and stop the driver
    ///
    /// A fetch still in flight is left to finish on its own; its result is
    /// discarded.
    pub async fn shutdown(self) -> Result<(), DriverError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Shutdown(ack)).await?;
        done.await.map_err(|_| DriverError::Stopped)?;
        self.task.await.map_err(|_| DriverError::Stopped)
    }

    async fn send(&self, command: Command) -> Result<(), DriverError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DriverError::Stopped)
    }
}

/// Spawn the driver for `source` and start the initial load
pub fn spawn<S: MeasurementSource>(source: S, config: DriverConfig) -> DashboardHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (driver, snapshots) = RefreshDriver::new(Arc::new(source), config);
    let task = tokio::spawn(driver.run(command_rx));

    DashboardHandle {
        commands: command_tx,
        snapshots,
        task,
    }
}

struct RefreshDriver<S> {
    source: Arc<S>,
    config: DriverConfig,
    state: SchedulerState,
    measurements: Arc<Vec<NormalizedMeasurement>>,
    ticker: Option<Interval>,
    in_flight: Option<InFlight>,
    snapshots: watch::Sender<DashboardSnapshot>,
}

impl<S: MeasurementSource> RefreshDriver<S> {
    /// Build the driver in its startup state
    ///
    /// The initial interval is selected and the foreground load is marked as
    /// started before the first snapshot is published, so watchers never see
    /// an idle dashboard. The load itself is spawned by `run`.
    fn new(source: Arc<S>, config: DriverConfig) -> (Self, watch::Receiver<DashboardSnapshot>) {
        let mut state = SchedulerState::new();
        let action = state.select_interval(config.initial_interval);
        state.begin_fetch(FetchKind::Foreground);

        let measurements = Arc::new(Vec::new());
        let (snapshots, receiver) = watch::channel(DashboardSnapshot::capture(&state, &measurements));

        let mut driver = Self {
            source,
            config,
            state,
            measurements,
            ticker: None,
            in_flight: None,
            snapshots,
        };
        driver.apply_timer(action);
        (driver, receiver)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(
            "Starting refresh driver (interval {}, limit {})",
            self.config.initial_interval, self.config.fetch_limit
        );

        self.spawn_fetch(FetchKind::Foreground);

        loop {
            tokio::select! {
                _ = next_tick(&mut self.ticker) => self.on_tick(),
                (kind, result) = next_completion(&mut self.in_flight) => self.on_completion(kind, result),
                command = commands.recv() => match command {
                    Some(Command::SelectInterval(interval, ack)) => {
                        let action = self.state.select_interval(interval);
                        self.apply_timer(action);
                        self.publish();
                        let _ = ack.send(());
                    }
                    Some(Command::Reload(ack)) => {
                        let started = self.request_fetch(FetchKind::Foreground);
                        self.publish();
                        let _ = ack.send(started);
                    }
                    Some(Command::Shutdown(ack)) => {
                        self.teardown();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.teardown();
                        break;
                    }
                },
            }
            self.publish();
        }

        info!("Refresh driver stopped");
    }

    fn on_tick(&mut self) {
        match self.state.on_tick() {
            TickOutcome::FetchDue => self.spawn_fetch(FetchKind::Background),
            TickOutcome::Counted(remaining) => debug!("Next refresh in {}s", remaining),
            TickOutcome::Suppressed => {}
        }
    }

    fn on_completion(&mut self, kind: FetchKind, result: FetchResult) {
        self.in_flight = None;

        let failure = match result {
            Ok(measurements) => {
                info!(
                    "{} fetch returned {} measurements",
                    kind.as_str(),
                    measurements.len()
                );
                self.measurements = Arc::new(measurements);
                None
            }
            Err(e) => {
                error!("{} fetch failed: {:?}", kind.as_str(), e);
                metrics::counter!("dashboard_fetch_errors_total", "kind" => kind.as_str()).increment(1);
                Some(e.user_message())
            }
        };

        let action = self.state.complete_fetch(failure);
        self.apply_timer(action);
    }

    fn request_fetch(&mut self, kind: FetchKind) -> bool {
        if !self.state.begin_fetch(kind) {
            return false;
        }
        self.spawn_fetch(kind);
        true
    }

    fn spawn_fetch(&mut self, kind: FetchKind) {
        debug!("Starting {} fetch", kind.as_str());
        metrics::counter!("dashboard_fetches_total", "kind" => kind.as_str()).increment(1);

        let source = Arc::clone(&self.source);
        let limit = self.config.fetch_limit;
        let handle = tokio::spawn(async move { source.fetch_latest(limit).await });
        self.in_flight = Some(InFlight { kind, handle });
    }

    fn apply_timer(&mut self, action: TimerAction) {
        match action {
            TimerAction::Keep => {}
            TimerAction::Arm => {
                let mut ticker = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.ticker = Some(ticker);
            }
            TimerAction::Disarm => self.ticker = None,
        }
    }

    fn teardown(&mut self) {
        self.ticker = None;
        if let Some(in_flight) = self.in_flight.take() {
            debug!(
                "Detaching in-flight {} fetch, its result will be ignored",
                in_flight.kind.as_str()
            );
        }
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(DashboardSnapshot::capture(&self.state, &self.measurements));
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_completion(in_flight: &mut Option<InFlight>) -> (FetchKind, FetchResult) {
    match in_flight {
        Some(in_flight) => {
            let result = (&mut in_flight.handle).await.unwrap_or_else(|e| {
                Err(FetchError::Unexpected {
                    detail: format!("fetch task failed: {}", e),
                })
            });
            (in_flight.kind, result)
        }
        None => std::future::pending().await,
    }
}
