//! Refresh Scheduler State Machine
//!
//! Synchronous transitions for the countdown, the loading flags and the last
//! error. The driver owns the timer and the in-flight fetch and applies the
//! returned `TimerAction`s.

use tracing::{debug, info, warn};

use crate::interval::RefreshInterval;

/// What started a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Startup load or explicit user reload (`is_loading`)
    Foreground,
    /// Countdown expiry (`is_auto_updating`)
    Background,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Foreground => "foreground",
            FetchKind::Background => "background",
        }
    }
}

/// Required change to the one-second timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Leave the current timer as is
    Keep,
    /// Replace the timer with a fresh one (first tick one second from now)
    Arm,
    /// Cancel the timer
    Disarm,
}

/// Result of one timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A fetch is in flight or no interval is active
    Suppressed,
    /// Countdown decremented to the contained value
    Counted(u32),
    /// Countdown expired; a background fetch has been marked as started
    FetchDue,
}

/// Scheduler state shared with the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    interval: RefreshInterval,
    countdown: u32,
    is_loading: bool,
    is_auto_updating: bool,
    last_error: Option<String>,
}

impl SchedulerState {
    /// Create the state with no timer armed and no fetch started
    pub fn new() -> Self {
        Self {
            interval: RefreshInterval::Manual,
            countdown: 0,
            is_loading: false,
            is_auto_updating: false,
            last_error: None,
        }
    }

    /// Replace the refresh interval
    ///
    /// Always cancels the pending timer. A non-manual interval restarts the
    /// countdown and needs a fresh timer.
    pub fn select_interval(&mut self, interval: RefreshInterval) -> TimerAction {
        info!("Refresh interval set to {}", interval);
        self.interval = interval;

        match interval.seconds() {
            Some(seconds) => {
                self.countdown = seconds;
                TimerAction::Arm
            }
            None => {
                self.countdown = 0;
                TimerAction::Disarm
            }
        }
    }

    /// Whether a fetch is in flight
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_auto_updating
    }

    /// Mark a fetch as started
    ///
    /// Returns `false` without changing anything when another fetch is in
    /// flight, so at most one fetch is ever outstanding.
    pub fn begin_fetch(&mut self, kind: FetchKind) -> bool {
        if self.is_busy() {
            debug!("Fetch already in flight, ignoring {} request", kind.as_str());
            return false;
        }

        match kind {
            FetchKind::Foreground => self.is_loading = true,
            FetchKind::Background => self.is_auto_updating = true,
        }
        self.last_error = None;
        true
    }

    /// Handle one timer tick
    pub fn on_tick(&mut self) -> TickOutcome {
        if self.is_busy() || self.interval.is_manual() {
            return TickOutcome::Suppressed;
        }

        if self.countdown <= 1 {
            debug!("Countdown expired, starting background fetch");
            self.begin_fetch(FetchKind::Background);
            TickOutcome::FetchDue
        } else {
            self.countdown -= 1;
            TickOutcome::Counted(self.countdown)
        }
    }

    /// Apply the outcome of a finished fetch
    ///
    /// Flags are cleared and the countdown restarts from the interval active
    /// now. A failure stores the message and drops to manual mode.
    pub fn complete_fetch(&mut self, error: Option<String>) -> TimerAction {
        self.is_loading = false;
        self.is_auto_updating = false;

        if let Some(seconds) = self.interval.seconds() {
            self.countdown = seconds;
        }

        match error {
            Some(message) => {
                warn!("Fetch failed, disabling auto refresh: {}", message);
                self.last_error = Some(message);
                self.select_interval(RefreshInterval::Manual)
            }
            None => TimerAction::Keep,
        }
    }

    pub fn interval(&self) -> RefreshInterval {
        self.interval
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_auto_updating(&self) -> bool {
        self.is_auto_updating
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}
