//! Refresh Scheduler for the Occupancy Dashboard
//!
//! Decides when to fetch, keeps the countdown to the next automatic refresh,
//! suppresses overlapping fetches and drops to manual mode after a failure.

mod driver;
mod interval;
mod scheduler;

pub use driver::{spawn, DashboardHandle, DashboardSnapshot, DriverConfig, DriverError};
pub use interval::{RefreshInterval, UnsupportedInterval};
pub use scheduler::{FetchKind, SchedulerState, TickOutcome, TimerAction};
