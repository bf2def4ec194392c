//! Bus Stop Occupancy Fetcher
//!
//! Retrieves the latest occupancy measurements from the backend table and
//! normalizes them into a display-ready shape. Transport failures are
//! classified into user-facing messages; malformed payloads and fields are
//! recovered locally.

mod client;
mod error;
mod measurement;
mod normalizer;

pub use client::{BackendClient, BackendConfig, MeasurementSource, DEFAULT_FETCH_LIMIT};
pub use error::FetchError;
pub use measurement::{Location, NormalizedMeasurement, OccupancyStatus, RawMeasurement};
pub use normalizer::{Normalizer, DEFAULT_STOP_ID_PREFIX};
