//! Measurement Normalization
//!
//! Maps backend rows into display-ready measurements. Failures are recovered
//! locally: a bad location becomes the sentinel, null columns take their
//! defaults, a row without a usable `id` is skipped and a non-array payload
//! becomes an empty batch. None of these ever fails the batch.

use serde_json::Value;
use tracing::{debug, warn};

use crate::measurement::{Location, NormalizedMeasurement, RawMeasurement};

/// Prefix for derived stop identifiers
pub const DEFAULT_STOP_ID_PREFIX: &str = "paradero-";

/// Normalizer for backend measurement rows
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Text placed before the zero-padded id
    stop_id_prefix: String,
}

impl Normalizer {
    /// Create a normalizer with a custom stop id prefix
    pub fn new(stop_id_prefix: impl Into<String>) -> Self {
        Self {
            stop_id_prefix: stop_id_prefix.into(),
        }
    }

    /// Derive the stop id: prefix plus the id padded to at least 3 digits
    pub fn stop_id(&self, id: u64) -> String {
        format!("{}{:03}", self.stop_id_prefix, id)
    }

    /// Resolve a raw location value into coordinates
    pub fn location(&self, raw: &Value) -> Location {
        let parsed;
        let candidate = match raw {
            Value::String(text) if !text.is_empty() => match serde_json::from_str::<Value>(text) {
                Ok(value) => {
                    parsed = value;
                    &parsed
                }
                Err(e) => {
                    warn!("Failed to parse location JSON {:?}: {}", text, e);
                    return Location::SENTINEL;
                }
            },
            Value::Object(_) => raw,
            _ => {
                debug!("Location missing, using sentinel");
                return Location::SENTINEL;
            }
        };

        match coordinates(candidate) {
            Some(location) => location,
            None => {
                debug!("Location {} lacks numeric lat/lng, using sentinel", candidate);
                Location::SENTINEL
            }
        }
    }

    /// Normalize a single row
    pub fn normalize(&self, raw: RawMeasurement) -> NormalizedMeasurement {
        NormalizedMeasurement {
            stop_id: self.stop_id(raw.id),
            location: self.location(&raw.location),
            id: raw.id,
            person_count: raw.person_count,
            status: raw.status,
            sensor1_distance: raw.sensor1_distance,
            sensor2_distance: raw.sensor2_distance,
            timestamp: raw.timestamp,
            recommendation: raw.recommendation,
        }
    }

    /// Normalize a full response body, keeping backend order
    ///
    /// Rows are decoded one by one. A row that has no usable `id` (or is not
    /// an object) cannot become a measurement and is skipped with a warning;
    /// the rest of the batch is kept.
    pub fn normalize_batch(&self, payload: Value) -> Vec<NormalizedMeasurement> {
        let rows = match payload {
            Value::Array(rows) => rows,
            other => {
                warn!(
                    "Backend response is not an array, treating it as empty: {}",
                    other
                );
                return Vec::new();
            }
        };

        if rows.is_empty() {
            warn!("Backend returned an empty list; check that the table has data and that its read policy allows public access");
            return Vec::new();
        }

        rows.into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value::<RawMeasurement>(row) {
                Ok(raw) => Some(self.normalize(raw)),
                Err(e) => {
                    warn!("Skipping undecodable row {}: {}", index, e);
                    None
                }
            })
            .collect()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_ID_PREFIX)
    }
}

fn coordinates(value: &Value) -> Option<Location> {
    let lat = value.get("lat")?.as_f64()?;
    let lng = value.get("lng")?.as_f64()?;
    Some(Location { lat, lng })
}
