//! Occupancy Measurement Definitions
//!
//! Wire shape returned by the backend table and the canonical form handed to
//! the dashboard.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Occupancy status assigned by the backend
///
/// Values the backend may add later are kept verbatim in `Unknown` instead of
/// failing the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum OccupancyStatus {
    /// Stop is at normal occupancy
    Normal,
    /// Stop is getting busy
    Moderate,
    /// Stop is crowded
    Congested,
    /// Any value outside the known set (empty when the backend sent null)
    Unknown(String),
}

impl OccupancyStatus {
    /// Wire representation of the status
    pub fn as_str(&self) -> &str {
        match self {
            OccupancyStatus::Normal => "normal",
            OccupancyStatus::Moderate => "moderate",
            OccupancyStatus::Congested => "congested",
            OccupancyStatus::Unknown(raw) => raw,
        }
    }
}

impl From<Option<String>> for OccupancyStatus {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref() {
            Some("normal") => OccupancyStatus::Normal,
            Some("moderate") => OccupancyStatus::Moderate,
            Some("congested") => OccupancyStatus::Congested,
            _ => OccupancyStatus::Unknown(raw.unwrap_or_default()),
        }
    }
}

impl From<OccupancyStatus> for String {
    fn from(status: OccupancyStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Geographic position of a stop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Substituted whenever the backend location is absent or unparseable
    pub const SENTINEL: Location = Location { lat: 0.0, lng: 0.0 };

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::SENTINEL
    }
}

/// Measurement row as stored in the backend table
///
/// Only `id` is required. Every other column falls back to its default when
/// null or absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMeasurement {
    /// Row id, assigned by the backend
    pub id: u64,
    /// People detected at the stop
    #[serde(default, deserialize_with = "null_as_default")]
    pub person_count: u32,
    #[serde(default = "unknown_status")]
    pub status: OccupancyStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sensor1_distance: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sensor2_distance: f64,
    /// JSON-encoded string, `{lat, lng}` object, null or absent
    #[serde(default)]
    pub location: Value,
    /// ISO-8601 timestamp from the backend clock
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendation: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn unknown_status() -> OccupancyStatus {
    OccupancyStatus::Unknown(String::new())
}

/// Display-ready measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMeasurement {
    pub id: u64,
    /// Derived stop identifier (e.g. `paradero-007`)
    pub stop_id: String,
    pub person_count: u32,
    pub status: OccupancyStatus,
    pub sensor1_distance: f64,
    pub sensor2_distance: f64,
    /// Always present; `Location::SENTINEL` when the source was unusable
    pub location: Location,
    pub timestamp: String,
    pub recommendation: String,
}

impl NormalizedMeasurement {
    /// Parse the backend timestamp for display
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_status_values() {
        let status: OccupancyStatus = serde_json::from_value(json!("congested")).unwrap();
        assert_eq!(status, OccupancyStatus::Congested);
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("congested"));
    }

    #[test]
    fn test_unknown_status_is_preserved() {
        let status: OccupancyStatus = serde_json::from_value(json!("overflowing")).unwrap();
        assert_eq!(status, OccupancyStatus::Unknown("overflowing".to_string()));
        assert_eq!(status.as_str(), "overflowing");

        let status: OccupancyStatus = serde_json::from_value(Value::Null).unwrap();
        assert_eq!(status, OccupancyStatus::Unknown(String::new()));
    }

    #[test]
    fn test_raw_measurement_without_location() {
        let raw: RawMeasurement = serde_json::from_value(json!({
            "id": 4,
            "person_count": 2,
            "status": "normal",
            "sensor1_distance": 120.5,
            "sensor2_distance": 98.0,
            "timestamp": "2024-05-01T12:00:00+00:00",
            "recommendation": "Sin novedades"
        }))
        .unwrap();

        assert_eq!(raw.id, 4);
        assert!(raw.location.is_null());
    }

    #[test]
    fn test_null_columns_fall_back_to_defaults() {
        let raw: RawMeasurement = serde_json::from_value(json!({
            "id": 11,
            "person_count": null,
            "status": null,
            "sensor1_distance": null,
            "sensor2_distance": 42.0,
            "location": null,
            "timestamp": null,
            "recommendation": null
        }))
        .unwrap();

        assert_eq!(raw.id, 11);
        assert_eq!(raw.person_count, 0);
        assert_eq!(raw.status, OccupancyStatus::Unknown(String::new()));
        assert_eq!(raw.sensor1_distance, 0.0);
        assert_eq!(raw.sensor2_distance, 42.0);
        assert_eq!(raw.timestamp, "");
        assert_eq!(raw.recommendation, "");

        let bare: RawMeasurement = serde_json::from_value(json!({ "id": 12 })).unwrap();
        assert_eq!(bare.status, OccupancyStatus::Unknown(String::new()));
        assert!(bare.location.is_null());
    }

    #[test]
    fn test_parsed_timestamp() {
        let measurement = NormalizedMeasurement {
            id: 1,
            stop_id: "paradero-001".to_string(),
            person_count: 0,
            status: OccupancyStatus::Normal,
            sensor1_distance: 0.0,
            sensor2_distance: 0.0,
            location: Location::SENTINEL,
            timestamp: "2024-05-01T12:34:56.789+00:00".to_string(),
            recommendation: String::new(),
        };
        let parsed = measurement.parsed_timestamp().unwrap();
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "12:34:56");

        let garbled = NormalizedMeasurement {
            timestamp: "yesterday".to_string(),
            ..measurement
        };
        assert!(garbled.parsed_timestamp().is_none());
    }
}
