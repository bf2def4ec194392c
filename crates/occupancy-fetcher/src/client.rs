//! Backend Client for the Measurements Table
//!
//! Issues one `GET` against the table's REST endpoint per fetch and hands the
//! body to the normalizer.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::FetchError;
use crate::measurement::NormalizedMeasurement;
use crate::normalizer::Normalizer;

/// Default number of measurements requested per fetch
pub const DEFAULT_FETCH_LIMIT: usize = 100;

/// Default request timeout
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Connection settings for the measurements backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project base URL, without the `/rest/v1` suffix
    pub base_url: String,
    /// Publishable key, sent as both `apikey` and bearer token
    pub api_key: String,
    /// Table holding the measurements
    pub table: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            table: "paradero_mediciones".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Anything that can produce the latest normalized measurements
pub trait MeasurementSource: Send + Sync + 'static {
    /// Fetch the `count` most recent measurements, newest first
    fn fetch_latest(
        &self,
        count: usize,
    ) -> impl Future<Output = Result<Vec<NormalizedMeasurement>, FetchError>> + Send;
}

/// HTTP client for the measurements table
pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
    normalizer: Normalizer,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(config: BackendConfig) -> Result<Self, FetchError> {
        Self::with_normalizer(config, Normalizer::default())
    }

    /// Create a client with a custom normalizer
    pub fn with_normalizer(config: BackendConfig, normalizer: Normalizer) -> Result<Self, FetchError> {
        info!(
            "Creating backend client for {} (table {})",
            config.base_url, config.table
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| FetchError::Unexpected {
                detail: e.to_string(),
            })?;

        Ok(Self {
            http,
            config,
            normalizer,
        })
    }

    /// Table endpoint URL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    /// Configured table name
    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// Fetch and normalize the latest `count` measurements
    pub async fn fetch_measurements(
        &self,
        count: usize,
    ) -> Result<Vec<NormalizedMeasurement>, FetchError> {
        let limit = count.to_string();
        debug!("Requesting {} measurements from {}", count, self.endpoint());

        let response = self
            .http
            .get(self.endpoint())
            .query(&[
                ("select", "*"),
                ("order", "timestamp.desc"),
                ("limit", limit.as_str()),
            ])
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()
            .map_err(|e| self.classify(e))?;

        let payload: Value = response.json().await.map_err(|e| self.classify(e))?;
        debug!("Raw backend payload: {}", payload);

        Ok(self.normalizer.normalize_batch(payload))
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        error!("Backend request failed: {}", err);
        match err.status() {
            Some(status) => FetchError::from_status(status.as_u16(), &self.config.table, err.to_string()),
            None => FetchError::Unexpected {
                detail: err.to_string(),
            },
        }
    }
}

impl MeasurementSource for BackendClient {
    fn fetch_latest(
        &self,
        count: usize,
    ) -> impl Future<Output = Result<Vec<NormalizedMeasurement>, FetchError>> + Send {
        self.fetch_measurements(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::Location;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    const KEY: &str = "sb_publishable_test";
    const TABLE: &str = "paradero_mediciones";

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> BackendClient {
        BackendClient::new(BackendConfig {
            base_url,
            api_key: KEY.to_string(),
            table: TABLE.to_string(),
            timeout_ms: 2_000,
        })
        .unwrap()
    }

    fn status_backend(status: StatusCode) -> Router {
        Router::new().route(
            "/rest/v1/paradero_mediciones",
            get(move || async move { (status, Json(json!({"message": "nope"}))) }),
        )
    }

    async fn measurements(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        let expected_bearer = format!("Bearer {}", KEY);
        let authorized = headers.get("apikey").map(|v| v.as_bytes()) == Some(KEY.as_bytes())
            && headers.get("authorization").map(|v| v.as_bytes())
                == Some(expected_bearer.as_bytes());
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad key"})));
        }

        let query_ok = params.get("select").map(String::as_str) == Some("*")
            && params.get("order").map(String::as_str) == Some("timestamp.desc");
        if !query_ok {
            return (StatusCode::BAD_REQUEST, Json(json!({"message": "bad query"})));
        }

        let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(0);
        let rows: Vec<Value> = (0..limit.min(3) as u64)
            .map(|i| {
                let status = ["normal", "moderate", "congested"][i as usize];
                let location = if i == 0 {
                    json!("{\"lat\": -33.4, \"lng\": -70.6}")
                } else {
                    Value::Null
                };
                json!({
                    "id": 12 - i,
                    "person_count": i * 4,
                    "status": status,
                    "sensor1_distance": 100.0,
                    "sensor2_distance": 90.0,
                    "location": location,
                    "timestamp": format!("2024-05-01T12:00:0{}+00:00", 9 - i),
                    "recommendation": "ok"
                })
            })
            .collect();
        (StatusCode::OK, Json(Value::Array(rows)))
    }

    #[tokio::test]
    async fn test_fetch_sends_credentials_and_normalizes() {
        let router = Router::new().route("/rest/v1/paradero_mediciones", get(measurements));
        let client = client_for(spawn_backend(router).await);

        let batch = client.fetch_latest(DEFAULT_FETCH_LIMIT).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].stop_id, "paradero-012");
        assert_eq!(batch[0].location, Location { lat: -33.4, lng: -70.6 });
        assert!(batch[1].location.is_sentinel());
        assert_eq!(batch[2].stop_id, "paradero-010");
    }

    #[tokio::test]
    async fn test_fetch_respects_limit() {
        let router = Router::new().route("/rest/v1/paradero_mediciones", get(measurements));
        let client = client_for(spawn_backend(router).await);

        let batch = client.fetch_latest(1).await.unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_key_is_authorization_error() {
        let router = Router::new().route("/rest/v1/paradero_mediciones", get(measurements));
        let base_url = spawn_backend(router).await;
        let client = BackendClient::new(BackendConfig {
            base_url,
            api_key: "wrong".to_string(),
            table: TABLE.to_string(),
            timeout_ms: 2_000,
        })
        .unwrap();

        let err = client.fetch_latest(10).await.unwrap_err();
        assert_eq!(err, FetchError::Unauthorized { status: 401 });
    }

    #[tokio::test]
    async fn test_forbidden_is_authorization_error() {
        let client = client_for(spawn_backend(status_backend(StatusCode::FORBIDDEN)).await);
        let err = client.fetch_latest(10).await.unwrap_err();
        assert_eq!(err, FetchError::Unauthorized { status: 403 });
    }

    #[tokio::test]
    async fn test_missing_table_names_table() {
        let router = Router::new().route("/rest/v1/other_table", get(measurements));
        let client = client_for(spawn_backend(router).await);

        let err = client.fetch_latest(10).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::TableNotFound {
                table: TABLE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_unexpected() {
        let client =
            client_for(spawn_backend(status_backend(StatusCode::INTERNAL_SERVER_ERROR)).await);
        let err = client.fetch_latest(10).await.unwrap_err();
        assert!(matches!(err, FetchError::Unexpected { .. }));
    }

    #[tokio::test]
    async fn test_non_array_body_is_empty_list() {
        let client = client_for(spawn_backend(status_backend(StatusCode::OK)).await);
        let batch = client.fetch_latest(10).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_null_columns_do_not_fail_fetch() {
        let router = Router::new().route(
            "/rest/v1/paradero_mediciones",
            get(|| async {
                Json(json!([
                    {"id": 1, "person_count": 2, "status": "normal", "sensor1_distance": 1.0,
                     "sensor2_distance": 2.0, "timestamp": "2024-05-01T12:00:00+00:00",
                     "recommendation": "ok"},
                    {"id": 2, "person_count": 3, "status": "moderate", "sensor1_distance": null,
                     "sensor2_distance": 2.0, "timestamp": null, "recommendation": null},
                ]))
            }),
        );
        let client = client_for(spawn_backend(router).await);

        let batch = client.fetch_latest(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].stop_id, "paradero-002");
        assert_eq!(batch[1].recommendation, "");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unexpected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr));
        let err = client.fetch_latest(10).await.unwrap_err();
        assert!(matches!(err, FetchError::Unexpected { .. }));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = client_for("https://example.supabase.co/".to_string());
        assert_eq!(
            client.endpoint(),
            "https://example.supabase.co/rest/v1/paradero_mediciones"
        );
        assert_eq!(client.table(), TABLE);
    }
}
