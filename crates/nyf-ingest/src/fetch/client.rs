//! HTTP client for the markets data API

use reqwest::{Client, StatusCode};
use serde_json::Value as Json;
use std::time::Duration;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::range::{DateRange, DATE_FORMAT};

// ============================================================================
// API Client Constants
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "https://markets.newyorkfed.org/api";

/// Per-request timeout; there is no other cancellation
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const USER_AGENT: &str = concat!("nyf-ingest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IngestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `startDate`/`endDate` query parameters for a range
    pub fn range_query(range: DateRange) -> Vec<(&'static str, String)> {
        vec![
            ("startDate", range.start().format(DATE_FORMAT).to_string()),
            ("endDate", range.end().format(DATE_FORMAT).to_string()),
        ]
    }

    /// GET a JSON document. Malformed JSON is a non-retryable fetch error.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Json> {
        let url = self.url(path);
        let body = self.get_text(path, query).await?;
        serde_json::from_str(&body)
            .map_err(|e| IngestError::fetch(format!("Malformed JSON from {}: {}", url, e)))
    }

    /// GET a text body (JSON or CSV)
    pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = self.url(path);
        debug!(url = %url, query = ?query, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify_transport(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&url, status));
        }

        response.text().await.map_err(|e| classify_transport(&url, e))
    }
}

fn classify_status(url: &str, status: StatusCode) -> IngestError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        IngestError::transient(url, format!("HTTP {}", status))
    } else {
        IngestError::fetch(format!("HTTP {} from {}", status, url))
    }
}

fn classify_transport(url: &str, err: reqwest::Error) -> IngestError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        IngestError::transient(url, err)
    } else {
        IngestError::fetch(format!("Request to {} failed: {}", url, err))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = ApiClient::new("https://example.test/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.url("/rates/all/search.json"), "https://example.test/api/rates/all/search.json");
    }

    #[test]
    fn test_range_query() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 30).unwrap(),
        )
        .unwrap();
        assert_eq!(
            ApiClient::range_query(range),
            vec![
                ("startDate", "2024-01-01".to_string()),
                ("endDate", "2024-03-30".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_get_json_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fxs/all/search.json"))
            .and(query_param("startDate", "2024-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"fxSwaps":{"operations":[]}}"#))
            .mount(&server)
            .await;

        let body = client(&server)
            .get_json("fxs/all/search.json", &[("startDate", "2024-01-01".to_string())])
            .await
            .unwrap();
        assert_eq!(body["fxSwaps"]["operations"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).get_text("anything", &[]).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_client_error_is_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).get_text("missing", &[]).await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_malformed_json_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server).get_json("broken", &[]).await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch(msg) if msg.contains("Malformed JSON")));
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri(), Duration::from_millis(50)).unwrap();
        let err = api.get_text("slow", &[]).await.unwrap_err();
        assert!(err.is_transient());
    }
}
