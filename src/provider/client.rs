//! Provider GraphQL client with retry and error classification.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, error, instrument};

use crate::config::Config;
use crate::error::ProviderError;
use crate::metrics;

use super::retry::RetryPolicy;
use super::types::Race;
use super::PageFetch;

/// GraphQL document fetching one page of today's races with markets.
const RACES_QUERY: &str = r#"
query RacesWithMarkets($dateFrom: String!, $dateTo: String!, $limit: Int!, $offset: Int!, $types: [RaceType!], $locations: [String!]) {
  races(dateFrom: $dateFrom, dateTo: $dateTo, limit: $limit, offset: $offset, types: $types, locations: $locations) {
    id
    meeting { id location track type date }
    name
    number
    status
    startTime
    runners {
      id
      name
      number
      scratchedTime
      bookmakerMarkets { bookmaker fixedWin { price lastUpdated } }
      exchangeMarkets { marketName totalMatched lay { price size } back { price size } }
    }
  }
}"#;

/// Racing-odds provider API client.
#[derive(Debug, Clone)]
pub struct BetwatchClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// GraphQL endpoint.
    url: String,
    /// API key sent on every request.
    api_key: String,
    /// Races requested per page.
    page_size: usize,
    /// Race type filter forwarded to the provider.
    race_types: Vec<String>,
    /// Location filter forwarded to the provider.
    locations: Vec<String>,
    /// Retry policy wrapping every page fetch.
    retry: RetryPolicy,
}

/// Raw GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<RacesData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct RacesData {
    #[serde(default)]
    races: Vec<Race>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

impl BetwatchClient {
    /// Create a new provider client from config with tuned HTTP settings.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .connect_timeout(std::time::Duration::from_secs(5))
            .tcp_nodelay(true)
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            url: config.betwatch_url.clone(),
            api_key: config.betwatch_api_key.clone(),
            page_size: config.page_size,
            race_types: config.target_race_types.clone(),
            locations: config.target_locations.clone(),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Get the configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the configured page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Variables for one page query: today's date range plus filters.
    fn variables(&self, offset: usize) -> Value {
        let date = OffsetDateTime::now_utc()
            .date()
            .format(&format_description!("[year]-[month]-[day]"))
            .expect("date formats");

        json!({
            "dateFrom": date,
            "dateTo": date,
            "limit": self.page_size as u64,
            "offset": offset as u64,
            "types": self.race_types,
            "locations": self.locations,
        })
    }

    /// Execute one page query without retry, classifying failures.
    async fn fetch_page_once(&self, offset: usize) -> Result<Vec<Race>, ProviderError> {
        let started = Instant::now();
        let payload = json!({ "query": RACES_QUERY, "variables": self.variables(offset) });

        let response = self
            .http
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .json(&payload)
            .send()
            .await?;
        metrics::record_page_fetch_latency(started);

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Authentication(format!("HTTP {status}")));
        }
        if status.is_client_error() {
            return Err(ProviderError::Client {
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(ProviderError::Server {
                status: status.as_u16(),
            });
        }

        let body: GraphQlResponse = response.json().await?;

        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            error!(offset, errors = ?messages, "provider rejected the query");
            return Err(classify_query_errors(messages));
        }

        let data = body
            .data
            .ok_or_else(|| ProviderError::Malformed("response missing data field".to_string()))?;

        debug!(offset, races = data.races.len(), "page fetched");
        Ok(data.races)
    }
}

/// Classify provider-reported query errors, surfacing embedded auth failures.
fn classify_query_errors(messages: Vec<String>) -> ProviderError {
    if messages
        .iter()
        .any(|m| m.to_ascii_lowercase().contains("authentication failed"))
    {
        ProviderError::Authentication(messages.join("; "))
    } else {
        ProviderError::Query(messages)
    }
}

#[async_trait]
impl PageFetch for BetwatchClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, offset: usize) -> Result<Vec<Race>, ProviderError> {
        let result = self
            .retry
            .run("races page", || self.fetch_page_once(offset))
            .await;
        if result.is_err() {
            metrics::inc_fetch_failures();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn client_creation_works() {
        let client = BetwatchClient::new(&test_config());
        assert_eq!(client.url(), "https://api.betwatch.com/query");
        assert_eq!(client.page_size(), 95);
    }

    #[test]
    fn variables_carry_filters_and_offset() {
        let client = BetwatchClient::new(&test_config());
        let vars = client.variables(190);

        assert_eq!(vars["limit"], 95);
        assert_eq!(vars["offset"], 190);
        assert_eq!(vars["dateFrom"], vars["dateTo"]);
        assert!(vars["types"]
            .as_array()
            .unwrap()
            .contains(&json!("Greyhound")));
        assert!(vars["locations"].as_array().unwrap().contains(&json!("VIC")));
    }

    #[test]
    fn embedded_auth_failure_is_classified_fatal() {
        let err = classify_query_errors(vec!["Authentication failed.".to_string()]);
        assert!(matches!(err, ProviderError::Authentication(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_query_errors_stay_transient() {
        let err = classify_query_errors(vec!["field resolution timed out".to_string()]);
        assert!(matches!(err, ProviderError::Query(_)));
        assert!(err.is_retryable());
    }
}
