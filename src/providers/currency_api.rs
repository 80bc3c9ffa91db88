use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::error::FetchError;
use crate::rates::{RateTable, RateTableProvider, normalize_code};

/// Provider for the `@fawazahmed0/currency-api` dataset.
///
/// Both the jsDelivr CDN and the Cloudflare Pages mirror serve the same
/// schema, so a single implementation parameterized by base URL covers the
/// primary and the fallback source.
pub struct CurrencyApiProvider {
    name: String,
    base_url: String,
}

impl CurrencyApiProvider {
    pub fn new(name: &str, base_url: &str) -> Self {
        CurrencyApiProvider {
            name: name.to_string(),
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl RateTableProvider for CurrencyApiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self, base: &str) -> Result<RateTable, FetchError> {
        let base = normalize_code(base);
        let url = format!("{}/v1/currencies/{}.json", self.base_url, base);
        debug!("Requesting rate table from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("xfx/0.1")
            .build()
            .map_err(|e| FetchError::Transport {
                url: url.clone(),
                source: e,
            })?;
        let response =
            client
                .get(&url)
                .send()
                .await
                .map_err(|e| FetchError::Transport {
                    url: url.clone(),
                    source: e,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus {
                url,
                status: status.as_u16(),
            });
        }

        // The payload carries the rate table under a key equal to the base
        // code, next to metadata like "date". Only the table is of interest.
        let mut payload: HashMap<String, serde_json::Value> =
            response
                .json()
                .await
                .map_err(|e| FetchError::MalformedResponse {
                    url: url.clone(),
                    detail: e.to_string(),
                })?;

        let table = payload
            .remove(&base)
            .ok_or_else(|| FetchError::MalformedResponse {
                url: url.clone(),
                detail: format!("no `{base}` key in response"),
            })?;

        let rates: RateTable =
            serde_json::from_value(table).map_err(|e| FetchError::MalformedResponse {
                url: url.clone(),
                detail: format!("`{base}` value is not a rate table: {e}"),
            })?;

        if rates.is_empty() {
            return Err(FetchError::MalformedResponse {
                url,
                detail: format!("rate table for `{base}` is empty"),
            });
        }

        debug!(
            "Fetched {} rates for base '{}' from {}",
            rates.len(),
            base,
            self.name
        );
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(base: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v1/currencies/{base}.json");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_rate_table_fetch() {
        let mock_response = r#"{
            "date": "2024-03-06",
            "usd": {
                "inr": 83.12,
                "eur": 0.91,
                "btc": 0.000016
            }
        }"#;

        let mock_server = create_mock_server("usd", mock_response).await;
        let provider = CurrencyApiProvider::new("primary", &mock_server.uri());

        let rates = provider.fetch_rates("usd").await.unwrap();
        assert_eq!(rates.len(), 3);
        assert_eq!(rates["inr"], 83.12);
        assert_eq!(rates["eur"], 0.91);
    }

    #[tokio::test]
    async fn test_base_is_lowercased_before_request() {
        let mock_response = r#"{"eur": {"usd": 1.09}}"#;
        let mock_server = create_mock_server("eur", mock_response).await;
        let provider = CurrencyApiProvider::new("primary", &mock_server.uri());

        // The mock only matches the lowercase path; an un-normalized request
        // would 404.
        let rates = provider.fetch_rates("EUR").await.unwrap();
        assert_eq!(rates["usd"], 1.09);
    }

    #[tokio::test]
    async fn test_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/currencies/usd.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = CurrencyApiProvider::new("primary", &mock_server.uri());
        let err = provider.fetch_rates("usd").await.unwrap_err();
        assert!(matches!(err, FetchError::UpstreamStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_missing_base_key() {
        // Valid JSON, wrong shape: table keyed by a different currency.
        let mock_response = r#"{"date": "2024-03-06", "eur": {"usd": 1.09}}"#;
        let mock_server = create_mock_server("usd", mock_response).await;
        let provider = CurrencyApiProvider::new("fallback", &mock_server.uri());

        let err = provider.fetch_rates("usd").await.unwrap_err();
        match err {
            FetchError::MalformedResponse { detail, .. } => {
                assert!(detail.contains("no `usd` key"), "detail: {detail}");
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let mock_server = create_mock_server("usd", "not json at all").await;
        let provider = CurrencyApiProvider::new("primary", &mock_server.uri());

        let err = provider.fetch_rates("usd").await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_empty_rate_table_is_malformed() {
        let mock_response = r#"{"usd": {}}"#;
        let mock_server = create_mock_server("usd", mock_response).await;
        let provider = CurrencyApiProvider::new("primary", &mock_server.uri());

        let err = provider.fetch_rates("usd").await.unwrap_err();
        match err {
            FetchError::MalformedResponse { detail, .. } => {
                assert!(detail.contains("empty"), "detail: {detail}");
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }
}
