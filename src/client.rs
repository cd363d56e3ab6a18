//! CoinMarketCap Pro API client.

use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Settings;
use crate::harvester::ListingsSource;
use crate::model::{Listing, ListingsResponse, Status};

const LISTINGS_PATH: &str = "/v1/cryptocurrency/listings/latest";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// One fetch's failure, split by kind so the loop and tests can react to
/// the kind instead of parsing log output.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or redirect failure, after transport retries.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// Failure reading the response body off the wire.
    #[error("body error: {0}")]
    Body(#[from] reqwest::Error),

    /// Non-2xx HTTP status, with the envelope message when one was sent.
    #[error("HTTP {code}: {}", .message.as_deref().unwrap_or("no error message"))]
    Status {
        code: StatusCode,
        message: Option<String>,
    },

    /// 2xx response whose envelope carries a non-zero error code.
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },

    /// Body that does not decode as the expected listings shape.
    #[error("unexpected response shape: {0}")]
    Schema(#[from] serde_json::Error),
}

impl FetchError {
    /// A rejected credential fails every future cycle the same way, so the
    /// run aborts instead of burning the remaining cycles. 1001/1002 are
    /// the CMC invalid-key / missing-key envelope codes.
    pub fn is_fatal(&self) -> bool {
        match self {
            FetchError::Status { code, .. } => matches!(code.as_u16(), 401 | 403),
            FetchError::Api { code, .. } => matches!(code, 1001 | 1002),
            _ => false,
        }
    }
}

/// Query parameters for `listings/latest`. Fixed for the whole run.
#[derive(Debug, Clone)]
pub struct ListingsQuery {
    pub start: u32,
    pub limit: u32,
    pub convert: String,
}

impl From<&Settings> for ListingsQuery {
    fn from(s: &Settings) -> Self {
        Self {
            start: s.start,
            limit: s.limit,
            convert: s.convert.clone(),
        }
    }
}

/// Error bodies carry the same envelope status block without `data`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    status: Status,
}

pub struct CmcClient {
    inner: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl CmcClient {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(settings.http_max_retries);
        let inner = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// One GET against `listings/latest`. The key travels in a header and
    /// never appears in the logged URL.
    pub async fn latest_listings(&self, query: &ListingsQuery) -> Result<Vec<Listing>, FetchError> {
        let url = format!("{}{}", self.base_url, LISTINGS_PATH);
        let response = self
            .inner
            .get(&url)
            .query(&[
                ("start", query.start.to_string()),
                ("limit", query.limit.to_string()),
                ("convert", query.convert.clone()),
            ])
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        log::debug!("cmc.request url={}", response.url());

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.status.error_message);
            return Err(FetchError::Status {
                code: status,
                message,
            });
        }

        let decoded: ListingsResponse = serde_json::from_str(&body)?;
        if decoded.status.error_code != 0 {
            return Err(FetchError::Api {
                code: decoded.status.error_code,
                message: decoded.status.error_message.unwrap_or_default(),
            });
        }

        Ok(decoded.data)
    }
}

impl ListingsSource for CmcClient {
    async fn fetch_listings(&self, query: &ListingsQuery) -> Result<Vec<Listing>, FetchError> {
        self.latest_listings(query).await
    }
}
