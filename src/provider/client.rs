// =============================================================================
// Intraday Provider Client -- request model and HTTP transport
// =============================================================================
//
// The transport is a seam: the orchestrator only needs "GET these query
// parameters, give me JSON or an error". `HttpTransport` is the reqwest-backed
// implementation; tests substitute their own.
//
// SECURITY: the API key is only ever placed in the query string of the
// outgoing request. It is never logged and is redacted from `Debug`.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{FeedError, Result};
use crate::provider::interval::map_interval_token;
use crate::provider::symbol::to_provider_symbol;
use crate::types::Interval;

/// Default provider endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Function selector for intraday candles.
const INTRADAY_FUNCTION: &str = "TIME_SERIES_INTRADAY";

/// Output-size hint sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    /// Latest 100 data points.
    Compact,
    /// Full intraday history.
    Full,
}

impl OutputSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }
}

impl Default for OutputSize {
    fn default() -> Self {
        Self::Compact
    }
}

/// A fully-resolved provider request: symbol already rewritten, interval
/// already mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub function: &'static str,
    pub symbol: String,
    pub interval: &'static str,
    pub output_size: OutputSize,
}

impl ProviderRequest {
    /// Build an intraday request for an application symbol and interval.
    pub fn intraday(symbol: &str, interval: Interval, output_size: OutputSize) -> Self {
        Self {
            function: INTRADAY_FUNCTION,
            symbol: to_provider_symbol(symbol),
            interval: map_interval_token(interval.as_str()),
            output_size,
        }
    }

    /// Query parameters excluding the API key.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("function", self.function.to_string()),
            ("symbol", self.symbol.clone()),
            ("interval", self.interval.to_string()),
            ("outputsize", self.output_size.as_str().to_string()),
            ("datatype", "json".to_string()),
        ]
    }
}

/// Issues a provider request and hands back the raw JSON body.
#[async_trait]
pub trait QuoteTransport: Send + Sync {
    async fn fetch(&self, request: &ProviderRequest) -> Result<Value>;
}

/// reqwest-backed transport against the provider's `/query` endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with its own HTTP client and request `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("candle-overlay/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Create a transport that re-uses an existing HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        }
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl QuoteTransport for HttpTransport {
    #[instrument(
        skip_all,
        name = "provider::fetch",
        fields(symbol = %request.symbol, interval = request.interval)
    )]
    async fn fetch(&self, request: &ProviderRequest) -> Result<Value> {
        let resp = self
            .client
            .get(self.query_url())
            .query(&request.query_pairs())
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::ProviderLimitReached(format!(
                "provider returned HTTP {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
            });
        }

        // Body read failures are transport errors; only a complete body that
        // does not parse is malformed.
        let bytes = resp.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| FeedError::MalformedResponse(format!("body is not JSON: {e}")))?;

        debug!("provider response received");
        Ok(body)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
