//! HTTP client for the time-series backend

use super::wire::{decode_instant, decode_range, encode_import_line};
use crate::schema::TimeseriesData;
use crate::{Error, Result};

use metrics::histogram;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const IMPORT_PATH: &str = "/api/v1/import";
pub const QUERY_PATH: &str = "/api/v1/query";
pub const QUERY_RANGE_PATH: &str = "/api/v1/query_range";

/// Backend connection settings, fixed for the lifetime of a client
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://victoria-metrics:8428`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8428".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Range query parameters
///
/// `start`, `end` and `step` are passed through verbatim. When any of them is
/// missing or blank the query is answered by the instant endpoint instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeQuery {
    pub query: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub step: Option<String>,
}

impl RangeQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_window(
        mut self,
        start: impl Into<String>,
        end: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        self.start = Some(start.into());
        self.end = Some(end.into());
        self.step = Some(step.into());
        self
    }

    /// The full window, if every part is present and non-blank
    fn window(&self) -> Option<(&str, &str, &str)> {
        Some((
            window_part(&self.start)?,
            window_part(&self.end)?,
            window_part(&self.step)?,
        ))
    }
}

fn window_part(part: &Option<String>) -> Option<&str> {
    part.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Translates internal time series to and from the backend's HTTP API
#[derive(Debug, Clone)]
pub struct TimeseriesClient {
    client: Client,
    base_url: String,
}

impl TimeseriesClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build backend HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Import every series, one request per series, in order.
    ///
    /// Stops at the first rejected series; series before it stay imported.
    /// Returns the number of series imported.
    pub async fn write(&self, series: &[TimeseriesData]) -> Result<usize> {
        let start = Instant::now();
        let url = self.url(IMPORT_PATH);

        for (index, ts) in series.iter().enumerate() {
            let line = encode_import_line(ts)?;
            let response = self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(line)
                .send()
                .await?;

            if let Err(e) = check_status(response).await {
                warn!(index, error = %e, "Backend rejected timeseries import, later series not sent");
                record_request("import", start);
                return Err(e);
            }
        }

        record_request("import", start);
        debug!(series = series.len(), "Imported timeseries");
        Ok(series.len())
    }

    /// Evaluate `query` at a single point in time.
    pub async fn query_instant(&self, query: &str) -> Result<Vec<TimeseriesData>> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.url(QUERY_PATH))
            .query(&[("query", query)])
            .send()
            .await?;

        let body = check_status(response).await?.bytes().await?;
        record_request("query", start);
        decode_instant(&body)
    }

    /// Evaluate a query over a window, falling back to an instant query when
    /// the window is incomplete.
    pub async fn query_range(&self, range: &RangeQuery) -> Result<Vec<TimeseriesData>> {
        let Some((from, to, step)) = range.window() else {
            debug!(query = %range.query, "Incomplete range window, issuing instant query");
            return self.query_instant(&range.query).await;
        };

        let start = Instant::now();
        let response = self
            .client
            .get(self.url(QUERY_RANGE_PATH))
            .query(&[
                ("query", range.query.as_str()),
                ("start", from),
                ("end", to),
                ("step", step),
            ])
            .send()
            .await?;

        let body = check_status(response).await?.bytes().await?;
        record_request("query_range", start);
        decode_range(&body)
    }
}

/// Turn a non-2xx response into a backend error carrying the body text.
///
/// Query endpoints answer errors with a JSON body that carries its own
/// status; those are decoded so the backend's message is preserved.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);

    Err(Error::Backend {
        status: Some(status.as_u16()),
        message,
    })
}

fn record_request(endpoint: &'static str, start: Instant) {
    histogram!("pulse_backend_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}
