//! Resilient client for rate-limited public HTTP/SPARQL endpoints.
//!
//! Uses async reqwest behind a shared tokio runtime but presents a sync
//! interface, since stage processing is single-threaded and sequential.
//! Every call degrades to `None` on failure so one flaky request never
//! aborts a batch; callers treat `None` as "no enrichment for this record".

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use serde_json::Value;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .expect("failed to build HTTP client")
});

/// Shared tokio runtime for HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Failure classification for a single outbound call.
#[derive(Debug)]
pub enum ApiError {
    Http {
        status: Option<u16>,
        message: String,
    },
    /// HTTP 429 carrying the server-requested wait.
    RateLimited(Duration),
    Decode(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::RateLimited(wait) => write!(f, "rate limited, retry after {}s", wait.as_secs()),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Client configuration; one instance is shared by all stages of a process.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Latency above which a successful call is logged as slow.
    pub slow_call: Duration,
    /// Retry slots for SPARQL calls (429 waits do not consume one).
    pub sparql_max_retries: u32,
    /// Initial pre-request pause for SPARQL calls; doubles on failure.
    pub sparql_pause: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            slow_call: Duration::from_secs(1),
            sparql_max_retries: 3,
            sparql_pause: Duration::from_millis(800),
            user_agent: "WikiCartoBot/1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WikiClient {
    cfg: ClientConfig,
}

impl WikiClient {
    pub fn new(cfg: ClientConfig) -> Self {
        Self { cfg }
    }

    /// GET + parse JSON. Logs an error on non-success status and a warning
    /// on slow calls; returns the parsed body, or `None` on any failure.
    pub fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Option<Value> {
        match self.try_get(url, params) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("request failed for {url}: {e}");
                None
            }
        }
    }

    fn try_get(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let started = Instant::now();
        let (status, body) = SHARED_RUNTIME.handle().block_on(async {
            let response = SHARED_CLIENT
                .get(url)
                .query(params)
                .timeout(self.cfg.timeout)
                .header(reqwest::header::USER_AGENT, &self.cfg.user_agent)
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(&e))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| ApiError::from_reqwest(&e))?;
            Ok::<_, ApiError>((status, body))
        })?;

        let elapsed = started.elapsed();
        if !(200..300).contains(&status) {
            log::error!("HTTP {status} for {url}");
        } else if elapsed > self.cfg.slow_call {
            log::warn!("slow call: {url} took {:.2}s", elapsed.as_secs_f64());
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// SPARQL query with backoff. Pauses before every attempt; a 429 sleeps
    /// for the server-provided `Retry-After` and retries without consuming
    /// a retry slot; any other failure doubles the pause and consumes one.
    /// Returns `None` on exhaustion or when the result envelope is empty.
    pub fn sparql(&self, endpoint: &str, label: &str, query: &str) -> Option<Value> {
        self.sparql_attempts(label, || self.try_sparql(endpoint, query))
    }

    fn try_sparql(&self, endpoint: &str, query: &str) -> Result<Value, ApiError> {
        let (status, retry_after, body) = SHARED_RUNTIME.handle().block_on(async {
            let response = SHARED_CLIENT
                .get(endpoint)
                .query(&[("query", query)])
                .header(reqwest::header::ACCEPT, "application/sparql-results+json")
                .header(reqwest::header::USER_AGENT, &self.cfg.user_agent)
                .timeout(self.cfg.timeout)
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(&e))?;
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let body = response
                .text()
                .await
                .map_err(|e| ApiError::from_reqwest(&e))?;
            Ok::<_, ApiError>((status, retry_after, body))
        })?;

        if status == 429 {
            let wait = retry_after.map(Duration::from_secs).unwrap_or(DEFAULT_RETRY_AFTER);
            return Err(ApiError::RateLimited(wait));
        }
        if !(200..300).contains(&status) {
            return Err(ApiError::Http {
                status: Some(status),
                message: format!("SPARQL endpoint returned {status}"),
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Retry loop, separated from the HTTP call so the backoff discipline
    /// is testable with an injected attempt function.
    fn sparql_attempts(
        &self,
        label: &str,
        mut attempt_fn: impl FnMut() -> Result<Value, ApiError>,
    ) -> Option<Value> {
        let mut pause = self.cfg.sparql_pause;
        let mut attempts = 0u32;

        while attempts < self.cfg.sparql_max_retries {
            std::thread::sleep(pause);
            match attempt_fn() {
                Ok(value) => {
                    if has_bindings(&value) {
                        return Some(value);
                    }
                    log::warn!("empty or incomplete SPARQL result for {label}");
                    return None;
                }
                Err(ApiError::RateLimited(wait)) => {
                    log::warn!(
                        "SPARQL rate limited for {label}, waiting {}s",
                        wait.as_secs()
                    );
                    std::thread::sleep(wait);
                }
                Err(e) => {
                    attempts += 1;
                    log::error!("SPARQL failure for {label} (attempt {attempts}): {e}");
                    pause *= 2;
                }
            }
        }
        None
    }
}

/// Whether a SPARQL response carries a non-empty `results.bindings` array.
fn has_bindings(value: &Value) -> bool {
    value
        .pointer("/results/bindings")
        .and_then(Value::as_array)
        .is_some_and(|b| !b.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fast_client(max_retries: u32) -> WikiClient {
        WikiClient::new(ClientConfig {
            sparql_max_retries: max_retries,
            sparql_pause: Duration::ZERO,
            ..ClientConfig::default()
        })
    }

    fn bindings_value() -> Value {
        json!({"results": {"bindings": [{"item": {"value": "Q90"}}]}})
    }

    #[test]
    fn has_bindings_accepts_populated_envelope() {
        assert!(has_bindings(&bindings_value()));
    }

    #[test]
    fn has_bindings_rejects_empty_or_missing_envelope() {
        assert!(!has_bindings(&json!({"results": {"bindings": []}})));
        assert!(!has_bindings(&json!({"results": {}})));
        assert!(!has_bindings(&json!({})));
    }

    #[test]
    fn sparql_returns_first_success() {
        let client = fast_client(3);
        let mut calls = 0;
        let out = client.sparql_attempts("t", || {
            calls += 1;
            Ok(bindings_value())
        });
        assert!(out.is_some());
        assert_eq!(calls, 1);
    }

    #[test]
    fn sparql_empty_envelope_is_none_without_retry() {
        let client = fast_client(3);
        let mut calls = 0;
        let out = client.sparql_attempts("t", || {
            calls += 1;
            Ok(json!({"results": {"bindings": []}}))
        });
        assert!(out.is_none());
        assert_eq!(calls, 1);
    }

    #[test]
    fn generic_failures_consume_retry_slots() {
        let client = fast_client(3);
        let mut calls = 0;
        let out = client.sparql_attempts("t", || {
            calls += 1;
            Err(ApiError::Http {
                status: Some(500),
                message: "boom".into(),
            })
        });
        assert!(out.is_none());
        assert_eq!(calls, 3);
    }

    #[test]
    fn rate_limiting_does_not_consume_a_slot() {
        let client = fast_client(2);
        let mut calls = 0;
        let out = client.sparql_attempts("t", || {
            calls += 1;
            if calls <= 4 {
                Err(ApiError::RateLimited(Duration::ZERO))
            } else {
                Ok(bindings_value())
            }
        });
        // four 429s then success, with only 2 retry slots configured
        assert!(out.is_some());
        assert_eq!(calls, 5);
    }

    #[test]
    fn mixed_429_and_failures_only_count_failures() {
        let client = fast_client(2);
        let mut calls = 0;
        let out = client.sparql_attempts("t", || {
            calls += 1;
            if calls % 2 == 1 {
                Err(ApiError::RateLimited(Duration::ZERO))
            } else {
                Err(ApiError::Http {
                    status: Some(503),
                    message: "unavailable".into(),
                })
            }
        });
        assert!(out.is_none());
        // 2 failure slots consumed; the interleaved 429s are free
        assert_eq!(calls, 4);
    }

    #[test]
    fn api_error_display() {
        let e = ApiError::Http {
            status: Some(503),
            message: "unavailable".into(),
        };
        assert_eq!(format!("{e}"), "HTTP 503: unavailable");
        let e = ApiError::RateLimited(Duration::from_secs(7));
        assert!(format!("{e}").contains("7s"));
    }
}
