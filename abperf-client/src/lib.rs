use abperf_common::{AbPerfError, Credentials, Result};
use base64::prelude::*;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of one timed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// Wall-clock time from send until the body was fully read (or the request failed).
    pub duration_ms: f64,
    /// HTTP status code, or the transport-level failure.
    pub result: Result<u16>,
}

impl RequestOutcome {
    /// `true` only for a completed request with a 2xx status.
    pub fn is_success(&self) -> bool {
        matches!(self.result, Ok(status) if (200..300).contains(&status))
    }
}

/// Capability to issue one HTTP GET with the given headers and timeout.
///
/// Implementations never fail: timeouts and connection errors are reported
/// through [`RequestOutcome::result`] together with the time spent.
pub trait Transport: Send + Sync {
    fn issue_request(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> impl Future<Output = RequestOutcome> + Send;
}

/// `Transport` backed by a shared `reqwest::Client` connection pool.
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http_client: reqwest::Client::new() }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    async fn issue_request(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> RequestOutcome {
        let mut request = self.http_client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let start = Instant::now();
        let result = match request.send().await {
            // Read the body so the measured time covers the full response.
            Ok(response) => {
                let status = response.status().as_u16();
                response.bytes().await.map(|_| status).map_err(|e| classify_error(e, timeout))
            }
            Err(e) => Err(classify_error(e, timeout)),
        };
        let duration_ms = elapsed_ms(start);

        if let Err(ref e) = result {
            debug!(url, error = %e, duration_ms, "request failed");
        }

        RequestOutcome { duration_ms, result }
    }
}

/// Build the `Authorization` header value: `Basic base64("username:password")`.
pub fn basic_auth_header(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", BASE64_STANDARD.encode(raw))
}

/// Headers sent with every request; empty when no credentials are configured.
pub fn request_headers(credentials: Option<&Credentials>) -> Vec<(String, String)> {
    credentials
        .map(|c| vec![("Authorization".to_string(), basic_auth_header(c))])
        .unwrap_or_default()
}

fn classify_error(e: reqwest::Error, timeout: Duration) -> AbPerfError {
    if e.is_timeout() {
        AbPerfError::Timeout(timeout.as_millis() as u64)
    } else {
        AbPerfError::NetworkError(e.to_string())
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000.0
}
