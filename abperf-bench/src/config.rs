use abperf_common::{AbPerfError, Credentials, Endpoint, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::compare::ComparisonConfig;
use crate::scenario::RampStage;
use crate::thresholds::Thresholds;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Everything a comparison run needs.
///
/// Precedence, lowest first: [`Default`], JSON file, environment
/// ([`BenchConfig::apply_env`]), CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Exactly two endpoints; the first is reported as `endpoint1`.
    pub endpoints: Vec<Endpoint>,
    pub credentials: Option<Credentials>,
    pub stages: Vec<RampStage>,
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,
    /// Delay between two iterations of the same worker.
    #[serde(with = "duration_str")]
    pub pacing: Duration,
    pub thresholds: Thresholds,
    pub comparison: ComparisonConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![
                Endpoint {
                    id: "endpoint1".to_string(),
                    name: "Test".to_string(),
                    url: String::new(),
                },
                Endpoint {
                    id: "endpoint2".to_string(),
                    name: "Baseline".to_string(),
                    url: String::new(),
                },
            ],
            credentials: None,
            stages: vec![
                RampStage { duration: Duration::from_secs(30), target: 10 },
                RampStage { duration: Duration::from_secs(120), target: 10 },
                RampStage { duration: Duration::from_secs(30), target: 0 },
            ],
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pacing: DEFAULT_PACING,
            thresholds: Thresholds::default(),
            comparison: ComparisonConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AbPerfError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", path);
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AbPerfError::ConfigFile(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&contents)
            .map_err(|e| AbPerfError::ConfigFile(path.display().to_string(), e.to_string()))
    }

    /// Override URLs and credentials from `ENDPOINT1_URL`, `ENDPOINT2_URL`,
    /// `HTTP_USERNAME` and `HTTP_PASSWORD`, looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (idx, var) in ["ENDPOINT1_URL", "ENDPOINT2_URL"].into_iter().enumerate() {
            if let (Some(endpoint), Some(url)) = (self.endpoints.get_mut(idx), lookup(var)) {
                endpoint.url = url;
            }
        }

        let username = lookup("HTTP_USERNAME");
        let password = lookup("HTTP_PASSWORD");
        if username.is_none() && password.is_none() {
            return;
        }
        let current = self.credentials.take().unwrap_or(Credentials {
            username: String::new(),
            password: String::new(),
        });
        self.credentials = Some(Credentials {
            username: username.unwrap_or(current.username),
            password: password.unwrap_or(current.password),
        });
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AbPerfError::InvalidConfig(msg));

        if self.endpoints.len() != 2 {
            return invalid(format!(
                "exactly two endpoints are required, got {}",
                self.endpoints.len()
            ));
        }
        let mut ids = HashSet::new();
        for endpoint in &self.endpoints {
            if !ids.insert(endpoint.id.as_str()) {
                return invalid(format!("duplicate endpoint id {:?}", endpoint.id));
            }
            if endpoint.url.trim().is_empty() {
                return invalid(format!("{} url is empty", endpoint.id));
            }
        }
        if self.stages.is_empty() {
            return invalid("at least one ramp stage is required".to_string());
        }
        if self.request_timeout.is_zero() {
            return invalid("request_timeout must be greater than zero".to_string());
        }

        let c = &self.comparison;
        if c.avg_weight < 0.0 || c.median_weight < 0.0 {
            return invalid("score weights must not be negative".to_string());
        }
        if c.avg_weight == 0.0 && c.median_weight == 0.0 {
            return invalid("at least one score weight must be positive".to_string());
        }
        if c.significance_percent < 0.0 {
            return invalid("significance_percent must not be negative".to_string());
        }
        Ok(())
    }

    /// The two endpoints in positional order. Call after [`BenchConfig::validate`].
    pub fn endpoint_pair(&self) -> Result<(&Endpoint, &Endpoint)> {
        match self.endpoints.as_slice() {
            [first, second] => Ok((first, second)),
            other => Err(AbPerfError::InvalidConfig(format!(
                "exactly two endpoints are required, got {}",
                other.len()
            ))),
        }
    }
}

/// Parse a k6-style duration: one or more `<number><unit>` groups with unit
/// `ms`, `s`, `m` or `h` (`500ms`, `30s`, `2m`, `1m30s`, `1.5s`).
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let invalid = || AbPerfError::InvalidDuration(raw.to_string());
    let input = raw.trim();
    if input.is_empty() {
        return Err(invalid());
    }

    let mut total_ms = 0.0_f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let unit_len = rest[number_len..]
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len() - number_len);

        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        let scale = match &rest[number_len..number_len + unit_len] {
            "ms" => 1.0,
            "s" => 1_000.0,
            "m" => 60_000.0,
            "h" => 3_600_000.0,
            _ => return Err(invalid()),
        };
        total_ms += value * scale;
        rest = &rest[number_len + unit_len..];
    }

    Duration::try_from_secs_f64(total_ms / 1_000.0).map_err(|_| invalid())
}

/// Render a duration in the coarsest unit that represents it exactly.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms % 1_000 != 0 {
        format!("{ms}ms")
    } else if ms == 0 {
        "0s".to_string()
    } else if ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else {
        format!("{}s", ms / 1_000)
    }
}

/// serde adapter for durations written as `"30s"`, `"2m"`, ...
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
