mod http;

pub use http::HttpProber;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::store::Observation;

/// Prefix that marks a transport failure in a stored response string.
/// Never a valid start for a status code.
pub const ERROR_PREFIX: &str = "Error: ";

/// Result of a single probe, as seen by the prober.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Outcome {
    /// The target answered; the raw HTTP status, no up/down judgement.
    Status(u16),
    /// DNS, connect, TLS, timeout or any other transport-level failure.
    TransportError(String),
}

impl Outcome {
    /// Storage representation: `"200"` or `"Error: <description>"`.
    pub fn to_response_string(&self) -> String {
        self.to_string()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Status(code) if (200..300).contains(code))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{}", code),
            Self::TransportError(reason) => write!(f, "{}{}", ERROR_PREFIX, reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub outcome: Outcome,
    /// Wall-clock duration of the request in milliseconds, microsecond precision.
    pub elapsed_ms: f64,
    /// Unix seconds at completion.
    pub completed_at: i64,
}

impl ProbeResult {
    pub fn into_observation(self) -> Observation {
        Observation {
            timestamp: self.completed_at,
            time: self.elapsed_ms,
            response: self.outcome.to_response_string(),
        }
    }
}

/// Issues one request against a target and classifies the result.
///
/// Implementations never fail: transport problems are part of the outcome.
/// The trait is object-safe and Send + Sync for use across probe tasks.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_renders_as_decimal() {
        assert_eq!(Outcome::Status(200).to_response_string(), "200");
        assert_eq!(Outcome::Status(503).to_response_string(), "503");
    }

    #[test]
    fn transport_error_carries_prefix() {
        let o = Outcome::TransportError("connection refused".into());
        let s = o.to_response_string();
        assert_eq!(s, "Error: connection refused");
        assert!(!s.starts_with(|c: char| c.is_ascii_digit()));
    }

    #[test]
    fn only_2xx_is_success() {
        assert!(Outcome::Status(200).is_success());
        assert!(Outcome::Status(204).is_success());
        assert!(!Outcome::Status(301).is_success());
        assert!(!Outcome::Status(404).is_success());
        assert!(!Outcome::TransportError("timeout".into()).is_success());
    }

    #[test]
    fn probe_result_converts_to_observation() {
        let obs = ProbeResult {
            outcome: Outcome::Status(200),
            elapsed_ms: 12.3,
            completed_at: 1_700_000_000,
        }
        .into_observation();
        assert_eq!(obs.timestamp, 1_700_000_000);
        assert_eq!(obs.time, 12.3);
        assert_eq!(obs.response, "200");
    }
}
