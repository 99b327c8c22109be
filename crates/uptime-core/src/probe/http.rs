use std::error::Error as _;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, warn};

use super::{Outcome, ProbeResult, Prober};

/// Single-shot HTTP GET prober with a pooled client. No retries.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(Self::build_client(timeout)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &crate::config::EngineConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.request_timeout)
    }

    pub fn build_client(timeout: Option<Duration>) -> Result<Client, reqwest::Error> {
        let mut builder = Client::builder().pool_max_idle_per_host(20);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        builder.build()
    }
}

/// Flattens an error and its sources into one line, e.g.
/// `error sending request for url (...): tcp connect error: Connection refused`.
fn describe(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        let text = s.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = s.source();
    }
    out
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        let result = self.client.get(url).send().await;
        let elapsed_ms = start.elapsed().as_micros() as f64 / 1000.0;

        let outcome = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(url, status, elapsed_ms, "Probe completed");
                Outcome::Status(status)
            }
            Err(e) => {
                let reason = describe(&e);
                warn!(url, timeout = e.is_timeout(), error = %reason, "Probe failed");
                Outcome::TransportError(reason)
            }
        };

        ProbeResult {
            outcome,
            elapsed_ms,
            completed_at: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn probe_returns_status_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let prober = HttpProber::new(None).unwrap();
        let result = prober.probe(&format!("{}/", server.uri())).await;
        assert_eq!(result.outcome, Outcome::Status(200));
        assert!(result.elapsed_ms >= 0.0);
        assert!(result.completed_at > 0);
    }

    #[tokio::test]
    async fn probe_preserves_error_status_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let prober = HttpProber::new(None).unwrap();
        let result = prober.probe(&format!("{}/down", server.uri())).await;
        assert_eq!(result.outcome, Outcome::Status(503));
        assert_eq!(result.outcome.to_response_string(), "503");
    }

    #[tokio::test]
    async fn probe_records_connection_failure_as_transport_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = HttpProber::new(None).unwrap();
        let result = prober.probe(&format!("http://127.0.0.1:{}/", port)).await;
        match &result.outcome {
            Outcome::TransportError(reason) => assert!(!reason.is_empty()),
            other => panic!("expected transport error, got {:?}", other),
        }
        assert!(result.outcome.to_response_string().starts_with("Error: "));
    }

    #[tokio::test]
    async fn configured_timeout_is_reported_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let prober = HttpProber::new(Some(Duration::from_millis(50))).unwrap();
        let result = prober.probe(&format!("{}/slow", server.uri())).await;
        assert!(matches!(result.outcome, Outcome::TransportError(_)));
    }
}
