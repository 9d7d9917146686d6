//! Single bounded-time liveness check against a candidate.

use std::time::Duration;

use async_trait::async_trait;
use netguardian_types::{CandidateEndpoint, ProbeFailure, ProbeOutcome};
use tracing::trace;

use crate::error::DiscoveryError;

/// Checks whether a candidate serves the control API.
///
/// Implementations are stateless and reentrant: a batch calls `check`
/// concurrently on one shared instance. Every failure cause collapses into
/// an unsuccessful [`ProbeOutcome`]; `check` never errors.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn check(&self, candidate: &CandidateEndpoint, timeout: Duration) -> ProbeOutcome;
}

/// Probe that issues `GET <candidate><health_path>` and accepts any 2xx.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    health_path: String,
}

impl HttpProbe {
    pub fn new(health_path: impl Into<String>) -> Result<Self, DiscoveryError> {
        // Each host is probed once per sweep: no idle pooling, no system proxy.
        let client = reqwest::Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self::with_client(client, health_path))
    }

    pub fn with_client(client: reqwest::Client, health_path: impl Into<String>) -> Self {
        Self {
            client,
            health_path: health_path.into(),
        }
    }

    pub fn health_path(&self) -> &str {
        &self.health_path
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, candidate: &CandidateEndpoint, timeout: Duration) -> ProbeOutcome {
        let url = candidate.join(&self.health_path);
        let request = self.client.get(&url).timeout(timeout).send();

        // reqwest's own timeout covers connect and headers; the outer one
        // bounds DNS and anything else the client does before that.
        let outcome = match tokio::time::timeout(timeout, request).await {
            Err(_) => ProbeOutcome::failed(candidate.clone(), ProbeFailure::Timeout),
            Ok(Err(e)) => ProbeOutcome::failed(candidate.clone(), classify(&e)),
            Ok(Ok(response)) if response.status().is_success() => {
                ProbeOutcome::alive(candidate.clone())
            }
            Ok(Ok(response)) => ProbeOutcome::failed(
                candidate.clone(),
                ProbeFailure::Status(response.status().as_u16()),
            ),
        };

        trace!(
            candidate = %candidate,
            success = outcome.success,
            failure = ?outcome.failure,
            "probe settled"
        );
        outcome
    }
}

fn classify(error: &reqwest::Error) -> ProbeFailure {
    if error.is_timeout() {
        ProbeFailure::Timeout
    } else if error.is_connect() {
        ProbeFailure::Connect
    } else {
        ProbeFailure::Transport
    }
}
