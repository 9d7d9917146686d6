//! Client for the netguardian control API.
//!
//! An [`ApiClient`] is built from the endpoint a discovery run produced and
//! is handed to whatever needs to talk to the backend. Nothing here looks the
//! endpoint up on its own.

use std::time::Duration;

use netguardian_types::CandidateEndpoint;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod error;

pub use error::ClientError;

/// Default per-request timeout; backend commands such as port scans can run
/// for a while.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Body of `POST /api/execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Response of `POST /api/execute`.
///
/// `kind` tells which of `output` or `data` is filled in (`"output"`,
/// `"error"`, `"port_list"`, ...). Payloads are passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }
}

/// Request/response client bound to one backend endpoint.
#[derive(Debug, Clone)]
pub struct ApiClient {
    endpoint: CandidateEndpoint,
    http: reqwest::Client,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(endpoint: CandidateEndpoint) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    pub fn with_client(endpoint: CandidateEndpoint, http: reqwest::Client) -> Self {
        Self {
            endpoint,
            http,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &CandidateEndpoint {
        &self.endpoint
    }

    /// `GET /api/health`: the backend's network health summary.
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.get("/api/health").await
    }

    /// `GET /api/network`: interface, gateway and traffic counters.
    pub async fn network(&self) -> Result<serde_json::Value, ClientError> {
        self.get("/api/network").await
    }

    /// `GET /api/devices`: devices the backend has seen.
    pub async fn devices(&self) -> Result<serde_json::Value, ClientError> {
        self.get("/api/devices").await
    }

    /// `POST /api/execute`: run a named backend command.
    pub async fn execute(
        &self,
        command: &str,
        args: &[String],
    ) -> Result<CommandResponse, ClientError> {
        let url = self.endpoint.join("/api/execute");
        let body = CommandRequest {
            command: command.to_string(),
            args: args.to_vec(),
        };
        debug!(url = %url, command, "executing backend command");

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;
        decode(url, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint.join(path);
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;
        decode(url, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    url: String,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            url,
            status: status.as_u16(),
        });
    }
    response
        .json()
        .await
        .map_err(|source| ClientError::Decode { url, source })
}
