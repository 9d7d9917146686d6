//! Candidate base URLs and their persisted form.

use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::EndpointError;

/// A base URL hypothesised to be the control backend.
///
/// Always normalised to `scheme://host:port` with no path, so two candidates
/// naming the same backend compare equal. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CandidateEndpoint(String);

impl CandidateEndpoint {
    /// Parse and normalise an explicit base URL such as `http://10.0.0.5:49152/`.
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(input.trim()).map_err(|e| EndpointError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(EndpointError::UnsupportedScheme(scheme.to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| EndpointError::MissingHost(input.to_string()))?;
        // Always Some for http(s)
        let port = url.port_or_known_default().unwrap_or(80);

        Ok(Self(format!("{scheme}://{host}:{port}")))
    }

    /// Build the candidate for one host of a subnet sweep.
    ///
    /// `scheme` must be `http` or `https`; the discovery config validates it
    /// before any sweep starts.
    pub fn from_host(scheme: &str, host: Ipv4Addr, port: u16) -> Self {
        Self(format!("{scheme}://{host}:{port}"))
    }

    /// The normalised base URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append an absolute API path (`/api/health`) to the base URL.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.0)
        } else {
            format!("{}/{path}", self.0)
        }
    }
}

impl std::fmt::Display for CandidateEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CandidateEndpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CandidateEndpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CandidateEndpoint> for String {
    fn from(endpoint: CandidateEndpoint) -> Self {
        endpoint.0
    }
}

/// The durable copy of the last endpoint that answered a live probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEndpoint {
    pub base_url: CandidateEndpoint,
    /// Unix seconds at which the probe against `base_url` succeeded.
    #[serde(default)]
    pub verified_at: u64,
}
