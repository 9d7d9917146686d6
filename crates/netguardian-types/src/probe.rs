//! Result of a single liveness probe.

use crate::endpoint::CandidateEndpoint;

/// Why a probe did not count as alive.
///
/// Kept for logging only: every variant means "candidate unreachable" to
/// the discovery engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// No response inside the timeout window.
    Timeout,
    /// Connection refused or could not be established.
    Connect,
    /// Any other transport-level error.
    Transport,
    /// A response arrived with a non-2xx status.
    Status(u16),
    /// The run owning this probe was superseded before the probe settled.
    Cancelled,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connection failed"),
            Self::Transport => write!(f, "transport error"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of probing one candidate. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub candidate: CandidateEndpoint,
    pub success: bool,
    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    pub fn alive(candidate: CandidateEndpoint) -> Self {
        Self {
            candidate,
            success: true,
            failure: None,
        }
    }

    pub fn failed(candidate: CandidateEndpoint, failure: ProbeFailure) -> Self {
        Self {
            candidate,
            success: false,
            failure: Some(failure),
        }
    }
}
