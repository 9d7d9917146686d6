//! Discovery state machine states.

use crate::endpoint::CandidateEndpoint;
use crate::subnet::SubnetPrefix;

/// Failure reason reported when every configured prefix was swept without
/// a live backend.
pub const EXHAUSTED_REASON: &str = "no backend found on any scanned subnet";

/// State of a discovery run.
///
/// Only the discovery controller transitions between states. `Found` and
/// `Failed` are terminal for a run; `Failed` may be retried.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DiscoveryState {
    /// No run has started (or the last run was cancelled).
    #[default]
    Idle,
    /// Probing the cached endpoint.
    ReconnectingCache,
    /// Sweeping `prefix`, the `subnet_index`-th configured prefix (0-based).
    Scanning {
        subnet_index: usize,
        prefix: SubnetPrefix,
        percent_complete: u8,
    },
    /// A candidate answered the health check inside its timeout.
    Found { endpoint: CandidateEndpoint },
    /// Nothing answered; the caller may retry.
    Failed { reason: String },
}

impl DiscoveryState {
    /// Whether the run that produced this state has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Found { .. } | Self::Failed { .. })
    }

    /// The discovered endpoint, if this is `Found`.
    pub fn endpoint(&self) -> Option<&CandidateEndpoint> {
        match self {
            Self::Found { endpoint } => Some(endpoint),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::ReconnectingCache => write!(f, "Reconnecting to last known backend..."),
            Self::Scanning {
                prefix,
                percent_complete,
                ..
            } => write!(f, "Scanning {prefix}.x ({percent_complete}%)"),
            Self::Found { endpoint } => write!(f, "Connected to {endpoint}"),
            Self::Failed { reason } => write!(
                f,
                "{reason}; make sure the backend application is running and on the same network"
            ),
        }
    }
}
