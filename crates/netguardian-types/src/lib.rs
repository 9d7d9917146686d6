//! Shared types for netguardian.
//!
//! This crate contains the value types passed between the discovery engine,
//! its callers, and the API client: candidate base URLs, subnet prefixes,
//! probe outcomes, and the discovery state machine's states.

pub mod endpoint;
pub mod error;
pub mod probe;
pub mod state;
pub mod subnet;

pub use endpoint::{CandidateEndpoint, PersistedEndpoint};
pub use error::EndpointError;
pub use probe::{ProbeFailure, ProbeOutcome};
pub use state::{DiscoveryState, EXHAUSTED_REASON};
pub use subnet::SubnetPrefix;
