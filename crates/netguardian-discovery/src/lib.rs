//! Cache-first discovery of the netguardian control backend.
//!
//! Turns "no known address" into a verified base URL: the last endpoint that
//! answered is tried first, then a bounded-concurrency sweep walks a fixed,
//! ordered list of /24 subnets. The pieces, leaves first:
//!
//! - [`EndpointCache`]: the persisted last-known-good endpoint.
//! - [`Probe`]: one bounded-time health check ([`HttpProbe`] in production).
//! - [`BatchScanner`]: a batch of concurrent probes, winner chosen by host order.
//! - [`SubnetSweeper`]: subnets in order, batches one after another.
//! - [`DiscoveryController`]: the state machine tying them together, with a
//!   cancellation token per run so a retry supersedes the run before it.

pub mod batch;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
#[cfg(test)]
mod mock;
pub mod probe;
pub mod setup;
pub mod sweep;

pub use batch::BatchScanner;
pub use cache::{EndpointCache, FileEndpointCache, MemoryEndpointCache};
pub use config::{Config, DiscoveryConfig};
pub use controller::DiscoveryController;
pub use error::DiscoveryError;
pub use probe::{HttpProbe, Probe};
pub use sweep::{SubnetSweeper, SweepProgress};
