//! One batch of concurrent probes.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use netguardian_types::{CandidateEndpoint, ProbeFailure, ProbeOutcome};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::probe::Probe;

/// Probes every host of a batch at once and picks the winner by host order.
///
/// The batch is the concurrency bound: no probes beyond `hosts.len()` are
/// ever in flight. When several hosts answer, the one listed first wins,
/// regardless of which response arrived first.
#[derive(Clone)]
pub struct BatchScanner {
    probe: Arc<dyn Probe>,
    cancel_siblings_on_first_success: bool,
}

impl BatchScanner {
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        Self {
            probe,
            cancel_siblings_on_first_success: false,
        }
    }

    /// When enabled, the batch returns as soon as its winner is decided and
    /// the remaining probes are dropped. When disabled (the default), every
    /// probe settles before the batch returns.
    #[must_use]
    pub fn cancel_siblings_on_first_success(mut self, enabled: bool) -> Self {
        self.cancel_siblings_on_first_success = enabled;
        self
    }

    /// Probe `hosts` concurrently; return the first host, in order, that
    /// answered. Returns `None` if none did or if `cancel` fired.
    pub async fn scan_batch(
        &self,
        hosts: &[CandidateEndpoint],
        timeout_per_host: Duration,
        cancel: &CancellationToken,
    ) -> Option<CandidateEndpoint> {
        if hosts.is_empty() || cancel.is_cancelled() {
            return None;
        }

        let winner = if self.cancel_siblings_on_first_success {
            self.scan_until_decided(hosts, timeout_per_host, cancel)
                .await
        } else {
            self.scan_all(hosts, timeout_per_host, cancel).await
        };

        if cancel.is_cancelled() {
            debug!(first = %hosts[0], "batch abandoned, run cancelled");
            return None;
        }

        debug!(
            first = %hosts[0],
            last = %hosts[hosts.len() - 1],
            winner = ?winner.as_ref().map(CandidateEndpoint::as_str),
            "batch settled"
        );
        winner
    }

    async fn scan_all(
        &self,
        hosts: &[CandidateEndpoint],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<CandidateEndpoint> {
        let outcomes = join_all(
            hosts
                .iter()
                .map(|host| self.probe_one(host, timeout, cancel)),
        )
        .await;

        // join_all keeps input order, so the first success is the lowest host.
        outcomes
            .into_iter()
            .find(|outcome| outcome.success)
            .map(|outcome| outcome.candidate)
    }

    async fn scan_until_decided(
        &self,
        hosts: &[CandidateEndpoint],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<CandidateEndpoint> {
        let mut pending: FuturesUnordered<_> = hosts
            .iter()
            .enumerate()
            .map(|(index, host)| async move {
                (index, self.probe_one(host, timeout, cancel).await)
            })
            .collect();

        let mut settled: Vec<Option<bool>> = vec![None; hosts.len()];
        // Lowest index whose outcome is still unknown or successful.
        let mut frontier = 0;

        while let Some((index, outcome)) = pending.next().await {
            settled[index] = Some(outcome.success);

            while let Some(Some(false)) = settled.get(frontier) {
                frontier += 1;
            }
            if let Some(Some(true)) = settled.get(frontier) {
                // A success at the frontier beats every later host, so the
                // rest can be dropped.
                debug!(winner = %hosts[frontier], dropped = pending.len(), "winner decided early");
                return Some(hosts[frontier].clone());
            }
        }
        None
    }

    async fn probe_one(
        &self,
        candidate: &CandidateEndpoint,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProbeOutcome {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                ProbeOutcome::failed(candidate.clone(), ProbeFailure::Cancelled)
            }
            outcome = self.probe.check(candidate, timeout) => outcome,
        }
    }
}
