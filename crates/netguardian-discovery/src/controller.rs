//! Top-level discovery orchestration: cache first, then sweep.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use netguardian_types::{CandidateEndpoint, DiscoveryState, ProbeFailure, EXHAUSTED_REASON};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::batch::BatchScanner;
use crate::cache::EndpointCache;
use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::probe::Probe;
use crate::sweep::{SubnetSweeper, SweepProgress};

/// The run whose results are currently allowed to land.
struct ActiveRun {
    id: u64,
    token: CancellationToken,
}

/// Capacity of the transition stream; a full sweep of four subnets emits
/// about 45 transitions.
const TRANSITION_BUFFER: usize = 256;

/// Drives the discovery state machine and owns the endpoint cache's writes.
///
/// Each call to [`run`](Self::run) starts a fresh run and supersedes any run
/// still in flight: the old run's token is cancelled, and from then on it can
/// neither publish states nor write the cache. The latest state is available
/// through [`subscribe`](Self::subscribe); every individual transition
/// through [`transitions`](Self::transitions).
pub struct DiscoveryController {
    config: DiscoveryConfig,
    probe: Arc<dyn Probe>,
    cache: Arc<dyn EndpointCache>,
    state_tx: watch::Sender<DiscoveryState>,
    transitions_tx: broadcast::Sender<DiscoveryState>,
    active: Mutex<Option<ActiveRun>>,
    next_run_id: AtomicU64,
}

impl DiscoveryController {
    pub fn new(
        config: DiscoveryConfig,
        probe: Arc<dyn Probe>,
        cache: Arc<dyn EndpointCache>,
    ) -> Self {
        let (state_tx, _) = watch::channel(DiscoveryState::Idle);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            config,
            probe,
            cache,
            state_tx,
            transitions_tx,
            active: Mutex::new(None),
            next_run_id: AtomicU64::new(1),
        }
    }

    /// Receiver for state updates. Starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<DiscoveryState> {
        self.state_tx.subscribe()
    }

    /// Every state published from now on, in order. Slow receivers may lag.
    pub fn transitions(&self) -> broadcast::Receiver<DiscoveryState> {
        self.transitions_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> DiscoveryState {
        self.state_tx.borrow().clone()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Start a new discovery run and wait for it to finish.
    ///
    /// Resolves to the verified endpoint, [`DiscoveryError::Exhausted`] when
    /// nothing answered, or [`DiscoveryError::Cancelled`] when this run was
    /// superseded or cancelled before finishing.
    pub async fn run(&self) -> Result<CandidateEndpoint, DiscoveryError> {
        let (id, token) = self.begin();
        info!(run = id, "discovery run started");

        let result = self.drive(id, &token).await;
        self.end(id);

        match &result {
            Ok(endpoint) => info!(run = id, %endpoint, "discovery run finished"),
            Err(DiscoveryError::Cancelled) => info!(run = id, "discovery run superseded"),
            Err(e) => warn!(run = id, error = %e, "discovery run failed"),
        }
        result
    }

    /// Start over from the cache check after a `Failed` run.
    pub async fn retry(&self) -> Result<CandidateEndpoint, DiscoveryError> {
        info!(previous = %self.state(), "retrying discovery");
        self.run().await
    }

    /// Revoke the in-flight run, if any, and return to `Idle`.
    pub fn cancel(&self) {
        let mut active = self.lock_active();
        if let Some(run) = active.take() {
            run.token.cancel();
            self.set_state(DiscoveryState::Idle);
            info!(run = run.id, "discovery run cancelled");
        }
    }

    async fn drive(
        &self,
        id: u64,
        token: &CancellationToken,
    ) -> Result<CandidateEndpoint, DiscoveryError> {
        // Step 1: the cached endpoint, if it still answers.
        self.publish(id, DiscoveryState::ReconnectingCache)?;
        if let Some(endpoint) = self.reconnect_cached(token).await? {
            return self.commit_found(id, endpoint, false);
        }

        // Step 2: sweep.
        let scanner = BatchScanner::new(Arc::clone(&self.probe))
            .cancel_siblings_on_first_success(self.config.cancel_siblings_on_first_success);
        let sweeper = SubnetSweeper::new(scanner, self.config.clone());

        let found = sweeper
            .sweep(
                &self.config.prefixes,
                |progress: SweepProgress| {
                    // Reports from a superseded run are dropped; its token
                    // stops the sweep at the next batch.
                    let _ = self.publish(
                        id,
                        DiscoveryState::Scanning {
                            subnet_index: progress.subnet_index,
                            prefix: progress.prefix,
                            percent_complete: progress.percent_complete,
                        },
                    );
                },
                token,
            )
            .await?;

        match found {
            Some(endpoint) => self.commit_found(id, endpoint, true),
            None => {
                self.publish(
                    id,
                    DiscoveryState::Failed {
                        reason: EXHAUSTED_REASON.to_string(),
                    },
                )?;
                Err(DiscoveryError::Exhausted(EXHAUSTED_REASON.to_string()))
            }
        }
    }

    /// Probe the cached endpoint with the long timeout.
    async fn reconnect_cached(
        &self,
        token: &CancellationToken,
    ) -> Result<Option<CandidateEndpoint>, DiscoveryError> {
        let cached = match self.cache.read() {
            Ok(Some(endpoint)) => endpoint,
            Ok(None) => {
                info!("no cached endpoint");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "endpoint cache unavailable, treating as empty");
                return Ok(None);
            }
        };

        info!(endpoint = %cached, "checking cached endpoint");
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => return Err(DiscoveryError::Cancelled),
            outcome = self.probe.check(&cached, self.config.reconnect_timeout()) => outcome,
        };

        if outcome.success {
            Ok(Some(cached))
        } else {
            info!(
                endpoint = %cached,
                reason = %outcome.failure.unwrap_or(ProbeFailure::Transport),
                "cached endpoint unreachable"
            );
            Ok(None)
        }
    }

    /// Persist (when newly found) and publish `Found`, as one step that a
    /// superseded run cannot take.
    fn commit_found(
        &self,
        id: u64,
        endpoint: CandidateEndpoint,
        persist: bool,
    ) -> Result<CandidateEndpoint, DiscoveryError> {
        let active = self.lock_active();
        if !is_current(active.as_ref(), id) {
            return Err(DiscoveryError::Cancelled);
        }

        if persist {
            // Only the current run may write. The endpoint is verified
            // either way; a cache failure only costs the next run a sweep.
            if let Err(e) = self.cache.write(&endpoint) {
                warn!(endpoint = %endpoint, error = %e, "failed to persist endpoint");
            }
        }

        self.set_state(DiscoveryState::Found {
            endpoint: endpoint.clone(),
        });
        Ok(endpoint)
    }

    fn publish(&self, id: u64, state: DiscoveryState) -> Result<(), DiscoveryError> {
        let active = self.lock_active();
        if !is_current(active.as_ref(), id) {
            return Err(DiscoveryError::Cancelled);
        }
        self.set_state(state);
        Ok(())
    }

    /// Callers hold the `active` lock, which orders publications.
    fn set_state(&self, state: DiscoveryState) {
        // No receivers is fine.
        let _ = self.transitions_tx.send(state.clone());
        self.state_tx.send_replace(state);
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let mut active = self.lock_active();
        if let Some(previous) = active.replace(ActiveRun {
            id,
            token: token.clone(),
        }) {
            previous.token.cancel();
            info!(previous = previous.id, run = id, "superseding in-flight discovery run");
        }
        (id, token)
    }

    fn end(&self, id: u64) {
        let mut active = self.lock_active();
        if is_current(active.as_ref(), id) {
            *active = None;
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_current(active: Option<&ActiveRun>, id: u64) -> bool {
    active.is_some_and(|run| run.id == id)
}
