//! Mock probe for testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netguardian_types::{CandidateEndpoint, ProbeFailure, ProbeOutcome};

use crate::probe::Probe;

/// Shared state for observing what `MockProbe` did.
#[derive(Debug, Default)]
struct MockProbeState {
    live: HashSet<CandidateEndpoint>,
    latency: HashMap<CandidateEndpoint, Duration>,
    default_latency: Duration,
    probed: Vec<CandidateEndpoint>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Scripted probe: a fixed set of candidates is alive, everything else
/// fails with [`ProbeFailure::Connect`].
///
/// Responses wait for their configured latency on the tokio clock, so tests
/// running with paused time stay deterministic. A live candidate whose
/// latency exceeds the probe timeout fails with [`ProbeFailure::Timeout`].
#[derive(Clone, Default)]
pub struct MockProbe {
    state: Arc<Mutex<MockProbeState>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A probe where exactly `live` answers.
    pub fn with_live<I>(live: I) -> Self
    where
        I: IntoIterator<Item = CandidateEndpoint>,
    {
        let probe = Self::new();
        for candidate in live {
            probe.set_live(candidate);
        }
        probe
    }

    pub fn set_live(&self, candidate: CandidateEndpoint) {
        self.state.lock().unwrap().live.insert(candidate);
    }

    pub fn set_dead(&self, candidate: &CandidateEndpoint) {
        self.state.lock().unwrap().live.remove(candidate);
    }

    /// Latency applied to every candidate without its own latency.
    pub fn set_default_latency(&self, latency: Duration) {
        self.state.lock().unwrap().default_latency = latency;
    }

    pub fn set_latency(&self, candidate: CandidateEndpoint, latency: Duration) {
        self.state.lock().unwrap().latency.insert(candidate, latency);
    }

    /// Get a clonable handle for observing probe activity from tests.
    pub fn handle(&self) -> MockProbeHandle {
        MockProbeHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Clonable observer handle for `MockProbe`.
#[derive(Clone)]
pub struct MockProbeHandle {
    state: Arc<Mutex<MockProbeState>>,
}

impl MockProbeHandle {
    /// Every candidate probed so far, in issue order.
    pub fn probed(&self) -> Vec<CandidateEndpoint> {
        self.state.lock().unwrap().probed.clone()
    }

    pub fn probe_count(&self) -> usize {
        self.state.lock().unwrap().probed.len()
    }

    /// Whether `candidate` was probed at least once.
    pub fn was_probed(&self, candidate: &CandidateEndpoint) -> bool {
        self.state.lock().unwrap().probed.contains(candidate)
    }

    /// Highest number of probes observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    /// Probes issued but not yet settled or dropped.
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }
}

/// Decrements the in-flight count when a probe settles or is dropped.
struct InFlightGuard(Arc<Mutex<MockProbeState>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.lock() {
            state.in_flight -= 1;
        }
    }
}

#[async_trait]
impl Probe for MockProbe {
    async fn check(&self, candidate: &CandidateEndpoint, timeout: Duration) -> ProbeOutcome {
        let (alive, latency) = {
            let mut state = self.state.lock().unwrap();
            state.probed.push(candidate.clone());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            let latency = state
                .latency
                .get(candidate)
                .copied()
                .unwrap_or(state.default_latency);
            (state.live.contains(candidate), latency)
        };
        let _guard = InFlightGuard(Arc::clone(&self.state));

        if latency >= timeout {
            tokio::time::sleep(timeout).await;
            return ProbeOutcome::failed(candidate.clone(), ProbeFailure::Timeout);
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if alive {
            ProbeOutcome::alive(candidate.clone())
        } else {
            ProbeOutcome::failed(candidate.clone(), ProbeFailure::Connect)
        }
    }
}
