//! Sequential, batch-by-batch sweep over the configured subnets.

use netguardian_types::{CandidateEndpoint, SubnetPrefix};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::batch::BatchScanner;
use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;

/// Progress report emitted at the start of each subnet and after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    /// Position of `prefix` in the sweep's prefix list (0-based).
    pub subnet_index: usize,
    pub prefix: SubnetPrefix,
    /// `round(hosts processed / hosts in subnet * 100)`; 0 when a subnet starts.
    pub percent_complete: u8,
}

/// Walks prefixes in order, scanning each one batch by batch.
///
/// Batches never overlap: batch *n+1* of a subnet, or the first batch of the
/// next subnet, starts only after batch *n* has settled. The first batch
/// that produces a winner ends the sweep.
pub struct SubnetSweeper {
    scanner: BatchScanner,
    config: DiscoveryConfig,
}

impl SubnetSweeper {
    pub fn new(scanner: BatchScanner, config: DiscoveryConfig) -> Self {
        Self { scanner, config }
    }

    /// Every candidate of `prefix`, ascending by last octet.
    pub fn hosts(&self, prefix: SubnetPrefix) -> Vec<CandidateEndpoint> {
        self.config
            .host_range()
            .map(|octet| self.config.candidate(prefix, octet))
            .collect()
    }

    /// Sweep `prefixes` in order.
    ///
    /// Returns `Ok(None)` only after every prefix was fully scanned, and
    /// `Err(Cancelled)` as soon as `cancel` fires.
    pub async fn sweep<F>(
        &self,
        prefixes: &[SubnetPrefix],
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<Option<CandidateEndpoint>, DiscoveryError>
    where
        F: FnMut(SweepProgress),
    {
        let batch_size = self.config.batch_size.max(1);
        let timeout = self.config.sweep_timeout();

        for (subnet_index, &prefix) in prefixes.iter().enumerate() {
            let hosts = self.hosts(prefix);
            let total = hosts.len();
            info!(%prefix, subnet_index, hosts = total, "sweeping subnet");
            on_progress(SweepProgress {
                subnet_index,
                prefix,
                percent_complete: 0,
            });

            let mut processed = 0;
            for batch in hosts.chunks(batch_size) {
                if cancel.is_cancelled() {
                    return Err(DiscoveryError::Cancelled);
                }

                let winner = self.scanner.scan_batch(batch, timeout, cancel).await;
                if cancel.is_cancelled() {
                    return Err(DiscoveryError::Cancelled);
                }

                processed += batch.len();
                on_progress(SweepProgress {
                    subnet_index,
                    prefix,
                    percent_complete: percent(processed, total),
                });

                if let Some(endpoint) = winner {
                    info!(%prefix, %endpoint, "backend found");
                    return Ok(Some(endpoint));
                }
            }
            debug!(%prefix, "subnet exhausted");
        }

        Ok(None)
    }
}

/// `round(processed / total * 100)`, held at 99 until the subnet is done.
fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 || processed >= total {
        return 100;
    }
    let rounded = (processed * 100 + total / 2) / total;
    u8::try_from(rounded.min(99)).unwrap_or(99)
}
