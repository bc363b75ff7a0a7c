//! Producer side: probe the page, turn fragments into records, hand them
//! to the UI loop.

use crate::dedup::DedupStore;
use crate::error::ProbeError;
use crate::extract::Extractor;
use crate::outbound::{Delivery, RecordSender};
use crate::record::{FingerprintMode, RawFragment};
use crate::session::{FragmentProbe, SessionLease, SessionRelease};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestExit {
    Stopped,
    SessionLost(ProbeError),
    ConsumerGone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub polls: u64,
    pub fragments: u64,
    pub delivered: u64,
    pub duplicates: u64,
    pub empty: u64,
    pub extraction_errors: u64,
    pub probe_errors: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub exit: IngestExit,
    pub stats: IngestStats,
    /// This task performed the session close (another holder may have
    /// done it first).
    pub released_session: bool,
}

pub struct Ingestor {
    extractor: Extractor,
    fingerprint: FingerprintMode,
    poll_interval: Duration,
    dedup: DedupStore,
    sender: RecordSender,
    stats: IngestStats,
}

impl Ingestor {
    pub(crate) fn new(
        extractor: Extractor,
        fingerprint: FingerprintMode,
        poll_interval: Duration,
        sender: RecordSender,
    ) -> Self {
        Self {
            extractor,
            fingerprint,
            poll_interval,
            dedup: DedupStore::new(),
            sender,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Polls until `shutdown` flips to `true`, the session is lost or the
    /// receiver is dropped, then releases the session.
    pub async fn run<S>(
        mut self,
        lease: Arc<SessionLease<S>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> IngestReport
    where
        S: FragmentProbe + SessionRelease,
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            event = "ingest_start",
            poll_ms = self.poll_interval.as_millis() as u64,
            fingerprint = self.fingerprint.as_str()
        );

        let exit = loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break IngestExit::Stopped,
                _ = ticker.tick() => {}
            }
            // Receiver dropped while the feed was idle.
            if self.sender.is_closed() {
                break IngestExit::ConsumerGone;
            }

            self.stats.polls += 1;
            let polled = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break IngestExit::Stopped,
                polled = lease.poll_new_fragments() => polled,
            };

            let fragments = match polled {
                Ok(fragments) => fragments,
                Err(err) if err.is_fatal() => {
                    error!(event = "probe_fatal", error = %err);
                    break IngestExit::SessionLost(err);
                }
                Err(err) => {
                    self.stats.probe_errors += 1;
                    warn!(event = "probe_failed", error = %err, failures = self.stats.probe_errors);
                    continue;
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break IngestExit::Stopped,
                outcome = self.ingest_batch(fragments) => outcome,
            };
            if let Some(exit) = outcome {
                break exit;
            }
        };

        self.drain_on_exit(exit, &lease).await
    }

    /// Runs one probe batch through extract, normalize and dedup, in order.
    /// Returns an exit reason when the receiver has gone away.
    pub async fn ingest_batch(&mut self, fragments: Vec<RawFragment>) -> Option<IngestExit> {
        for fragment in fragments {
            self.stats.fragments += 1;
            let raw = match self.extractor.extract(&fragment) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    self.stats.empty += 1;
                    debug!(event = "fragment_empty", bytes = fragment.len());
                    continue;
                }
                Err(err) => {
                    self.stats.extraction_errors += 1;
                    warn!(event = "fragment_extract_failed", error = %err);
                    continue;
                }
            };

            let record = raw.into_record();
            let fp = record.fingerprint(self.fingerprint);
            if self.dedup.seen(&fp) {
                self.stats.duplicates += 1;
                debug!(event = "fragment_duplicate", fingerprint = %fp.short_hex());
                continue;
            }
            self.dedup.record(fp);

            match self.sender.deliver(record).await {
                Delivery::Queued => self.stats.delivered += 1,
                Delivery::Dropped => {
                    self.stats.dropped += 1;
                    warn!(
                        event = "record_dropped",
                        fingerprint = %fp.short_hex(),
                        dropped = self.stats.dropped
                    );
                }
                Delivery::Closed => return Some(IngestExit::ConsumerGone),
            }
        }
        None
    }

    async fn drain_on_exit<S>(self, exit: IngestExit, lease: &SessionLease<S>) -> IngestReport
    where
        S: SessionRelease,
    {
        debug!(event = "ingest_draining", exit = ?exit, seen = self.dedup.len());
        let released_session = lease.release("ingest").await;
        let Ingestor { stats, sender, .. } = self;
        // Closing our end lets the UI loop observe the disconnect once the
        // backlog is drained.
        drop(sender);
        info!(
            event = "ingest_stop",
            exit = ?exit,
            polls = stats.polls,
            delivered = stats.delivered,
            duplicates = stats.duplicates,
            dropped = stats.dropped,
            probe_errors = stats.probe_errors
        );
        IngestReport {
            exit,
            stats,
            released_session,
        }
    }
}

/// Resolves once a stop has been requested or the controller is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
