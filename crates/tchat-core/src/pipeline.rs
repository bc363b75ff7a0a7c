use crate::extract::{Extractor, DEFAULT_MAX_FRAGMENT_BYTES};
use crate::ingest::{Ingestor, DEFAULT_POLL_INTERVAL};
use crate::outbound::{self, RecordReceiver, DEFAULT_BACKPRESSURE, DEFAULT_CAPACITY};
use crate::record::FingerprintMode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub poll_interval: Duration,
    pub channel_capacity: usize,
    pub backpressure: Duration,
    pub fingerprint: FingerprintMode,
    pub max_fragment_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_capacity: DEFAULT_CAPACITY,
            backpressure: DEFAULT_BACKPRESSURE,
            fingerprint: FingerprintMode::default(),
            max_fragment_bytes: DEFAULT_MAX_FRAGMENT_BYTES,
        }
    }
}

/// The ingest side (dedup store plus sending half) and the receiving half
/// of one chat feed, built together so neither lives in a global.
pub struct Pipeline {
    ingestor: Ingestor,
    receiver: RecordReceiver,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let (sender, receiver) = outbound::channel(config.channel_capacity, config.backpressure);
        let ingestor = Ingestor::new(
            Extractor::new(config.max_fragment_bytes),
            config.fingerprint,
            config.poll_interval,
            sender,
        );
        Self { ingestor, receiver }
    }

    pub fn split(self) -> (Ingestor, RecordReceiver) {
        (self.ingestor, self.receiver)
    }
}
