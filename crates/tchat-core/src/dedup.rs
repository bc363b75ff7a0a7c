use crate::record::Fingerprint;
use std::collections::HashSet;

/// Fingerprints of every message already delivered. Owned by the ingest
/// task and only ever grows.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<Fingerprint>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, fp: &Fingerprint) -> bool {
        self.seen.contains(fp)
    }

    pub fn record(&mut self, fp: Fingerprint) {
        self.seen.insert(fp);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
