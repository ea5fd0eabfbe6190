use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use procgate_audit::error::AuditError;
use procgate_audit::record::AuditRecord;
use procgate_audit::store::AuditStore;

/// In-memory audit store using `DashMap`. Suitable for development and testing.
///
/// Records are keyed by record ID, with a secondary index from request ID so
/// tests can look up what a given request produced.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: DashMap<String, (u64, AuditRecord)>,
    seq: AtomicU64,
    by_request: DashMap<String, Vec<String>>,
}

impl MemoryAuditStore {
    /// Create a new empty in-memory audit store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        let mut all: Vec<(u64, AuditRecord)> =
            self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, rec)| rec).collect()
    }

    /// Records produced for a given request ID.
    pub fn for_request(&self, request_id: &str) -> Vec<AuditRecord> {
        let Some(ids) = self.by_request.get(request_id) else {
            return Vec::new();
        };
        ids.value()
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.value().1.clone()))
            .collect()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        let id = entry.id.clone();
        let request_id = entry.request_id.clone();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.records.insert(id.clone(), (seq, entry));
        self.by_request.entry(request_id).or_default().push(id);
        Ok(())
    }
}
