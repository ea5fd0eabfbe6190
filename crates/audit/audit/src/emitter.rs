use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::record::AuditRecord;
use crate::store::AuditStore;

/// Fire-and-forget front for an [`AuditStore`].
///
/// Records go into a bounded queue drained by a single background task, so
/// the request path never waits on the store. When the queue is full the
/// newest record is dropped and counted.
pub struct AuditEmitter {
    tx: mpsc::Sender<AuditRecord>,
    dropped: AtomicU64,
    written: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl AuditEmitter {
    /// Spawn the consumer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn AuditStore>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity.max(1));
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let written = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let token = cancel.clone();
        let (w, f) = (Arc::clone(&written), Arc::clone(&failed));
        tracker.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    rec = rx.recv() => match rec {
                        Some(rec) => write(&*store, rec, &w, &f).await,
                        None => break,
                    },
                    () = token.cancelled() => {
                        rx.close();
                        while let Some(rec) = rx.recv().await {
                            write(&*store, rec, &w, &f).await;
                        }
                        break;
                    }
                }
            }
            debug!("audit consumer stopped");
        });
        tracker.close();

        Self {
            tx,
            dropped: AtomicU64::new(0),
            written,
            failed,
            cancel,
            tracker,
        }
    }

    /// Enqueue a record without waiting.
    pub fn emit(&self, record: AuditRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(rec)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    request_id = %rec.request_id,
                    operation = %rec.operation,
                    dropped_total = total,
                    "audit queue full, dropping record"
                );
            }
            Err(TrySendError::Closed(rec)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %rec.request_id, "audit emitter closed, dropping record");
            }
        }
    }

    /// Records dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records handed to the store successfully.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Records the store rejected.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Stop accepting records and drain what is queued, waiting at most
    /// `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        self.cancel.cancel();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "audit drain timed out, remaining records lost"
            );
        } else {
            info!(written = self.written(), dropped = self.dropped(), "audit drained");
        }
    }
}

async fn write(store: &dyn AuditStore, rec: AuditRecord, written: &AtomicU64, failed: &AtomicU64) {
    let request_id = rec.request_id.clone();
    match store.record(rec).await {
        Ok(()) => {
            written.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            failed.fetch_add(1, Ordering::Relaxed);
            warn!(%request_id, error = %e, "audit recording failed");
        }
    }
}
