use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking forwards and credential refreshes.
///
/// All counters use relaxed ordering. For a point-in-time view, call
/// [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Invocations entering [`Gateway::forward`](crate::Gateway::forward).
    pub forwarded: AtomicU64,
    /// Invocations translated into a procedure envelope.
    pub translated: AtomicU64,
    /// Invocations forwarded as generic pass-through.
    pub passthrough: AtomicU64,
    /// Legacy responses relayed to the caller (any status).
    pub relayed: AtomicU64,
    /// Invocations rejected for a missing or invalid credential.
    pub unauthorized: AtomicU64,
    /// Invocations that failed because no internal credential was available.
    pub exchange_failed: AtomicU64,
    /// Invocations where the legacy system was unreachable or timed out.
    pub upstream_unavailable: AtomicU64,
    /// Login calls made to the legacy system.
    pub credential_refreshes: AtomicU64,
    /// Login calls that failed.
    pub credential_refresh_failures: AtomicU64,
    /// Times an unexpired credential was served after a failed refresh.
    pub stale_credential_served: AtomicU64,
}

impl GatewayMetrics {
    pub fn increment_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_translated(&self) {
        self.translated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_passthrough(&self) {
        self.passthrough.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_relayed(&self) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_exchange_failed(&self) {
        self.exchange_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upstream_unavailable(&self) {
        self.upstream_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_credential_refreshes(&self) {
        self.credential_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_credential_refresh_failures(&self) {
        self.credential_refresh_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale_credential_served(&self) {
        self.stale_credential_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            translated: self.translated.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
            relayed: self.relayed.load(Ordering::Relaxed),
            unauthorized: self.unauthorized.load(Ordering::Relaxed),
            exchange_failed: self.exchange_failed.load(Ordering::Relaxed),
            upstream_unavailable: self.upstream_unavailable.load(Ordering::Relaxed),
            credential_refreshes: self.credential_refreshes.load(Ordering::Relaxed),
            credential_refresh_failures: self
                .credential_refresh_failures
                .load(Ordering::Relaxed),
            stale_credential_served: self.stale_credential_served.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`GatewayMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub forwarded: u64,
    pub translated: u64,
    pub passthrough: u64,
    pub relayed: u64,
    pub unauthorized: u64,
    pub exchange_failed: u64,
    pub upstream_unavailable: u64,
    pub credential_refreshes: u64,
    pub credential_refresh_failures: u64,
    pub stale_credential_served: u64,
}
