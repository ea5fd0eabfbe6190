//! The process-wide internal session credential.
//!
//! Readers take the fast path under a shared read lock. When the cached
//! credential is missing or inside the refresh threshold, callers queue on a
//! separate refresher mutex, re-check, and at most one of them performs the
//! login. Token and expiry are swapped together as a single `Arc`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use procgate_core::{InternalCredential, mask_token, peek_claims};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::error::GatewayError;
use crate::login::{LegacyAuthenticator, LoginError};
use crate::metrics::GatewayMetrics;

/// Timing knobs for the internal credential.
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    /// Refresh once the remaining lifetime drops to this or below.
    pub refresh_threshold: Duration,
    /// Lifetime assumed when the token carries no readable `exp` claim.
    pub default_lifetime: Duration,
    /// Upper bound on a single login call.
    pub login_timeout: Duration,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::from_secs(3600),
            default_lifetime: Duration::from_secs(10 * 3600),
            login_timeout: Duration::from_secs(10),
        }
    }
}

/// What the health endpoint may know about the cached credential.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub cached: bool,
    pub fresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

struct Inner {
    authenticator: Arc<dyn LegacyAuthenticator>,
    policy: CredentialPolicy,
    current: RwLock<Option<Arc<InternalCredential>>>,
    refresher: Mutex<()>,
    metrics: Arc<GatewayMetrics>,
}

/// Owns the single internal credential for the process.
///
/// Cheap to clone; clones share the same credential.
#[derive(Clone)]
pub struct InternalCredentialManager {
    inner: Arc<Inner>,
}

impl InternalCredentialManager {
    pub fn new(authenticator: Arc<dyn LegacyAuthenticator>, policy: CredentialPolicy) -> Self {
        Self::with_metrics(authenticator, policy, Arc::new(GatewayMetrics::default()))
    }

    pub fn with_metrics(
        authenticator: Arc<dyn LegacyAuthenticator>,
        policy: CredentialPolicy,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                authenticator,
                policy,
                current: RwLock::new(None),
                refresher: Mutex::new(()),
                metrics,
            }),
        }
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.inner.metrics
    }

    pub fn policy(&self) -> &CredentialPolicy {
        &self.inner.policy
    }

    /// Return a credential the legacy system will accept, refreshing it first
    /// if it is missing or close to expiry.
    ///
    /// The refresh runs on its own task, so dropping this future does not
    /// abort a login other callers are waiting on.
    pub async fn get_credential(&self) -> Result<Arc<InternalCredential>, GatewayError> {
        if let Some(cred) = self.inner.fresh().await {
            return Ok(cred);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.refresh().await })
            .await
            .map_err(|e| GatewayError::ExchangeFailed(format!("refresh task aborted: {e}")))?
    }

    /// Cached credential state without the token.
    pub async fn snapshot(&self) -> CredentialStatus {
        let current = self.inner.current.read().await.clone();
        match current {
            Some(cred) => CredentialStatus {
                cached: true,
                fresh: cred.is_fresh(Utc::now(), self.inner.threshold()),
                expires_at: Some(cred.expires_at()),
            },
            None => CredentialStatus {
                cached: false,
                fresh: false,
                expires_at: None,
            },
        }
    }
}

impl Inner {
    fn threshold(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.policy.refresh_threshold).unwrap_or(chrono::Duration::MAX)
    }

    async fn fresh(&self) -> Option<Arc<InternalCredential>> {
        let guard = self.current.read().await;
        guard
            .as_ref()
            .filter(|c| c.is_fresh(Utc::now(), self.threshold()))
            .cloned()
    }

    async fn refresh(&self) -> Result<Arc<InternalCredential>, GatewayError> {
        let _section = self.refresher.lock().await;

        // Another caller may have refreshed while we waited.
        let previous = self.current.read().await.clone();
        if let Some(cred) = previous
            .as_ref()
            .filter(|c| c.is_fresh(Utc::now(), self.threshold()))
        {
            return Ok(Arc::clone(cred));
        }

        self.metrics.increment_credential_refreshes();
        let attempt = tokio::time::timeout(self.policy.login_timeout, self.authenticator.login())
            .await
            .unwrap_or(Err(LoginError::Timeout));

        match attempt {
            Ok(token) => {
                let cred = Arc::new(self.credential_from(token));
                *self.current.write().await = Some(Arc::clone(&cred));
                info!(
                    token = %mask_token(cred.token()),
                    expires_at = %cred.expires_at(),
                    "internal credential refreshed"
                );
                Ok(cred)
            }
            Err(e) => {
                self.metrics.increment_credential_refresh_failures();
                match previous {
                    Some(stale) if stale.is_usable(Utc::now()) => {
                        self.metrics.increment_stale_credential_served();
                        warn!(
                            error = %e,
                            expires_at = %stale.expires_at(),
                            "credential refresh failed, serving unexpired credential"
                        );
                        Ok(stale)
                    }
                    _ => {
                        error!(error = %e, "credential refresh failed with no usable fallback");
                        Err(GatewayError::ExchangeFailed(e.to_string()))
                    }
                }
            }
        }
    }

    fn credential_from(&self, token: String) -> InternalCredential {
        let now = Utc::now();
        let expires_at = match peek_claims(&token).map(|c| c.expires_at()) {
            Ok(Some(exp)) => exp,
            Ok(None) | Err(_) => {
                let lifetime = chrono::Duration::from_std(self.policy.default_lifetime)
                    .unwrap_or(chrono::Duration::hours(10));
                warn!(
                    lifetime_secs = lifetime.num_seconds(),
                    "internal token has no readable expiry, assuming default lifetime"
                );
                now + lifetime
            }
        };
        if expires_at - now <= self.threshold() {
            warn!(
                %expires_at,
                "internal token lifetime is within the refresh threshold; every call will refresh"
            );
        }
        InternalCredential::new(token, expires_at)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;

    // -- Mock authenticator ---------------------------------------------------

    /// Replays scripted login results, one per call, after `delay`.
    struct ScriptedLogin {
        calls: AtomicUsize,
        delay: Duration,
        script: std::sync::Mutex<VecDeque<Result<String, LoginError>>>,
    }

    impl ScriptedLogin {
        fn new(delay: Duration, script: Vec<Result<String, LoginError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                script: std::sync::Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LegacyAuthenticator for ScriptedLogin {
        async fn login(&self) -> Result<String, LoginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LoginError::Transport("script exhausted".into())))
        }
    }

    // -- Helpers ----------------------------------------------------------------

    fn jwt_expiring_in(secs: i64) -> String {
        let exp = Utc::now().timestamp() + secs;
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp},"n":{secs}}}"#));
        format!("{header}.{body}.sig")
    }

    fn manager(login: &Arc<ScriptedLogin>) -> InternalCredentialManager {
        InternalCredentialManager::new(login.clone(), CredentialPolicy::default())
    }

    // -- Tests --------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_cold_start_logs_in_once() {
        let token = jwt_expiring_in(8 * 3600);
        let login = ScriptedLogin::new(Duration::from_millis(50), vec![Ok(token.clone())]);
        let mgr = manager(&login);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let mgr = mgr.clone();
                tokio::spawn(async move { mgr.get_credential().await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap().token(), token);
        }

        assert_eq!(login.calls(), 1);
        assert_eq!(mgr.metrics().snapshot().credential_refreshes, 1);
    }

    #[tokio::test]
    async fn fresh_credential_is_served_without_login() {
        let login = ScriptedLogin::new(Duration::ZERO, vec![Ok(jwt_expiring_in(8 * 3600))]);
        let mgr = manager(&login);
        let first = mgr.get_credential().await.unwrap();
        let second = mgr.get_credential().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn expiry_comes_from_token_claim() {
        let login = ScriptedLogin::new(Duration::ZERO, vec![Ok(jwt_expiring_in(5 * 3600))]);
        let cred = manager(&login).get_credential().await.unwrap();
        let remaining = cred.remaining(Utc::now()).num_seconds();
        assert!((5 * 3600 - 5..=5 * 3600).contains(&remaining));
    }

    #[tokio::test]
    async fn opaque_token_gets_default_lifetime() {
        let login = ScriptedLogin::new(Duration::ZERO, vec![Ok("opaque-session".into())]);
        let cred = manager(&login).get_credential().await.unwrap();
        let remaining = cred.remaining(Utc::now()).num_seconds();
        assert!((10 * 3600 - 5..=10 * 3600).contains(&remaining));
    }

    #[tokio::test]
    async fn failed_refresh_serves_unexpired_previous_credential() {
        // 30 minutes left: inside the one-hour threshold, so the next call
        // attempts a refresh.
        let old = jwt_expiring_in(30 * 60);
        let login = ScriptedLogin::new(
            Duration::ZERO,
            vec![Ok(old.clone()), Err(LoginError::Status(500))],
        );
        let mgr = manager(&login);
        mgr.get_credential().await.unwrap();

        let served = mgr.get_credential().await.unwrap();
        assert_eq!(served.token(), old);
        assert_eq!(login.calls(), 2);

        let snap = mgr.metrics().snapshot();
        assert_eq!(snap.credential_refresh_failures, 1);
        assert_eq!(snap.stale_credential_served, 1);
    }

    #[tokio::test]
    async fn failed_cold_start_is_an_exchange_error() {
        let login = ScriptedLogin::new(
            Duration::ZERO,
            vec![Err(LoginError::Rejected("bad password".into()))],
        );
        let err = manager(&login).get_credential().await.unwrap_err();
        assert!(matches!(err, GatewayError::ExchangeFailed(_)));
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn expired_previous_credential_is_not_served() {
        let login = ScriptedLogin::new(
            Duration::ZERO,
            vec![Ok(jwt_expiring_in(-10)), Err(LoginError::Timeout)],
        );
        let mgr = manager(&login);
        // The first login "succeeds" with an already-expired token.
        mgr.get_credential().await.unwrap();
        assert!(matches!(
            mgr.get_credential().await,
            Err(GatewayError::ExchangeFailed(_))
        ));
    }

    #[tokio::test]
    async fn near_expiry_refreshes_once_under_concurrency() {
        let old = jwt_expiring_in(20 * 60);
        let new = jwt_expiring_in(8 * 3600);
        let login = ScriptedLogin::new(
            Duration::from_millis(50),
            vec![Ok(old.clone()), Ok(new.clone())],
        );
        let mgr = manager(&login);
        mgr.get_credential().await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let mgr = mgr.clone();
                tokio::spawn(async move { mgr.get_credential().await })
            })
            .collect();
        for h in handles {
            let cred = h.await.unwrap().unwrap();
            // Token and expiry always travel together.
            assert!(cred.token() == new || cred.token() == old);
            let claims = peek_claims(cred.token()).unwrap();
            assert_eq!(claims.expires_at(), Some(cred.expires_at()));
        }
        assert_eq!(login.calls(), 2);
    }

    #[tokio::test]
    async fn slow_login_is_bounded_by_login_timeout() {
        let login = ScriptedLogin::new(Duration::from_secs(60), vec![Ok("late".into())]);
        let mgr = InternalCredentialManager::new(
            login.clone(),
            CredentialPolicy {
                login_timeout: Duration::from_millis(50),
                ..CredentialPolicy::default()
            },
        );
        let err = mgr.get_credential().await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn dropped_caller_does_not_cancel_shared_refresh() {
        let token = jwt_expiring_in(8 * 3600);
        let login = ScriptedLogin::new(Duration::from_millis(100), vec![Ok(token.clone())]);
        let mgr = manager(&login);

        let first = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.get_credential().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        first.abort();

        let cred = mgr.get_credential().await.unwrap();
        assert_eq!(cred.token(), token);
        assert_eq!(login.calls(), 1);
    }

    #[tokio::test]
    async fn snapshot_hides_token() {
        let login = ScriptedLogin::new(Duration::ZERO, vec![Ok(jwt_expiring_in(8 * 3600))]);
        let mgr = manager(&login);
        assert!(!mgr.snapshot().await.cached);

        mgr.get_credential().await.unwrap();
        let snap = mgr.snapshot().await;
        assert!(snap.cached && snap.fresh);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("token"));
    }
}
