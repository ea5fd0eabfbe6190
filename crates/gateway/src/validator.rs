use procgate_core::{Caller, peek_claims};
use thiserror::Error;

/// An external credential failed validation.
#[derive(Debug, Error)]
#[error("invalid external credential: {0}")]
pub struct InvalidCredential(pub String);

/// Verifies bearer tokens issued by this system's own auth layer.
///
/// Validation is local (no network) and stateless, so the trait is
/// synchronous.
pub trait CredentialValidator: Send + Sync {
    /// Issuer this validator signs and accepts.
    fn issuer(&self) -> &str;

    /// Verify signature and expiry and extract the caller identity.
    fn validate(&self, token: &str) -> Result<Caller, InvalidCredential>;

    /// Whether `token` claims to be one of ours. Tokens that do not are
    /// treated as legacy-native and forwarded untouched.
    ///
    /// This reads the unverified `iss` claim only; [`validate`](Self::validate)
    /// does the real check.
    fn recognizes(&self, token: &str) -> bool {
        peek_claims(token).is_ok_and(|c| c.iss.as_deref() == Some(self.issuer()))
    }
}
