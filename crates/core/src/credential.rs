use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::token::mask_token;

/// The legacy session token shared by every request in the process.
///
/// Instances are immutable: a refresh builds a new value and swaps it in
/// whole, so `token` and `expires_at` are always observed together.
#[derive(Clone, PartialEq, Eq)]
pub struct InternalCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl InternalCredential {
    /// Create a credential from a raw token and its absolute expiry.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// The raw session token, for the outbound `Authorization` header only.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the legacy system stops accepting this token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Time left before hard expiry (negative once expired).
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// `true` while the remaining lifetime is above `threshold`.
    pub fn is_fresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.remaining(now) > threshold
    }

    /// `true` while the legacy system still accepts the token.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for InternalCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalCredential")
            .field("token", &mask_token(&self.token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
