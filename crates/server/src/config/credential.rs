use serde::Deserialize;

/// Refresh timing for the internal credential.
#[derive(Debug, Deserialize)]
pub struct CredentialConfig {
    /// Refresh ahead once the remaining lifetime drops to this many seconds.
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_seconds: u64,
    /// Lifetime assumed when the legacy token carries no readable expiry.
    #[serde(default = "default_lifetime")]
    pub default_lifetime_seconds: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_seconds: default_refresh_threshold(),
            default_lifetime_seconds: default_lifetime(),
        }
    }
}

fn default_refresh_threshold() -> u64 {
    3600
}

fn default_lifetime() -> u64 {
    36_000
}
