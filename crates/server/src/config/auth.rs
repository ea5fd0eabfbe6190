use procgate_crypto::SecretString;
use serde::Deserialize;

/// External bearer token settings.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// `iss` claim written into and required from external tokens.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// HMAC secret for HS256 tokens. May be an `ENC[AES256-GCM,...]` value;
    /// `PROCGATE_JWT_SECRET` takes precedence when set.
    #[serde(default)]
    pub jwt_secret: Option<SecretString>,
    /// Lifetime of tokens minted by `issue-token`.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            jwt_secret: None,
            token_expiry_seconds: default_token_expiry(),
        }
    }
}

fn default_issuer() -> String {
    "procgate".to_owned()
}

fn default_token_expiry() -> u64 {
    86_400
}
