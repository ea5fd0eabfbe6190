use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use procgate_core::Caller;
use procgate_gateway::{CredentialValidator, InvalidCredential};
use serde::{Deserialize, Serialize};

/// Claims carried by external bearer tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer; must match the configured issuer.
    pub iss: String,
    /// Caller name. Doubles as the supplier scope for translated calls.
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Issued at (seconds since epoch).
    pub iat: u64,
    /// Expiry (seconds since epoch).
    pub exp: u64,
}

/// HS256 issuer and verifier for external bearer tokens.
///
/// Verification is local: signature, issuer and expiry only.
pub struct JwtValidator {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: &str, issuer: impl Into<String>, expiry_seconds: u64) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            issuer,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_seconds,
        }
    }

    /// Mint a token for `username`, valid for the configured expiry.
    pub fn issue(
        &self,
        username: &str,
        user_id: Option<&str>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            iss: self.issuer.clone(),
            username: username.to_owned(),
            user_id: user_id.map(str::to_owned),
            iat: now,
            exp: now + self.expiry_seconds,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }
}

impl CredentialValidator for JwtValidator {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    fn validate(&self, token: &str) -> Result<Caller, InvalidCredential> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| InvalidCredential(e.to_string()))?;
        let claims = data.claims;

        let username = claims.username.trim();
        if username.is_empty() {
            return Err(InvalidCredential("token carries no username".to_owned()));
        }
        Ok(Caller::external(username, claims.user_id))
    }
}
