mod audit;
mod auth;
mod credential;
mod gateway;
mod legacy;
mod server;


pub use audit::*;
pub use auth::*;
pub use credential::*;
pub use gateway::*;
pub use legacy::*;
pub use server::*;

use std::path::Path;
use std::time::Duration;

use procgate_crypto::{ExposeSecret, MasterKey, SecretString, parse_master_key, resolve_secret};
use procgate_gateway::{CredentialPolicy, GatewayConfig};
use serde::Deserialize;

use crate::error::ServerError;

/// Environment variable holding the AES-256 key for `ENC[...]` values.
pub const MASTER_KEY_ENV: &str = "PROCGATE_MASTER_KEY";
/// Environment override for `[legacy] password`.
pub const LEGACY_PASSWORD_ENV: &str = "PROCGATE_LEGACY_PASSWORD";
/// Environment override for `[auth] jwt_secret`.
pub const JWT_SECRET_ENV: &str = "PROCGATE_JWT_SECRET";

/// Top-level configuration for the procgate server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct ProcgateConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Legacy system location and service account.
    #[serde(default)]
    pub legacy: LegacyConfig,
    /// Internal credential refresh timing.
    #[serde(default)]
    pub credential: CredentialConfig,
    /// Front door forwarding behavior.
    #[serde(default)]
    pub gateway: GatewaySection,
    /// External bearer token settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Audit trail configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Secret material after decryption and environment overrides.
pub struct ResolvedSecrets {
    pub legacy_password: SecretString,
    pub jwt_secret: SecretString,
}

impl ProcgateConfig {
    /// Read `path`, or fall back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        if !path.exists() {
            return toml::from_str("").map_err(|e| ServerError::Config(e.to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Structural checks that need no secrets.
    pub fn validate(&self) -> Result<(), ServerError> {
        let url = reqwest::Url::parse(self.legacy.base_url.trim())
            .map_err(|e| ServerError::Config(format!("[legacy] base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServerError::Config(format!(
                "[legacy] base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.legacy.username.trim().is_empty() {
            return Err(ServerError::Config("[legacy] username is required".into()));
        }
        if self.legacy.timeout_seconds == 0 || self.legacy.login_timeout_seconds == 0 {
            return Err(ServerError::Config(
                "[legacy] timeouts must be positive".into(),
            ));
        }

        let cred = &self.credential;
        if cred.refresh_threshold_seconds == 0 || cred.default_lifetime_seconds == 0 {
            return Err(ServerError::Config(
                "[credential] refresh threshold and default lifetime must be positive".into(),
            ));
        }
        if cred.refresh_threshold_seconds >= cred.default_lifetime_seconds {
            return Err(ServerError::Config(format!(
                "[credential] refresh_threshold_seconds ({}) must be below default_lifetime_seconds ({})",
                cred.refresh_threshold_seconds, cred.default_lifetime_seconds
            )));
        }

        let prefix = &self.gateway.passthrough_prefix;
        if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
            return Err(ServerError::Config(format!(
                "[gateway] passthrough_prefix must look like \"/segment\", got {prefix:?}"
            )));
        }

        if self.audit.enabled && self.audit.queue_capacity == 0 {
            return Err(ServerError::Config(
                "[audit] queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the legacy password and JWT secret from `env` and the file.
    ///
    /// Environment values win over file values. Either may be sealed with
    /// the master key from [`MASTER_KEY_ENV`].
    pub fn resolve_secrets<F>(&self, env: F) -> Result<ResolvedSecrets, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let master_key = master_key(&env)?;
        let legacy_password = resolve_one(
            "[legacy] password",
            env(LEGACY_PASSWORD_ENV),
            self.legacy.password.as_ref(),
            master_key.as_ref(),
        )?;
        let jwt_secret = self.jwt_secret_with(&env, master_key.as_ref())?;

        Ok(ResolvedSecrets {
            legacy_password,
            jwt_secret,
        })
    }

    /// Resolve only the JWT secret, for tooling that never calls the legacy
    /// system.
    pub fn resolve_jwt_secret<F>(&self, env: F) -> Result<SecretString, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let master_key = master_key(&env)?;
        self.jwt_secret_with(&env, master_key.as_ref())
    }

    fn jwt_secret_with<F>(
        &self,
        env: &F,
        master_key: Option<&MasterKey>,
    ) -> Result<SecretString, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve_one(
            "[auth] jwt_secret",
            env(JWT_SECRET_ENV),
            self.auth.jwt_secret.as_ref(),
            master_key,
        )
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.legacy.base_url.trim().to_owned(),
            procedure_path: self.legacy.procedure_path.clone(),
            default_supplier: self.gateway.default_supplier.clone(),
            anonymous_passthrough: self.gateway.anonymous_passthrough,
            request_timeout: Duration::from_secs(self.legacy.timeout_seconds),
        }
    }

    pub fn credential_policy(&self) -> CredentialPolicy {
        CredentialPolicy {
            refresh_threshold: Duration::from_secs(self.credential.refresh_threshold_seconds),
            default_lifetime: Duration::from_secs(self.credential.default_lifetime_seconds),
            login_timeout: Duration::from_secs(self.legacy.login_timeout_seconds),
        }
    }
}

fn master_key<F>(env: &F) -> Result<Option<MasterKey>, ServerError>
where
    F: Fn(&str) -> Option<String>,
{
    env(MASTER_KEY_ENV)
        .map(|raw| {
            parse_master_key(&raw)
                .map_err(|e| ServerError::Config(format!("invalid {MASTER_KEY_ENV}: {e}")))
        })
        .transpose()
}

fn resolve_one(
    what: &str,
    from_env: Option<String>,
    from_file: Option<&SecretString>,
    master_key: Option<&MasterKey>,
) -> Result<SecretString, ServerError> {
    let resolved = match (from_env, from_file) {
        (Some(raw), _) => resolve_secret(&raw, master_key),
        (None, Some(raw)) => resolve_secret(raw.expose_secret(), master_key),
        (None, None) => return Err(ServerError::Config(format!("{what} is required"))),
    }
    .map_err(|e| ServerError::Config(format!("{what}: {e}")))?;

    if resolved.expose_secret().is_empty() {
        return Err(ServerError::Config(format!("{what} must not be empty")));
    }
    Ok(resolved)
}
