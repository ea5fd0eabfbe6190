use std::sync::Arc;

use procgate_audit::AuditEmitter;
use reqwest::Client;

use crate::credential::InternalCredentialManager;
use crate::error::GatewayError;
use crate::gateway::{Gateway, GatewayConfig};
use crate::translator::LegacyTranslator;
use crate::validator::CredentialValidator;

/// Fluent builder for constructing a [`Gateway`] instance.
///
/// A credential manager and a validator must be supplied. Without an audit
/// emitter the gateway forwards without recording; without an HTTP client
/// one is built with the configured request timeout.
pub struct GatewayBuilder {
    config: GatewayConfig,
    client: Option<Client>,
    credentials: Option<InternalCredentialManager>,
    validator: Option<Arc<dyn CredentialValidator>>,
    audit: Option<Arc<AuditEmitter>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            client: None,
            credentials: None,
            validator: None,
            audit: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an HTTP client (e.g. with the login authenticator) so the
    /// process keeps one connection pool.
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the internal credential manager. Its metrics become the
    /// gateway's metrics.
    #[must_use]
    pub fn credentials(mut self, manager: InternalCredentialManager) -> Self {
        self.credentials = Some(manager);
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn audit(mut self, emitter: Arc<AuditEmitter>) -> Self {
        self.audit = Some(emitter);
        self
    }

    pub fn build(self) -> Result<Gateway, GatewayError> {
        let credentials = self.credentials.ok_or_else(|| {
            GatewayError::Configuration("credential manager is required".into())
        })?;
        let validator = self
            .validator
            .ok_or_else(|| GatewayError::Configuration("credential validator is required".into()))?;

        let base = self.config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(GatewayError::Configuration(format!(
                "legacy base URL must be http(s), got {base:?}"
            )));
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.config.request_timeout)
                .build()
                .map_err(|e| GatewayError::Configuration(format!("http client: {e}")))?,
        };

        let metrics = Arc::clone(credentials.metrics());
        Ok(Gateway {
            translator: LegacyTranslator::new(self.config.default_supplier.clone()),
            config: self.config,
            client,
            credentials,
            validator,
            audit: self.audit,
            metrics,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
