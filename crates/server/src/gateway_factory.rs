use std::sync::Arc;
use std::time::Duration;

use procgate_crypto::ExposeSecret;
use procgate_gateway::{
    Gateway, GatewayBuilder, HttpLegacyAuthenticator, InternalCredentialManager,
};
use tracing::info;

use crate::audit_factory::create_audit_emitter;
use crate::auth::JwtValidator;
use crate::config::{ProcgateConfig, ResolvedSecrets};
use crate::error::ServerError;

/// Wire the credential manager, validator and audit writer into a gateway.
///
/// One HTTP client is shared by login and business calls.
pub async fn create_gateway(
    config: &ProcgateConfig,
    secrets: &ResolvedSecrets,
) -> Result<Gateway, ServerError> {
    let gateway_config = config.gateway_config();

    let client = reqwest::Client::builder()
        .timeout(gateway_config.request_timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| ServerError::Config(format!("http client: {e}")))?;

    let authenticator = HttpLegacyAuthenticator::new(
        client.clone(),
        &config.legacy.base_url,
        &config.legacy.auth_path,
        config.legacy.username.clone(),
        secrets.legacy_password.clone(),
    );
    info!(
        url = %authenticator.url(),
        username = %config.legacy.username,
        "legacy login configured"
    );

    let credentials =
        InternalCredentialManager::new(Arc::new(authenticator), config.credential_policy());

    let validator = JwtValidator::new(
        secrets.jwt_secret.expose_secret(),
        config.auth.issuer.clone(),
        config.auth.token_expiry_seconds,
    );

    let mut builder = GatewayBuilder::new()
        .config(gateway_config)
        .client(client)
        .credentials(credentials)
        .validator(Arc::new(validator));

    if let Some(emitter) = create_audit_emitter(&config.audit).await? {
        info!(
            backend = %config.audit.backend,
            capacity = config.audit.queue_capacity,
            "audit writer started"
        );
        builder = builder.audit(emitter);
    }

    Ok(builder.build()?)
}
