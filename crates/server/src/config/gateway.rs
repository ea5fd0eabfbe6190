use procgate_gateway::AnonymousPassthrough;
use serde::Deserialize;

/// Forwarding behavior of the front door.
#[derive(Debug, Deserialize)]
pub struct GatewaySection {
    /// Supplier code used when the caller carries no supplier identity.
    #[serde(default = "default_supplier")]
    pub default_supplier: String,
    /// What to do with pass-through calls that present no credential.
    #[serde(default)]
    pub anonymous_passthrough: AnonymousPassthrough,
    /// Inbound path prefix for generic pass-through. Stripped before
    /// forwarding.
    #[serde(default = "default_passthrough_prefix")]
    pub passthrough_prefix: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            default_supplier: default_supplier(),
            anonymous_passthrough: AnonymousPassthrough::default(),
            passthrough_prefix: default_passthrough_prefix(),
        }
    }
}

fn default_supplier() -> String {
    "WBDY".to_owned()
}

fn default_passthrough_prefix() -> String {
    "/api/v1/internal".to_owned()
}
