use procgate_crypto::SecretString;
use serde::Deserialize;

/// Where the legacy system lives and how the gateway logs into it.
#[derive(Debug, Deserialize)]
pub struct LegacyConfig {
    /// Scheme, host and optional port of the legacy system.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Login endpoint, relative to `base_url`.
    #[serde(default = "default_auth_path")]
    pub auth_path: String,
    /// Generic procedure endpoint, relative to `base_url`.
    #[serde(default = "default_procedure_path")]
    pub procedure_path: String,
    /// Service account used for the internal credential.
    #[serde(default)]
    pub username: String,
    /// Service account password. May be an `ENC[AES256-GCM,...]` value;
    /// `PROCGATE_LEGACY_PASSWORD` takes precedence when set.
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Bound on every outbound business call.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Bound on a single login call.
    #[serde(default = "default_login_timeout")]
    pub login_timeout_seconds: u64,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_path: default_auth_path(),
            procedure_path: default_procedure_path(),
            username: String::new(),
            password: None,
            timeout_seconds: default_timeout(),
            login_timeout_seconds: default_login_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:9000".to_owned()
}

fn default_auth_path() -> String {
    "/api/Login/Login".to_owned()
}

fn default_procedure_path() -> String {
    "/api/Public/GetProcedureDataSet".to_owned()
}

fn default_timeout() -> u64 {
    15
}

fn default_login_timeout() -> u64 {
    10
}
