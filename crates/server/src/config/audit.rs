use serde::Deserialize;

/// Configuration for the audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// Whether audit recording is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Which backend to use: `"log"`, `"memory"`, or `"postgres"`.
    #[serde(default = "default_audit_backend")]
    pub backend: String,
    /// Connection URL for the audit backend (used by `postgres`).
    pub url: Option<String>,
    /// Table prefix for the audit backend.
    #[serde(default = "default_audit_prefix")]
    pub prefix: String,
    /// Records buffered between request handlers and the writer. When full,
    /// new records are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: default_audit_backend(),
            url: None,
            prefix: default_audit_prefix(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_audit_backend() -> String {
    "log".to_owned()
}

fn default_audit_prefix() -> String {
    "procgate_".to_owned()
}

fn default_queue_capacity() -> usize {
    256
}
