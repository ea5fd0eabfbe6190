use std::fmt;

use serde::{Deserialize, Serialize};

/// How the caller presented itself to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// A bearer token issued by this system's own auth layer, exchanged for
    /// the internal session credential.
    External,
    /// A bearer credential the gateway does not recognize; forwarded as-is.
    Native,
    /// No `Authorization` header at all.
    Anonymous,
}

impl AuthMethod {
    /// Returns the lowercase tag used in audit records.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Native => "native",
            Self::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal caller identity for audit attribution and supplier scoping.
///
/// This type is shared across crates so that the gateway can record who
/// triggered each forward without depending on the server's auth module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Caller name taken from validated external claims (empty otherwise).
    pub id: String,
    /// Stable user identifier from the external claims, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// How the caller authenticated.
    pub auth_method: AuthMethod,
}

impl Caller {
    /// Identity of a caller whose external credential was validated.
    pub fn external(id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            user_id,
            auth_method: AuthMethod::External,
        }
    }

    /// Identity of a caller presenting a legacy-native credential.
    pub fn native() -> Self {
        Self {
            id: String::new(),
            user_id: None,
            auth_method: AuthMethod::Native,
        }
    }

    /// Identity of a caller without any credential.
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            user_id: None,
            auth_method: AuthMethod::Anonymous,
        }
    }

    /// The supplier scope this caller implies, if any.
    ///
    /// Only validated external callers carry a name the legacy procedures
    /// accept as a supplier code.
    pub fn supplier_scope(&self) -> Option<&str> {
        match self.auth_method {
            AuthMethod::External if !self.id.is_empty() => Some(&self.id),
            _ => None,
        }
    }
}

impl Default for Caller {
    fn default() -> Self {
        Self::anonymous()
    }
}
