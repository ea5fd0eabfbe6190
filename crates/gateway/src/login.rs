//! The legacy login exchange: a fixed service identity traded for a session
//! token.

use async_trait::async_trait;
use procgate_crypto::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Why a login call did not yield a token.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The request could not be sent or the response could not be read.
    #[error("login transport error: {0}")]
    Transport(String),

    /// The login call exceeded its time bound.
    #[error("login timed out")]
    Timeout,

    /// The login endpoint answered with a non-success HTTP status.
    #[error("login returned HTTP {0}")]
    Status(u16),

    /// The login endpoint answered but reported failure.
    #[error("login rejected: {0}")]
    Rejected(String),

    /// The response body matched neither accepted envelope.
    #[error("malformed login response: {0}")]
    Malformed(String),

    /// The response was well-formed but carried no token.
    #[error("login response contained no token")]
    EmptyToken,
}

/// Performs one login against the legacy system.
#[async_trait]
pub trait LegacyAuthenticator: Send + Sync {
    /// Return a fresh session token for the service identity.
    async fn login(&self) -> Result<String, LoginError>;
}

/// The two response shapes the legacy login endpoint has been seen to use.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoginEnvelope {
    Wrapped {
        #[serde(rename = "isSucceed")]
        is_succeed: bool,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Option<LoginData>,
    },
    Bare {
        #[serde(alias = "Token")]
        token: String,
    },
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(rename = "Token", alias = "token", default)]
    token: Option<String>,
}

impl LoginEnvelope {
    fn parse(body: &[u8]) -> Result<Self, LoginError> {
        serde_json::from_slice(body).map_err(|e| LoginError::Malformed(e.to_string()))
    }

    fn into_token(self) -> Result<String, LoginError> {
        let token = match self {
            Self::Wrapped {
                is_succeed: false,
                message,
                ..
            } => {
                return Err(LoginError::Rejected(
                    message.unwrap_or_else(|| "no message".to_owned()),
                ));
            }
            Self::Wrapped { data, .. } => data.and_then(|d| d.token).unwrap_or_default(),
            Self::Bare { token } => token,
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(LoginError::EmptyToken);
        }
        Ok(token.to_owned())
    }
}

/// [`LegacyAuthenticator`] that `POST`s
/// `{"user":{"Account":..,"PassWord":..}}` to the legacy login path.
pub struct HttpLegacyAuthenticator {
    client: Client,
    url: String,
    username: String,
    password: SecretString,
}

impl HttpLegacyAuthenticator {
    /// `base_url` and `auth_path` are joined as-is after trimming a trailing
    /// slash from the base.
    pub fn new(
        client: Client,
        base_url: &str,
        auth_path: &str,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            client,
            url: format!("{}{auth_path}", base_url.trim_end_matches('/')),
            username: username.into(),
            password,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LegacyAuthenticator for HttpLegacyAuthenticator {
    #[instrument(skip(self), fields(url = %self.url, account = %self.username))]
    async fn login(&self) -> Result<String, LoginError> {
        let body = serde_json::json!({
            "user": {
                "Account": self.username,
                "PassWord": self.password.expose_secret(),
            }
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LoginError::Timeout
                } else {
                    LoginError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoginError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), body_len = bytes.len(), "login responded");

        if !status.is_success() {
            return Err(LoginError::Status(status.as_u16()));
        }
        LoginEnvelope::parse(&bytes)?.into_token()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    use super::*;

    fn token_from(body: &str) -> Result<String, LoginError> {
        LoginEnvelope::parse(body.as_bytes())?.into_token()
    }

    #[test]
    fn accepts_wrapped_envelope() {
        let body = r#"{"isSucceed":true,"message":"ok","statusCode":200,"data":{"Token":"abc"}}"#;
        assert_eq!(token_from(body).unwrap(), "abc");
    }

    #[test]
    fn accepts_bare_envelope_in_either_case() {
        assert_eq!(token_from(r#"{"token":"t1"}"#).unwrap(), "t1");
        assert_eq!(token_from(r#"{"Token":"t2"}"#).unwrap(), "t2");
    }

    #[test]
    fn wrapped_failure_is_rejected_with_message() {
        let body = r#"{"isSucceed":false,"message":"bad password","data":null}"#;
        match token_from(body) {
            Err(LoginError::Rejected(msg)) => assert_eq!(msg, "bad password"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn empty_token_is_an_error() {
        assert!(matches!(
            token_from(r#"{"isSucceed":true,"data":{"Token":""}}"#),
            Err(LoginError::EmptyToken)
        ));
        assert!(matches!(
            token_from(r#"{"isSucceed":true}"#),
            Err(LoginError::EmptyToken)
        ));
        assert!(matches!(token_from(r#"{"token":"  "}"#), Err(LoginError::EmptyToken)));
    }

    #[test]
    fn unrecognized_body_is_malformed() {
        assert!(matches!(token_from("<html>"), Err(LoginError::Malformed(_))));
        assert!(matches!(
            token_from(r#"{"status":"ok"}"#),
            Err(LoginError::Malformed(_))
        ));
    }

    // -- Stub login endpoint ---------------------------------------------------

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn authenticator(addr: SocketAddr) -> HttpLegacyAuthenticator {
        HttpLegacyAuthenticator::new(
            Client::new(),
            &format!("http://{addr}/"),
            "/api/Login/Login",
            "svc",
            SecretString::new("pw".to_owned()),
        )
    }

    #[tokio::test]
    async fn posts_service_identity_and_reads_token() {
        let seen = Arc::new(Mutex::new(None::<serde_json::Value>));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/api/Login/Login",
            post(move |Json(body): Json<serde_json::Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(serde_json::json!({"isSucceed": true, "data": {"Token": "sess-1"}}))
                }
            }),
        );
        let auth = authenticator(serve(app).await);
        assert!(auth.url().ends_with("/api/Login/Login"));
        assert!(!auth.url().contains("//api"));

        assert_eq!(auth.login().await.unwrap(), "sess-1");
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(
            body,
            serde_json::json!({"user": {"Account": "svc", "PassWord": "pw"}})
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let app = Router::new().route(
            "/api/Login/Login",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let auth = authenticator(serve(app).await);
        assert!(matches!(auth.login().await, Err(LoginError::Status(500))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let auth = authenticator(addr);
        assert!(matches!(auth.login().await, Err(LoginError::Transport(_))));
    }
}
