use thiserror::Error;

/// Errors that end a forward before a legacy response could be relayed.
///
/// Legacy 4xx/5xx business responses are not errors; they are relayed.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The caller's credential was missing where required, or failed
    /// validation. Nothing was sent to the legacy system.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No internal credential could be obtained and none is still usable.
    #[error("credential exchange failed: {0}")]
    ExchangeFailed(String),

    /// The legacy system could not be reached, timed out, or the response
    /// body could not be read.
    #[error("legacy system unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The gateway was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// HTTP status returned to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::UpstreamUnavailable(_) => 502,
            Self::ExchangeFailed(_) => 503,
            Self::Configuration(_) => 500,
        }
    }

    /// Caller-facing message. Internal detail stays in logs and audit.
    pub fn public_message(&self) -> &str {
        match self {
            Self::Unauthorized(reason) => reason,
            Self::UpstreamUnavailable(_) => "legacy system unavailable",
            Self::ExchangeFailed(_) => "legacy authentication unavailable",
            Self::Configuration(_) => "internal error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_distinct_statuses() {
        assert_eq!(GatewayError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(GatewayError::UpstreamUnavailable("x".into()).status_code(), 502);
        assert_eq!(GatewayError::ExchangeFailed("x".into()).status_code(), 503);
    }

    #[test]
    fn internal_detail_is_not_public() {
        let err = GatewayError::UpstreamUnavailable("connect to 10.0.0.5:80 refused".into());
        assert!(!err.public_message().contains("10.0.0.5"));
        let err = GatewayError::Unauthorized("missing bearer credential".into());
        assert_eq!(err.public_message(), "missing bearer credential");
    }
}
