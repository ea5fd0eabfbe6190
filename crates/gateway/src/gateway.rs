use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use procgate_audit::{AuditEmitter, AuditRecord, Outcome};
use procgate_core::{Caller, ProcedureEnvelope};
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, HeaderMap, HeaderName, HeaderValue,
    SERVER, SET_COOKIE, USER_AGENT,
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::credential::InternalCredentialManager;
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::translator::{DETAIL_PROCEDURE, LIST_PROCEDURE, LegacyTranslator, ListQuery};
use crate::validator::CredentialValidator;

/// What to do with a pass-through call that carries no credential at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymousPassthrough {
    /// Attach the internal service credential.
    #[default]
    ServiceCredential,
    /// Reject with 401.
    Reject,
}

/// Static forwarding settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Legacy system origin, e.g. `http://erp.internal:8080`.
    pub base_url: String,
    /// Path of the generic procedure endpoint.
    pub procedure_path: String,
    /// Supplier code used when the caller carries none.
    pub default_supplier: String,
    pub anonymous_passthrough: AnonymousPassthrough,
    /// Bound on each outbound business call.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            procedure_path: "/api/Public/GetProcedureDataSet".to_owned(),
            default_supplier: "WBDY".to_owned(),
            anonymous_passthrough: AnonymousPassthrough::ServiceCredential,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// The caller's intent, already routed.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Resource-list, translated into [`LIST_PROCEDURE`].
    ListBounties(ListQuery),
    /// Resource-detail, translated into [`DETAIL_PROCEDURE`].
    GetBounty { id: String },
    /// Anything else: forwarded with only host, scheme and credential
    /// rewritten. `path` is relative to the legacy origin.
    Passthrough {
        method: Method,
        path: String,
        query: Option<String>,
        body: Bytes,
    },
}

impl Operation {
    /// Operation name used in audit records and logs.
    pub fn name(&self) -> String {
        match self {
            Self::ListBounties(_) => "bounty.list".to_owned(),
            Self::GetBounty { .. } => "bounty.get".to_owned(),
            Self::Passthrough { method, .. } => {
                format!("proxy.{}", method.as_str().to_ascii_lowercase())
            }
        }
    }

    pub fn is_translated(&self) -> bool {
        !matches!(self, Self::Passthrough { .. })
    }

    fn procedure(&self) -> Option<&'static str> {
        match self {
            Self::ListBounties(_) => Some(LIST_PROCEDURE),
            Self::GetBounty { .. } => Some(DETAIL_PROCEDURE),
            Self::Passthrough { .. } => None,
        }
    }
}

/// One inbound invocation handed to [`Gateway::forward`].
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    /// Correlation id, echoed in the audit record.
    pub request_id: String,
    pub operation: Operation,
    /// Inbound method and path, for audit.
    pub method: Method,
    pub path: String,
    /// Inbound headers, including `Authorization`.
    pub headers: HeaderMap,
    pub client_ip: Option<String>,
}

impl ForwardRequest {
    pub fn new(
        request_id: impl Into<String>,
        operation: Operation,
        method: Method,
        path: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            operation,
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            client_ip: None,
        }
    }

    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }
}

/// The legacy system's answer, relayed byte for byte.
#[derive(Debug, Clone)]
pub struct LegacyResponse {
    pub status: StatusCode,
    /// End-to-end headers safe to relay; always includes `content-type`.
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The credential a caller presented.
enum Presented<'a> {
    None,
    External(&'a str),
    Native(&'a HeaderValue),
}

/// Credential-exchange forwarder in front of the legacy system.
pub struct Gateway {
    pub(crate) config: GatewayConfig,
    pub(crate) client: Client,
    pub(crate) credentials: InternalCredentialManager,
    pub(crate) validator: Arc<dyn CredentialValidator>,
    pub(crate) translator: LegacyTranslator,
    pub(crate) audit: Option<Arc<AuditEmitter>>,
    pub(crate) metrics: Arc<GatewayMetrics>,
}

impl Gateway {
    /// Forward one invocation and relay the legacy response.
    ///
    /// Emits exactly one audit record, whatever the result. Business calls
    /// are never retried.
    pub async fn forward(&self, req: ForwardRequest) -> Result<LegacyResponse, GatewayError> {
        let started = Instant::now();
        self.metrics.increment_forwarded();
        if req.operation.is_translated() {
            self.metrics.increment_translated();
        } else {
            self.metrics.increment_passthrough();
        }

        let (caller, result) = match self.authorize(&req).await {
            Ok((caller, authorization)) => {
                let result = self.send(&req, &caller, authorization).await;
                (caller, result)
            }
            Err((caller, e)) => (caller, Err(e)),
        };

        let elapsed = started.elapsed();
        let operation = req.operation.name();
        let (status, outcome) = match &result {
            Ok(resp) => {
                self.metrics.increment_relayed();
                (resp.status.as_u16(), Outcome::Relayed)
            }
            Err(e) => (e.status_code(), self.record_failure(e)),
        };

        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => info!(
                request_id = %req.request_id,
                %operation,
                auth_method = %caller.auth_method,
                status,
                elapsed_ms,
                "forwarded"
            ),
            Err(e) => warn!(
                request_id = %req.request_id,
                %operation,
                auth_method = %caller.auth_method,
                status,
                elapsed_ms,
                error = %e,
                "forward failed"
            ),
        }

        if let Some(audit) = &self.audit {
            let mut record = AuditRecord::new(
                req.request_id.as_str(),
                &caller,
                operation,
                req.method.as_str(),
                req.path.as_str(),
            );
            record.status = status;
            record.outcome = outcome;
            record.duration_ms = elapsed_ms;
            record.client_ip.clone_from(&req.client_ip);
            record.user_agent = req
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            record.detail = audit_detail(req.operation.procedure(), result.as_ref().err());
            audit.emit(record);
        }

        result
    }

    fn record_failure(&self, e: &GatewayError) -> Outcome {
        match e {
            GatewayError::Unauthorized(_) => {
                self.metrics.increment_unauthorized();
                Outcome::Unauthorized
            }
            GatewayError::ExchangeFailed(_) | GatewayError::Configuration(_) => {
                self.metrics.increment_exchange_failed();
                Outcome::ExchangeFailed
            }
            GatewayError::UpstreamUnavailable(_) => {
                self.metrics.increment_upstream_unavailable();
                Outcome::UpstreamUnavailable
            }
        }
    }

    fn classify<'a>(&self, headers: &'a HeaderMap) -> Presented<'a> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Presented::None;
        };
        let Ok(raw) = value.to_str() else {
            return Presented::Native(value);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Presented::None;
        }
        // Auth schemes are case-insensitive.
        match raw.split_once(char::is_whitespace) {
            Some((scheme, token))
                if scheme.eq_ignore_ascii_case("bearer")
                    && self.validator.recognizes(token.trim()) =>
            {
                Presented::External(token.trim())
            }
            _ => Presented::Native(value),
        }
    }

    /// Work out who the caller is and which `Authorization` value goes out.
    async fn authorize(
        &self,
        req: &ForwardRequest,
    ) -> Result<(Caller, HeaderValue), (Caller, GatewayError)> {
        match self.classify(&req.headers) {
            Presented::External(token) => {
                let caller = self.validator.validate(token).map_err(|e| {
                    debug!(request_id = %req.request_id, error = %e, "external credential rejected");
                    (
                        Caller::external("", None),
                        GatewayError::Unauthorized("invalid bearer credential".to_owned()),
                    )
                })?;
                match self.service_authorization().await {
                    Ok(value) => Ok((caller, value)),
                    Err(e) => Err((caller, e)),
                }
            }
            Presented::Native(value) => Ok((Caller::native(), value.clone())),
            Presented::None => {
                let anonymous_allowed = !req.operation.is_translated()
                    && self.config.anonymous_passthrough == AnonymousPassthrough::ServiceCredential;
                if !anonymous_allowed {
                    return Err((
                        Caller::anonymous(),
                        GatewayError::Unauthorized("missing bearer credential".to_owned()),
                    ));
                }
                match self.service_authorization().await {
                    Ok(value) => Ok((Caller::anonymous(), value)),
                    Err(e) => Err((Caller::anonymous(), e)),
                }
            }
        }
    }

    async fn service_authorization(&self) -> Result<HeaderValue, GatewayError> {
        let cred = self.credentials.get_credential().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", cred.token())).map_err(|_| {
            GatewayError::ExchangeFailed("internal token is not a valid header value".to_owned())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn send(
        &self,
        req: &ForwardRequest,
        caller: &Caller,
        authorization: HeaderValue,
    ) -> Result<LegacyResponse, GatewayError> {
        let request = match &req.operation {
            Operation::ListBounties(query) => {
                self.procedure_call(&self.translator.list(caller, query))
            }
            Operation::GetBounty { id } => self.procedure_call(&self.translator.detail(caller, id)),
            Operation::Passthrough {
                method,
                path,
                query,
                body,
            } => {
                let mut url = self.legacy_url(path);
                if let Some(q) = query.as_deref().filter(|q| !q.is_empty()) {
                    url.push('?');
                    url.push_str(q);
                }
                self.client
                    .request(method.clone(), url)
                    .headers(forwardable(&req.headers))
                    .body(body.clone())
            }
        };

        let response = request
            .header(AUTHORIZATION, authorization)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| self.upstream_error(&e))?;

        let status = response.status();
        let headers = relayable(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| self.upstream_error(&e))?;

        Ok(LegacyResponse {
            status,
            headers,
            body,
        })
    }

    fn procedure_call(&self, envelope: &ProcedureEnvelope) -> RequestBuilder {
        debug!(procedure = %envelope.code, "calling legacy procedure");
        self.client
            .post(self.legacy_url(&self.config.procedure_path))
            .json(envelope)
    }

    fn legacy_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    fn upstream_error(&self, e: &reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::UpstreamUnavailable(format!(
                "timed out after {}ms",
                self.config.request_timeout.as_millis()
            ))
        } else {
            GatewayError::UpstreamUnavailable(e.to_string())
        }
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn credentials(&self) -> &InternalCredentialManager {
        &self.credentials
    }

    pub fn audit(&self) -> Option<&Arc<AuditEmitter>> {
        self.audit.as_ref()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Drain pending audit records, waiting at most `grace`.
    pub async fn shutdown(&self, grace: Duration) {
        if let Some(audit) = &self.audit {
            audit.shutdown(grace).await;
        }
        info!("gateway shutdown complete");
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Inbound headers that may travel to the legacy system. Credentials are
/// set separately; cookies never leave the gateway.
fn forwardable(inbound: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name)
            || name == HOST
            || name == CONTENT_LENGTH
            || name == COOKIE
            || name == AUTHORIZATION
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Legacy response headers relayed to the caller.
fn relayable(legacy: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(legacy.len());
    for (name, value) in legacy {
        if is_hop_by_hop(name) || name == CONTENT_LENGTH || name == SERVER || name == SET_COOKIE {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    if !out.contains_key(CONTENT_TYPE) {
        out.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    out
}

fn audit_detail(procedure: Option<&str>, error: Option<&GatewayError>) -> serde_json::Value {
    let mut detail = serde_json::Map::new();
    if let Some(p) = procedure {
        detail.insert("procedure".into(), p.into());
    }
    if let Some(e) = error {
        detail.insert("error".into(), e.to_string().into());
    }
    serde_json::Value::Object(detail)
}
