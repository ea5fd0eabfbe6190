use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tower::ServiceExt;

use procgate_audit::{AuditEmitter, Outcome};
use procgate_audit_memory::MemoryAuditStore;
use procgate_core::AuthMethod;
use procgate_crypto::SecretString;
use procgate_gateway::{
    AnonymousPassthrough, CredentialPolicy, DETAIL_PROCEDURE, Gateway, GatewayBuilder,
    GatewayConfig, HttpLegacyAuthenticator, InternalCredentialManager, LIST_PROCEDURE,
};
use procgate_server::api::{self, AppState, REQUEST_ID_HEADER};
use procgate_server::auth::JwtValidator;
use procgate_server::config::ProcgateConfig;
use procgate_server::gateway_factory::create_gateway;

const INTERNAL_TOKEN: &str = "internal-session-token";
const JWT_SECRET: &str = "integration-secret";
// Odd spacing on purpose: relayed bodies must not be re-serialized.
const LIST_BODY: &str = r#"{"isSucceed":true,  "data":[{"InquiryId":42,"Name":"valve"}]}"#;
const DETAIL_BODY: &str = r#"{"isSucceed":true,"data":{"InquiryId":42},"outPars":{"strMessage":""}}"#;

// -- Stub legacy system ---------------------------------------------------

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    query: Option<String>,
    authorization: Option<String>,
    cookie: Option<String>,
    body: Bytes,
}

#[derive(Clone, Default)]
struct Legacy {
    logins: Arc<AtomicUsize>,
    fail_login: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<Seen>>>,
    procedure_delay: Duration,
}

impl Legacy {
    fn calls(&self) -> Vec<Seen> {
        self.calls.lock().unwrap().clone()
    }

    fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    async fn record(&self, req: Request<Body>) -> Seen {
        let (parts, body) = req.into_parts();
        let header_value = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let seen = Seen {
            method: parts.method.to_string(),
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            authorization: header_value(header::AUTHORIZATION),
            cookie: header_value(header::COOKIE),
            body: to_bytes(body, usize::MAX).await.unwrap(),
        };
        self.calls.lock().unwrap().push(seen.clone());
        seen
    }
}

async fn login(State(legacy): State<Legacy>) -> Response {
    legacy.logins.fetch_add(1, Ordering::SeqCst);
    if legacy.fail_login.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "login backend down").into_response();
    }
    axum::Json(serde_json::json!({
        "isSucceed": true,
        "message": "ok",
        "statusCode": 200,
        "data": { "Token": INTERNAL_TOKEN }
    }))
    .into_response()
}

async fn procedure(State(legacy): State<Legacy>, req: Request<Body>) -> Response {
    let seen = legacy.record(req).await;
    if !legacy.procedure_delay.is_zero() {
        tokio::time::sleep(legacy.procedure_delay).await;
    }
    let envelope: serde_json::Value = serde_json::from_slice(&seen.body).unwrap();
    let body = if envelope["code"] == DETAIL_PROCEDURE {
        DETAIL_BODY
    } else {
        LIST_BODY
    };
    (
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
            (header::SERVER, "Kestrel"),
        ],
        body,
    )
        .into_response()
}

async fn anything(State(legacy): State<Legacy>, req: Request<Body>) -> Response {
    let seen = legacy.record(req).await;
    if seen.path == "/api/Broken" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::SET_COOKIE, "legacy=1"),
            ],
            r#"{"error":"boom"}"#,
        )
            .into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain")],
        format!("passthrough {} {}", seen.method, seen.path),
    )
        .into_response()
}

async fn spawn_legacy(legacy: Legacy) -> String {
    let app = Router::new()
        .route("/api/Login/Login", post(login))
        .route("/api/Public/GetProcedureDataSet", post(procedure))
        .fallback(anything)
        .with_state(legacy);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// -- Helpers --------------------------------------------------------------

struct Harness {
    app: Router,
    gateway: Arc<Gateway>,
    legacy: Legacy,
    audit: Arc<MemoryAuditStore>,
    jwt: JwtValidator,
}

impl Harness {
    async fn new() -> Self {
        Self::with(Legacy::default(), |_| {}).await
    }

    async fn with(legacy: Legacy, tweak: impl FnOnce(&mut GatewayConfig)) -> Self {
        let base_url = spawn_legacy(legacy.clone()).await;
        let client = reqwest::Client::new();

        let authenticator = HttpLegacyAuthenticator::new(
            client.clone(),
            &base_url,
            "/api/Login/Login",
            "svc-gateway",
            SecretString::new("svc-password".to_owned()),
        );
        let credentials =
            InternalCredentialManager::new(Arc::new(authenticator), CredentialPolicy::default());

        let mut config = GatewayConfig {
            base_url,
            ..GatewayConfig::default()
        };
        tweak(&mut config);

        let audit = Arc::new(MemoryAuditStore::new());
        let emitter = Arc::new(AuditEmitter::spawn(Arc::clone(&audit) as _, 64));

        let gateway = Arc::new(
            GatewayBuilder::new()
                .config(config)
                .client(client)
                .credentials(credentials)
                .validator(Arc::new(JwtValidator::new(JWT_SECRET, "procgate", 3600)))
                .audit(emitter)
                .build()
                .expect("gateway should build"),
        );

        let app = api::router(AppState {
            gateway: Arc::clone(&gateway),
            passthrough_prefix: "/api/v1/internal".to_owned(),
        });

        Self {
            app,
            gateway,
            legacy,
            audit,
            jwt: JwtValidator::new(JWT_SECRET, "procgate", 3600),
        }
    }

    fn external_token(&self, username: &str) -> String {
        self.jwt.issue(username, Some("u-1")).unwrap()
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        send(&self.app, req).await
    }

    /// Wait for queued audit records to be written.
    async fn drain_audit(&self) {
        self.gateway.shutdown(Duration::from_secs(2)).await;
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json(body: &Bytes) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

// -- Translated operations ------------------------------------------------

#[tokio::test]
async fn external_credential_cold_cache_logs_in_once_and_relays_verbatim() {
    let h = Harness::new().await;
    let token = h.external_token("ACME01");

    let mut req = get("/api/v1/bounties?keyword=valve&begin_date=", Some(&token));
    req.headers_mut()
        .insert(header::USER_AGENT, "integration-test".parse().unwrap());
    let (status, headers, body) = h.send(req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(LIST_BODY.as_bytes()));
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/json; charset=utf-8"
    );
    assert!(headers.get(header::SERVER).is_none());
    assert!(headers.contains_key(REQUEST_ID_HEADER));
    assert_eq!(h.legacy.logins(), 1);

    let calls = h.legacy.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.path, "/api/Public/GetProcedureDataSet");
    assert_eq!(
        call.authorization.as_deref(),
        Some(format!("Bearer {INTERNAL_TOKEN}").as_str())
    );
    let envelope = json(&call.body);
    assert_eq!(envelope["code"], LIST_PROCEDURE);
    assert_eq!(envelope["pars"]["Supplier"], "ACME01");
    assert_eq!(envelope["pars"]["P_chnName"], "valve");
    assert_eq!(envelope["pars"]["IncludeEnd"], "0");
    assert!(envelope["pars"].get("BeginDate").is_none());
    assert_eq!(envelope["outPars"], serde_json::json!({}));

    h.drain_audit().await;
    let records = h.audit.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.caller_id, "ACME01");
    assert_eq!(record.user_id.as_deref(), Some("u-1"));
    assert_eq!(record.auth_method, AuthMethod::External);
    assert_eq!(record.operation, "bounty.list");
    assert_eq!(record.status, 200);
    assert_eq!(record.outcome, Outcome::Relayed);
    assert_eq!(record.user_agent.as_deref(), Some("integration-test"));
    assert_eq!(
        record.request_id,
        headers.get(REQUEST_ID_HEADER).unwrap().to_str().unwrap()
    );
}

#[tokio::test]
async fn concurrent_cold_requests_share_one_login() {
    let h = Harness::new().await;
    let token = h.external_token("ACME01");

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let app = h.app.clone();
        let req = get("/api/v1/bounties", Some(&token));
        tasks.spawn(async move { send(&app, req).await.0 });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    assert_eq!(h.legacy.logins(), 1);
    assert_eq!(h.legacy.calls().len(), 8);
}

#[tokio::test]
async fn warm_cache_reuses_the_credential() {
    let h = Harness::new().await;
    let token = h.external_token("ACME01");

    for _ in 0..3 {
        let (status, _, _) = h.send(get("/api/v1/bounties", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(h.legacy.logins(), 1);
}

#[tokio::test]
async fn repeated_list_filter_keeps_the_first_value() {
    let h = Harness::new().await;
    let token = h.external_token("ACME01");

    let (status, headers, body) = h
        .send(get("/api/v1/bounties?keyword=a&keyword=b", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(LIST_BODY.as_bytes()));
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/json; charset=utf-8"
    );

    let calls = h.legacy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(json(&calls[0].body)["pars"]["P_chnName"], "a");

    h.drain_audit().await;
    let records = h.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, "bounty.list");
    assert_eq!(records[0].outcome, Outcome::Relayed);
}

#[tokio::test]
async fn detail_carries_the_path_id() {
    let h = Harness::new().await;
    let token = h.external_token("S9");

    let (status, _, body) = h.send(get("/api/v1/bounties/42", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(DETAIL_BODY.as_bytes()));

    let envelope = json(&h.legacy.calls()[0].body);
    assert_eq!(envelope["code"], DETAIL_PROCEDURE);
    assert_eq!(envelope["pars"]["InquiryId"], "42");
    assert_eq!(envelope["pars"]["Supplier"], "S9");
    assert_eq!(envelope["outPars"]["strMessage"], "");

    h.drain_audit().await;
    assert_eq!(h.audit.records()[0].operation, "bounty.get");
}

#[tokio::test]
async fn business_call_timeout_is_502_and_audited() {
    let legacy = Legacy {
        procedure_delay: Duration::from_secs(3),
        ..Legacy::default()
    };
    let h = Harness::with(legacy, |c| c.request_timeout = Duration::from_millis(300)).await;
    let token = h.external_token("ACME01");

    let started = Instant::now();
    let (status, _, body) = h.send(get("/api/v1/bounties", Some(&token))).await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    let body = json(&body);
    assert_eq!(body["code"], 502);
    assert_eq!(body["message"], "legacy system unavailable");
    assert_eq!(h.legacy.calls().len(), 1, "no automatic retry");

    h.drain_audit().await;
    let records = h.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 502);
    assert_eq!(records[0].outcome, Outcome::UpstreamUnavailable);
    assert!(records[0].detail["error"].is_string());
}

#[tokio::test]
async fn login_failure_on_cold_start_is_503() {
    let legacy = Legacy::default();
    legacy.fail_login.store(true, Ordering::SeqCst);
    let h = Harness::with(legacy, |_| {}).await;
    let token = h.external_token("ACME01");

    let (status, _, body) = h.send(get("/api/v1/bounties", Some(&token))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(&body)["message"], "legacy authentication unavailable");
    assert!(h.legacy.calls().is_empty());

    h.drain_audit().await;
    assert_eq!(h.audit.records()[0].outcome, Outcome::ExchangeFailed);
}

// -- Rejections -----------------------------------------------------------

#[tokio::test]
async fn invalid_external_credential_is_rejected_before_any_legacy_call() {
    let h = Harness::new().await;
    let forged = JwtValidator::new("not-the-secret", "procgate", 3600)
        .issue("ACME01", None)
        .unwrap();

    let (status, headers, body) = h.send(get("/api/v1/bounties", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(REQUEST_ID_HEADER));
    let body = json(&body);
    assert_eq!(body["code"], 401);
    assert_eq!(body["message"], "invalid bearer credential");
    assert_eq!(h.legacy.logins(), 0);
    assert!(h.legacy.calls().is_empty());

    h.drain_audit().await;
    let records = h.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 401);
    assert_eq!(records[0].outcome, Outcome::Unauthorized);
}

#[tokio::test]
async fn translated_operations_require_a_credential() {
    let h = Harness::new().await;

    let (status, _, body) = h.send(get("/api/v1/bounties/7", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["message"], "missing bearer credential");
    assert!(h.legacy.calls().is_empty());

    h.drain_audit().await;
    assert_eq!(h.audit.records()[0].auth_method, AuthMethod::Anonymous);
}

// -- Pass-through ---------------------------------------------------------

#[tokio::test]
async fn native_credential_is_forwarded_untouched_without_cookies() {
    let h = Harness::new().await;

    let req = Request::builder()
        .method("GET")
        .uri("/api/v1/internal/api/Supplier/Profile?lang=en&id=%2F7")
        .header(header::AUTHORIZATION, "Bearer legacy-native-abc")
        .header(header::COOKIE, "session=should-not-leak")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = h.send(req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(b"passthrough GET /api/Supplier/Profile"));
    assert_eq!(h.legacy.logins(), 0);

    let call = &h.legacy.calls()[0];
    assert_eq!(call.query.as_deref(), Some("lang=en&id=%2F7"));
    assert_eq!(call.authorization.as_deref(), Some("Bearer legacy-native-abc"));
    assert!(call.cookie.is_none());

    h.drain_audit().await;
    let record = &h.audit.records()[0];
    assert_eq!(record.auth_method, AuthMethod::Native);
    assert_eq!(record.operation, "proxy.get");
    assert_eq!(record.path, "/api/v1/internal/api/Supplier/Profile");
}

#[tokio::test]
async fn external_credential_is_exchanged_on_passthrough() {
    let h = Harness::new().await;
    let token = h.external_token("ACME01");

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/internal/api/Orders/Create")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::COOKIE, "a=b")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"qty": 3}"#))
        .unwrap();
    let (status, _, _) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);

    let call = &h.legacy.calls()[0];
    assert_eq!(call.method, "POST");
    assert_eq!(call.path, "/api/Orders/Create");
    assert_eq!(
        call.authorization.as_deref(),
        Some(format!("Bearer {INTERNAL_TOKEN}").as_str())
    );
    assert_eq!(call.body, Bytes::from_static(br#"{"qty": 3}"#));
    assert!(call.cookie.is_none());
}

#[tokio::test]
async fn legacy_errors_are_relayed_verbatim() {
    let h = Harness::new().await;

    let (status, headers, body) = h
        .send(get("/api/v1/internal/api/Broken", Some("legacy-native")))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, Bytes::from_static(br#"{"error":"boom"}"#));
    assert!(headers.get(header::SET_COOKIE).is_none());

    h.drain_audit().await;
    let record = &h.audit.records()[0];
    assert_eq!(record.status, 500);
    assert_eq!(record.outcome, Outcome::Relayed);
}

#[tokio::test]
async fn bare_prefix_forwards_to_the_legacy_root() {
    let h = Harness::new().await;

    for uri in ["/api/v1/internal", "/api/v1/internal/"] {
        let (status, _, body) = h.send(get(uri, Some("legacy-native-abc"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from_static(b"passthrough GET /"));
    }

    let calls = h.legacy.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.path == "/"));

    h.drain_audit().await;
    let records = h.audit.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.operation == "proxy.get"));
}

#[tokio::test]
async fn lowercase_bearer_scheme_is_still_exchanged() {
    let h = Harness::new().await;
    let token = h.external_token("ACME01");

    let req = Request::builder()
        .method("GET")
        .uri("/api/v1/internal/api/Orders/List")
        .header(header::AUTHORIZATION, format!("bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = h.send(req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.legacy.logins(), 1);
    let call = &h.legacy.calls()[0];
    assert_eq!(
        call.authorization.as_deref(),
        Some(format!("Bearer {INTERNAL_TOKEN}").as_str())
    );
    assert!(!call.authorization.as_deref().unwrap_or_default().contains(&token));

    h.drain_audit().await;
    assert_eq!(h.audit.records()[0].auth_method, AuthMethod::External);
}

#[tokio::test]
async fn anonymous_passthrough_uses_the_service_credential_by_default() {
    let h = Harness::new().await;

    let (status, _, _) = h.send(get("/api/v1/internal/api/Public/Ping", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        h.legacy.calls()[0].authorization.as_deref(),
        Some(format!("Bearer {INTERNAL_TOKEN}").as_str())
    );
}

#[tokio::test]
async fn anonymous_passthrough_can_be_rejected() {
    let h = Harness::with(Legacy::default(), |c| {
        c.anonymous_passthrough = AnonymousPassthrough::Reject;
    })
    .await;

    let (status, _, _) = h.send(get("/api/v1/internal/api/Public/Ping", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.legacy.calls().is_empty());
}

// -- Health & metrics -----------------------------------------------------

#[tokio::test]
async fn health_reports_credential_and_counters() {
    let h = Harness::new().await;

    let (_, _, body) = h.send(get("/health", None)).await;
    let cold = json(&body);
    assert_eq!(cold["status"], "ok");
    assert_eq!(cold["credential"]["cached"], false);

    let token = h.external_token("ACME01");
    h.send(get("/api/v1/bounties", Some(&token))).await;

    let (status, _, body) = h.send(get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    let warm = json(&body);
    assert_eq!(warm["credential"]["cached"], true);
    assert_eq!(warm["credential"]["fresh"], true);
    assert_eq!(warm["metrics"]["forwarded"], 1);
    assert_eq!(warm["metrics"]["credential_refreshes"], 1);
    assert!(warm["metrics"]["audit"]["dropped"].is_u64());

    let (status, _, body) = h.send(get("/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
    let metrics = json(&body);
    assert_eq!(metrics["translated"], 1);
    assert_eq!(metrics["relayed"], 1);
}

#[tokio::test]
async fn caller_request_id_is_echoed() {
    let h = Harness::new().await;
    let req = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "trace-abc-123")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = h.send(req).await;
    assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "trace-abc-123");
}

// -- Configuration wiring -------------------------------------------------

#[tokio::test]
async fn gateway_built_from_config_serves_requests() {
    let legacy = Legacy::default();
    let base_url = spawn_legacy(legacy.clone()).await;

    let config: ProcgateConfig = toml::from_str(&format!(
        r#"
        [legacy]
        base_url = "{base_url}"
        username = "svc-gateway"
        password = "svc-password"

        [auth]
        jwt_secret = "{JWT_SECRET}"

        [audit]
        backend = "memory"
    "#
    ))
    .unwrap();
    config.validate().unwrap();
    let secrets = config.resolve_secrets(|_| None).unwrap();
    let gateway = Arc::new(create_gateway(&config, &secrets).await.unwrap());
    let app = api::router(AppState {
        gateway: Arc::clone(&gateway),
        passthrough_prefix: config.gateway.passthrough_prefix.clone(),
    });

    let token = JwtValidator::new(JWT_SECRET, "procgate", 60)
        .issue("ACME01", None)
        .unwrap();
    let (status, _, body) = send(&app, get("/api/v1/bounties", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Bytes::from_static(LIST_BODY.as_bytes()));
    assert_eq!(legacy.logins(), 1);
    assert!(gateway.audit().is_some());
}
