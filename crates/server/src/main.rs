use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use procgate_crypto::{ExposeSecret, parse_master_key, seal};
use procgate_server::api::{self, AppState};
use procgate_server::auth::JwtValidator;
use procgate_server::config::{MASTER_KEY_ENV, ProcgateConfig};
use procgate_server::gateway_factory::create_gateway;

/// procgate credential-exchange gateway.
#[derive(Parser, Debug)]
#[command(
    name = "procgate-server",
    about = "Credential-exchange gateway in front of a legacy procedure API"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "procgate.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a value for use in procgate.toml. Reads plaintext from stdin.
    Encrypt,
    /// Mint an external bearer token with the configured secret and issuer.
    IssueToken {
        /// Caller name carried in the token.
        #[arg(long)]
        username: String,
        /// Optional stable user identifier.
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Initialize the configured audit backend schema, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    procgate_server::telemetry::init();

    if let Some(Commands::Encrypt) = cli.command {
        return run_encrypt();
    }

    // Load configuration from TOML file, or use defaults if the file does not exist.
    let config_path = Path::new(&cli.config);
    let config = ProcgateConfig::load(config_path)?;
    if !config_path.exists() {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    match &cli.command {
        Some(Commands::Migrate) => return run_migrate(&config).await,
        Some(Commands::IssueToken { username, user_id }) => {
            return run_issue_token(&config, username, user_id.as_deref());
        }
        _ => {}
    }

    config.validate()?;
    let secrets = config.resolve_secrets(|key| std::env::var(key).ok())?;
    let gateway = Arc::new(create_gateway(&config, &secrets).await?);
    drop(secrets);

    let state = AppState {
        gateway: Arc::clone(&gateway),
        passthrough_prefix: config.gateway.passthrough_prefix.clone(),
    };
    let app = api::router(state);

    // Resolve the bind address (CLI overrides take precedence).
    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        address = %addr,
        legacy = %config.legacy.base_url,
        "procgate-server listening"
    );

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Drain queued audit records (bounded by the configured timeout).
    info!(
        timeout_secs = config.server.shutdown_timeout_seconds,
        "draining audit queue..."
    );
    gateway
        .shutdown(Duration::from_secs(config.server.shutdown_timeout_seconds))
        .await;

    info!("procgate-server shut down");
    Ok(())
}

/// Run the `migrate` subcommand: initialize the audit schema and exit.
async fn run_migrate(config: &ProcgateConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.audit.enabled {
        info!("audit disabled, skipping audit migrations");
        return Ok(());
    }

    info!(backend = %config.audit.backend, "running audit backend migrations...");
    let _audit = procgate_server::audit_factory::create_audit_store(&config.audit).await?;
    info!(backend = %config.audit.backend, "audit backend migrations complete");
    Ok(())
}

/// Run the `issue-token` subcommand: print a signed external token.
fn run_issue_token(
    config: &ProcgateConfig,
    username: &str,
    user_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    if username.trim().is_empty() {
        return Err("--username must not be empty".into());
    }
    let secret = config.resolve_jwt_secret(|key| std::env::var(key).ok())?;
    let validator = JwtValidator::new(
        secret.expose_secret(),
        config.auth.issuer.clone(),
        config.auth.token_expiry_seconds,
    );
    let token = validator.issue(username.trim(), user_id)?;
    info!(
        username = %username.trim(),
        expires_in_secs = validator.expiry_seconds(),
        "issued external token"
    );
    println!("{token}");
    Ok(())
}

/// Run the `encrypt` subcommand: read plaintext from stdin, output ENC[...] to stdout.
fn run_encrypt() -> Result<(), Box<dyn std::error::Error>> {
    let master_key_raw = std::env::var(MASTER_KEY_ENV).map_err(|_| {
        format!("{MASTER_KEY_ENV} environment variable is required for the encrypt command")
    })?;
    let master_key =
        parse_master_key(&master_key_raw).map_err(|e| format!("invalid {MASTER_KEY_ENV}: {e}"))?;

    let mut plaintext = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut plaintext)?;
    let plaintext = plaintext.trim_end_matches('\n');

    let encrypted = seal(plaintext, &master_key)?;
    println!("{encrypted}");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
