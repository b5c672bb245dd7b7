//! AuthGate Server
//!
//! Password and OAuth2 provider login in front of a single account store,
//! handing out bearer tokens.
//!
//! # Usage
//!
//! ```bash
//! # Development: in-memory store, generated signing key
//! authgate-server --dev-mode
//!
//! # Start with custom config
//! authgate-server --config /path/to/config.toml
//!
//! # Start with environment overrides
//! AUTHGATE__SERVER__PORT=8080 authgate-server
//! ```

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use rand::RngCore;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authgate_auth::AuthService;
use authgate_db::{Database, IdentityStore, MemoryIdentityStore};
use authgate_server::config::{LoggingConfig, MetricsConfig, ServerConfig};
use authgate_server::{create_router, AppState, HttpProviderClient, OAuth2Flow};

// =============================================================================
// CLI Arguments
// =============================================================================

/// AuthGate Server - password and OAuth2 login with bearer tokens
#[derive(Parser, Debug)]
#[command(name = "authgate-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "AUTHGATE_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "AUTHGATE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "AUTHGATE_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AUTHGATE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, env = "AUTHGATE_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Base64 token signing key
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Development mode: in-memory store, generated signing key
    #[arg(long, env = "AUTHGATE_DEV_MODE")]
    dev_mode: bool,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(db_url) = args.database_url {
        server_config.database.postgres_url = db_url;
    }
    if let Some(jwt_secret) = args.jwt_secret {
        server_config.auth.jwt.secret = jwt_secret;
    }
    server_config.logging.level = args.log_level;
    server_config.logging.format = args.log_format;

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dev_mode = args.dev_mode,
        "Starting AuthGate server"
    );

    if args.dev_mode && server_config.auth.jwt.secret.is_empty() {
        tracing::warn!("No JWT secret configured; generated a random key, tokens will not survive a restart");
        server_config.auth.jwt.secret = generate_signing_key();
    }

    validate_config(&server_config, args.dev_mode)?;

    let (store, db) = init_store(&server_config, args.dev_mode).await?;

    let auth = Arc::new(AuthService::new(store, server_config.auth.clone())?);
    let oauth2 = Arc::new(OAuth2Flow::new(
        &server_config.oauth2,
        &server_config.server.public_url,
        Arc::new(HttpProviderClient::new()?),
    )?);

    tracing::info!(
        providers = ?server_config.oauth2.clients.keys().collect::<Vec<_>>(),
        "Authentication service initialized"
    );

    let state = Arc::new(AppState::new(auth, oauth2, db));
    let app = create_router(state, &server_config.api);

    if server_config.metrics.enabled {
        start_metrics_server(&server_config.metrics)?;
    }

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    let timeout = server_config.server.shutdown_timeout();
    tokio::select! {
        result = server => result?,
        _ = async {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "In-flight requests did not finish in time");
        }
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }

    Ok(())
}

/// Refuse to start on an unsafe configuration unless in dev mode
fn validate_config(config: &ServerConfig, dev_mode: bool) -> anyhow::Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }

    if dev_mode {
        for error in &errors {
            tracing::warn!(%error, "Configuration problem ignored in dev mode");
        }
        return Ok(());
    }

    anyhow::bail!("Invalid configuration:\n  {}", errors.join("\n  "))
}

/// PostgreSQL-backed store, or the in-memory one in dev mode
async fn init_store(
    config: &ServerConfig,
    dev_mode: bool,
) -> anyhow::Result<(Arc<dyn IdentityStore>, Option<Arc<Database>>)> {
    if dev_mode {
        tracing::warn!("Using the in-memory account store; accounts are lost on exit");
        return Ok((Arc::new(MemoryIdentityStore::new()), None));
    }

    let db = Database::connect(&authgate_db::DatabaseConfig::from(&config.database)).await?;

    if config.database.run_migrations {
        db.migrate().await?;
    }

    if !db.health_check().await {
        anyhow::bail!("Database health check failed");
    }

    let store: Arc<dyn IdentityStore> = Arc::new(db.account_repo());
    Ok((store, Some(Arc::new(db))))
}

fn generate_signing_key() -> String {
    let mut bytes = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Start Prometheus metrics server
fn start_metrics_server(config: &MetricsConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(port = config.port, "Metrics server started");

    Ok(())
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
