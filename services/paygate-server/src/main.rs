//! Paygate server
//!
//! Wires the lifecycle engine to its collaborators (store, bank
//! adapter, cache, authenticator, metrics, webhooks, clock), mounts the
//! HTTP surface, and runs the background sweeps.
//!
//! ```bash
//! # In-memory store, defaults
//! paygate-server
//!
//! # Postgres-backed
//! paygate-server --store postgres --database-url postgres://localhost/paygate
//!
//! # Config file plus environment overrides
//! PAYGATE__SERVER__PORT=9090 paygate-server --config paygate.toml
//! ```

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use paygate_api::{create_router, ApiConfig, RateLimitConfig};
use paygate_auth::{AuthConfig, Authenticator};
use paygate_bank::{BankAdapter, StubBank};
use paygate_cache::{CacheTtls, ResponseCache};
use paygate_engine::{EngineConfig, FacadeSink, HttpWebhookSender, PaymentEngine};
use paygate_store::{MemStore, PgStore, Store};
use paygate_types::{Clock, SystemClock};

use crate::config::ServerConfig;

/// Paygate - merchant-facing payment gateway
#[derive(Parser, Debug)]
#[command(name = "paygate-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "PAYGATE_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "PAYGATE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PAYGATE_PORT")]
    port: Option<u16>,

    /// Store backend: postgres or memory
    #[arg(long, env = "PAYGATE_STORE")]
    store: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Admin bearer token
    #[arg(long, env = "PAYGATE_ADMIN_TOKEN")]
    admin_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PAYGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "PAYGATE_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(store) = args.store {
        server_config.store.backend = store;
    }
    if let Some(url) = args.database_url {
        server_config.store.postgres_url = url;
    }
    if let Some(token) = args.admin_token {
        server_config.auth.admin_token = token;
    }
    if let Some(level) = args.log_level {
        server_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        server_config.logging.format = format;
    }

    init_logging(&server_config.logging)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting paygate server"
    );

    validate_config(&server_config)?;

    let store = init_store(&server_config.store).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(ResponseCache::new(clock.clone()));

    let authenticator = Arc::new(Authenticator::new(
        store.clone(),
        cache.clone(),
        clock.clone(),
        AuthConfig {
            lockout_threshold: server_config.auth.lockout_threshold,
            lockout_duration: chrono::Duration::minutes(server_config.auth.lockout_minutes),
            replay_window: chrono::Duration::minutes(server_config.auth.replay_window_minutes),
        },
    ));

    // The bank adapter is a pluggable dependency; the deterministic
    // in-memory adapter stands in until a network integration is wired.
    let bank: Arc<dyn BankAdapter> = Arc::new(StubBank::new());

    let engine = Arc::new(PaymentEngine::new(
        store,
        bank,
        cache.clone(),
        authenticator,
        Arc::new(FacadeSink),
        Arc::new(HttpWebhookSender::new()),
        clock,
        EngineConfig {
            public_base_url: server_config.api.public_base_url.clone(),
            global_min_amount: server_config.limits.global_min_amount,
            global_max_amount: server_config.limits.global_max_amount,
            default_expiry_minutes: server_config.limits.default_expiry_minutes,
            ttls: CacheTtls {
                check_active: chrono::Duration::seconds(server_config.cache.check_active_secs),
                check_terminal: chrono::Duration::seconds(
                    server_config.cache.check_terminal_secs,
                ),
                mutation: chrono::Duration::seconds(server_config.cache.mutation_secs),
                ..CacheTtls::default()
            },
            ..EngineConfig::default()
        },
    ));

    spawn_sweeps(
        engine.clone(),
        cache,
        Duration::from_secs(server_config.cache.sweep_interval_secs),
    );

    let app = create_router(
        engine,
        ApiConfig {
            enable_cors: server_config.api.enable_cors,
            rate_limit: RateLimitConfig {
                enabled: server_config.api.rate_limit_per_minute > 0,
                requests_per_window: server_config.api.rate_limit_per_minute,
                window: Duration::from_secs(60),
            },
            admin_token: server_config.auth.admin_token.clone(),
        },
    );

    let addr = server_config.server.socket_addr()?;
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

fn init_logging(config: &config::LoggingSettings) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);
    match config.format.as_str() {
        "json" => subscriber.with(fmt::layer().json().with_target(true)).init(),
        _ => subscriber.with(fmt::layer().with_target(true)).init(),
    }
    Ok(())
}

fn validate_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.store.backend == "postgres" && config.store.postgres_url.is_empty() {
        anyhow::bail!("store backend is postgres but no DATABASE_URL is configured");
    }
    if config.auth.admin_token.is_empty() {
        tracing::warn!("no admin token configured, admin surface is disabled");
    }
    Ok(())
}

async fn init_store(config: &config::StoreSettings) -> anyhow::Result<Arc<dyn Store>> {
    match config.backend.as_str() {
        "postgres" => {
            tracing::info!("connecting to postgres");
            let store = PgStore::connect(&config.postgres_url, config.max_connections).await?;
            store.health_check().await?;
            tracing::info!("postgres store ready");
            Ok(Arc::new(store))
        }
        "memory" => {
            tracing::warn!("using the in-memory store; state is lost on restart");
            Ok(Arc::new(MemStore::new()))
        }
        other => anyhow::bail!("unknown store backend: {other}"),
    }
}

/// Expiry and cache sweeps on one interval.
fn spawn_sweeps(
    engine: Arc<PaymentEngine>,
    cache: Arc<ResponseCache>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.run_expiry_sweep().await {
                tracing::error!(error = %e, "expiry sweep failed");
            }
            let dropped = cache.sweep();
            if dropped > 0 {
                tracing::debug!(dropped, "cache sweep purged expired entries");
            }
        }
    });
}

/// Wait for Ctrl+C or SIGTERM, then allow in-flight requests to drain.
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }

    tokio::time::sleep(timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_port_override() {
        let args = Args::parse_from(["paygate-server", "--port", "9090"]);
        assert_eq!(args.port, Some(9090));
    }

    #[test]
    fn postgres_backend_requires_url() {
        let mut config = ServerConfig::default();
        config.store.backend = "postgres".into();
        assert!(validate_config(&config).is_err());
        config.store.postgres_url = "postgres://localhost/paygate".into();
        assert!(validate_config(&config).is_ok());
    }
}
