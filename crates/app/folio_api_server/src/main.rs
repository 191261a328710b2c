//! Folio authentication API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use folio_api::config::ApiConfig;
use folio_core::email::LogMailer;
use folio_core::store::{AuthStore, MemoryStore, PgStore};
use folio_core::sweep::{SWEEP_INTERVAL, spawn_sweeper};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "folio_api_server", about = "Folio authentication API server")]
struct Args {
    /// Address to listen on; overrides `BIND_ADDR`.
    #[arg(long, env = "BIND_ADDR")]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/folio"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep all state in memory instead of PostgreSQL. Lost on exit.
    #[arg(long, default_value_t = false)]
    memory: bool,

    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP`. Same as
    /// `TRUST_PROXY=true`; only enable behind a proxy that sets them.
    #[arg(long, default_value_t = false)]
    trust_proxy: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(
                    "info,folio_api=debug,folio_core=debug",
                )),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    config.database_url = args.database_url;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    config.trust_proxy |= args.trust_proxy;
    info!(
        app_env = %config.app_env,
        bind_addr = %config.bind_addr,
        trust_proxy = config.trust_proxy,
        "starting folio_api_server"
    );

    let store: Arc<dyn AuthStore> = if args.memory {
        warn!("in-memory store selected; accounts are lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;

        info!("running database migrations");
        folio_api::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let state = folio_api::AppState::new(config.clone(), store.clone(), Arc::new(LogMailer));

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        store,
        state.denylist.clone(),
        SWEEP_INTERVAL,
        shutdown.clone(),
    );

    let app = folio_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
        }
        signal.cancel();
    });

    let api_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    })
    .await;

    shutdown.cancel();
    let _ = sweeper.await;

    api_result?;

    Ok(())
}
