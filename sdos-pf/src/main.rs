//! sdos-pf - artist collaboration pathfinder service
//!
//! Serves artist search and shortest collaboration paths over HTTP. The graph
//! is loaded from the on-disk cache (or built from the catalog) in the
//! background, so the server accepts connections immediately.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sdos_common::config;
use sdos_common::db::{connect_catalog_lazy, redact_url};
use sdos_pf::cache::GraphCache;
use sdos_pf::catalog::PgCatalog;
use sdos_pf::{build_router, logging, AppState, GraphManager, ManagerSettings};
use tokio::signal;
use tracing::{error, info};

/// Command-line arguments for sdos-pf
#[derive(Parser, Debug)]
#[command(name = "sdos-pf")]
#[command(about = "Artist collaboration pathfinder service")]
#[command(version)]
struct Args {
    /// Port to listen on [env: SDOS_PF_PORT]
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    bind: IpAddr,

    /// Catalog connection URL [env: DATABASE_URL]
    #[arg(long)]
    database_url: Option<String>,

    /// Folder holding the cache artifacts [env: SDOS_CACHE_FOLDER]
    #[arg(long)]
    cache_folder: Option<PathBuf>,

    /// Config file to use instead of the platform default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_filter = logging::init("info");

    // Build identification comes first so every log starts with it
    info!(
        "Starting SDOS Pathfinder (sdos-pf) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml_config = match &args.config {
        Some(path) => config::load_toml_config_from(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => config::load_toml_config(),
    };
    log_filter.apply_level(&toml_config.logging.level);

    let database_url = config::resolve_database_url(args.database_url.as_deref(), &toml_config);
    let cache_folder = config::resolve_cache_folder(args.cache_folder.as_deref(), &toml_config);
    let port = config::resolve_port(args.port, &toml_config);

    config::ensure_directory_exists(&cache_folder)
        .with_context(|| format!("Failed to create cache folder {}", cache_folder.display()))?;
    info!("Catalog: {}", redact_url(&database_url));
    info!("Cache folder: {}", cache_folder.display());

    // The pool connects on first use so a cached graph can be served offline
    let pool = connect_catalog_lazy(&database_url).context("Invalid catalog URL")?;
    let catalog = Arc::new(PgCatalog::new(pool, toml_config.catalog.clone()));
    let cache = GraphCache::new(&cache_folder)
        .with_max_age(ManagerSettings::max_cache_age(&toml_config.graph));
    let manager = Arc::new(GraphManager::new(
        catalog,
        cache,
        ManagerSettings::from_config(&toml_config.graph),
    ));

    manager.spawn_warmup();

    let app = build_router(AppState::new(manager));

    let addr = SocketAddr::new(args.bind, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("sdos-pf listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
