use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use marquee_core::{
    load_config, media::DownloadClientConfig, validate_config, Config, FsLibrary,
    HttpDownloadClientFactory, JobScheduler, MediaStore, ProwlarrClient, Reconciler,
    SqliteJobStore, SqliteMediaStore, TmdbClient,
};
use marquee_server::api::create_router;
use marquee_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be initialised when the config fails to load.
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("MARQUEE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config);
    info!(version = VERSION, config = ?config_path, "Starting marquee");
    info!("Database path: {:?}", config.database.path);

    let job_store = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to open job store")?,
    );
    let media_store = Arc::new(
        SqliteMediaStore::new(&config.database.path).context("Failed to open media store")?,
    );
    seed_download_clients(&config, media_store.as_ref())?;
    let stored_clients = media_store
        .list_download_clients()
        .context("Failed to list download clients")?;

    let prowlarr = config
        .prowlarr
        .clone()
        .context("[prowlarr] section is required")?;
    info!("Using Prowlarr at {}", prowlarr.url);
    let indexers =
        Arc::new(ProwlarrClient::new(prowlarr).context("Failed to create Prowlarr client")?);

    let tmdb = config.tmdb.clone().context("[tmdb] section is required")?;
    let metadata = Arc::new(TmdbClient::new(tmdb).context("Failed to create TMDB client")?);

    let download_clients = Arc::new(HttpDownloadClientFactory::new(
        config.library.download_dir.clone(),
    ));
    let library = Arc::new(FsLibrary::new(
        config.library.movie_dir.clone(),
        config.library.tv_dir.clone(),
    ));

    let reconciler = Arc::new(Reconciler::new(
        media_store,
        indexers,
        download_clients,
        metadata,
        library,
        config.reconciler.clone(),
    ));

    tokio::spawn(check_download_clients(reconciler.clone(), stored_clients));

    let scheduler = Arc::new(
        JobScheduler::new(config.scheduler.clone(), job_store).with_reconciler(reconciler),
    );
    let scheduler_handle = tokio::spawn(scheduler.clone().run());

    let state = Arc::new(AppState::new(config.clone(), scheduler.clone()));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let shutdown_scheduler = scheduler.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown_scheduler.shutdown();
        })
        .await
        .context("Server error")?;

    // Serving can also stop on its own; make sure the scheduler follows.
    scheduler.shutdown();
    scheduler_handle
        .await
        .context("Scheduler task failed")?;
    info!("Server stopped");

    Ok(())
}

/// Store the configured download clients on first start.
fn seed_download_clients(config: &Config, store: &dyn MediaStore) -> Result<()> {
    let existing = store
        .list_download_clients()
        .context("Failed to list download clients")?;
    if !existing.is_empty() {
        if !config.download_clients.is_empty() {
            warn!(
                stored = existing.len(),
                "Download clients already stored, ignoring [[download_clients]]"
            );
        }
        return Ok(());
    }

    for client in &config.download_clients {
        let created = store
            .create_download_client(client)
            .with_context(|| format!("Failed to store download client {}", client.base_url()))?;
        info!(
            download_client_id = created.id,
            implementation = %created.implementation,
            "Stored download client"
        );
    }
    Ok(())
}

/// Log whether each stored download client answers. Failures do not stop
/// startup; the reconciler skips unreachable clients.
async fn check_download_clients(reconciler: Arc<Reconciler>, clients: Vec<DownloadClientConfig>) {
    for client in &clients {
        match reconciler.test_download_client(client).await {
            Ok(downloads) => info!(
                download_client_id = client.id,
                url = %client.base_url(),
                downloads,
                "Download client reachable"
            ),
            Err(e) => warn!(
                download_client_id = client.id,
                url = %client.base_url(),
                error = %e,
                "Download client check failed"
            ),
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
