use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prpkg_core::{
    create_authenticator, create_background_system, load_config, validate_config,
    ArtifactStore, Authenticator, CursorStore, DownloadIndex, FileWhitelist, GithubNotifier,
    Notifier, NpmRegistryClient, RetentionManager, SqliteArtifactStore, SqliteCursorStore,
    SqliteDownloadIndex, SqliteWorkflowRegistry, WorkflowRegistry,
};
use prpkg_server::{create_router, AppState, Collaborators, Stores};

/// Buffer size for the background job channel
const BACKGROUND_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PRPKG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let db_path = &config.database.path;
    let workflows: Arc<dyn WorkflowRegistry> = Arc::new(
        SqliteWorkflowRegistry::new(db_path).context("Failed to create workflow registry")?,
    );
    let cursors: Arc<dyn CursorStore> =
        Arc::new(SqliteCursorStore::new(db_path).context("Failed to create cursor store")?);
    let artifacts: Arc<dyn ArtifactStore> =
        Arc::new(SqliteArtifactStore::new(db_path).context("Failed to create artifact store")?);
    let downloads: Arc<dyn DownloadIndex> = Arc::new(
        SqliteDownloadIndex::new(db_path).context("Failed to create download index")?,
    );
    info!("Stores initialized");

    let registry = Arc::new(
        NpmRegistryClient::new(&config.registry).context("Failed to create registry client")?,
    );
    info!("Using npm registry at {}", config.registry.url);

    let notifier: Option<Arc<dyn Notifier>> = match &config.notifier {
        Some(notifier_config) => {
            info!("Initializing notifier at {}", notifier_config.api_url);
            Some(Arc::new(
                GithubNotifier::new(notifier_config).context("Failed to create notifier")?,
            ))
        }
        None => {
            info!("No notifier configured, check runs and comments are disabled");
            None
        }
    };

    let whitelist = Arc::new(FileWhitelist::new(
        config.publish.whitelist_path.clone(),
        Duration::from_secs(config.publish.whitelist_ttl_secs),
    ));

    let retention = Arc::new(RetentionManager::new(
        Arc::clone(&artifacts),
        Arc::clone(&downloads),
        &config.retention,
    ));

    let (background, worker) = create_background_system(
        Arc::clone(&downloads),
        Arc::clone(&retention),
        BACKGROUND_BUFFER_SIZE,
    );
    let worker_handle = tokio::spawn(worker.run());

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        Stores {
            workflows,
            cursors,
            artifacts,
            downloads,
        },
        Collaborators {
            registry,
            notifier,
            whitelist,
        },
        retention,
        background,
    ));

    let app = create_router(Arc::clone(&state));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    // The worker exits once the last handle, held by the state, is gone.
    drop(state);
    let _ = worker_handle.await;
    info!("Background worker stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
