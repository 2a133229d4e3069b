use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrivano_core::{
    create_authenticator, load_config, validate_config, Authenticator, EventBus, FsObjectStore,
    NatsWorkQueue, ObjectStore, SqliteEventLog, SqliteTaskStore, TaskOrchestrator, TaskStore,
    WorkQueue,
};

use scrivano_server::api::create_router;
use scrivano_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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
    let config_path = std::env::var("SCRIVANO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);
    info!("Object store root: {:?}", config.objects.root);

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create SQLite task store
    let task_store: Arc<dyn TaskStore> = Arc::new(
        SqliteTaskStore::new(&config.database.path).context("Failed to create task store")?,
    );
    info!("Task store initialized");

    // Create SQLite event log and the event bus on top of it
    let event_log =
        SqliteEventLog::new(&config.database.path).context("Failed to create event log")?;
    let event_bus = Arc::new(EventBus::new(
        Arc::new(event_log),
        config.orchestrator.event_capacity,
    ));
    info!("Event bus initialized");

    // Create filesystem object store
    let object_store: Arc<dyn ObjectStore> = Arc::new(
        FsObjectStore::new(config.objects.root.clone())
            .context("Failed to create object store")?,
    );
    info!("Object store initialized");

    // Connect the work queue publisher
    let work_queue: Arc<dyn WorkQueue> = Arc::new(
        NatsWorkQueue::connect(&config.queue)
            .await
            .context("Failed to connect to NATS")?,
    );
    info!(
        "Work queue connected (subject: {})",
        config.queue.subject
    );

    // Create the orchestrator
    let orchestrator = Arc::new(TaskOrchestrator::new(
        config.orchestrator.clone(),
        task_store,
        object_store,
        work_queue,
        event_bus,
    ));
    info!("Task orchestrator initialized");

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), authenticator, orchestrator));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
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
