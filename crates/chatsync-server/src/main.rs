use std::future::IntoFuture;
use std::sync::Arc;

use chatsync_core::{
    BlobStore, ConversationController, DocumentStore, MemoryBlobStore, NotificationBus,
    SessionRegistry,
};
use chatsync_server::config::Cli;
use chatsync_server::{AppState, SqliteBlobStore};
use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "chatsync_server=info,chatsync_core=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let blobs = open_blob_store(&cli)?;
    let documents = Arc::new(DocumentStore::new(
        blobs,
        NotificationBus::new(cli.subscriber_buffer),
    ));
    documents.load_on_startup().await;

    if cli.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; chat requests will fail");
    }
    let model = chatsync_llm_openai::model(cli.openai_config(), &cli.model);
    tracing::info!(model = model.model_id(), "using model");

    let sessions = Arc::new(SessionRegistry::new(cli.session_limits()));
    let controller =
        ConversationController::new(model, documents, sessions, cli.model_settings())?;

    let public_dir = if cli.public_dir.is_dir() {
        Some(cli.public_dir.as_path())
    } else {
        tracing::warn!(
            path = %cli.public_dir.display(),
            "public directory not found, static files disabled"
        );
        None
    };
    let app = chatsync_server::router(AppState::new(Arc::new(controller)), public_dir);

    let listener = tokio::net::TcpListener::bind(cli.listen_addr()).await?;
    tracing::info!("chatsync listening on http://{}", listener.local_addr()?);

    // Event streams never finish on their own, so shut down without
    // waiting for open connections.
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

fn open_blob_store(cli: &Cli) -> Result<Arc<dyn BlobStore>, Box<dyn std::error::Error>> {
    if cli.ephemeral {
        tracing::info!("using in-memory storage");
        return Ok(Arc::new(MemoryBlobStore::new()));
    }

    let path = match &cli.db_path {
        Some(path) => path.clone(),
        None => chatsync_app::default_database_path()?,
    };
    tracing::info!(path = %path.display(), "opening database");
    Ok(Arc::new(SqliteBlobStore::open(&path)?))
}
