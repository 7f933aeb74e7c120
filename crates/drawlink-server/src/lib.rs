pub mod api;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use drawlink_core::{BlobStore, FileBlobStore, RecordStore};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Database;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub attachments: Arc<dyn BlobStore>,
    pub max_attachment_bytes: usize,
}

/// Build the router with its middleware stack
pub fn app(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .merge(api::router())
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state))
}

/// Run the server with the given configuration
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    // Initialize database
    let db = Database::connect(&config).await?;

    // Run migrations
    db.migrate().await?;

    let attachments = FileBlobStore::new(&config.attachments_dir).await?;
    tracing::info!(
        "Storing attachments under {}",
        attachments.base_path().display()
    );

    let state = AppState {
        records: Arc::new(db),
        attachments: Arc::new(attachments),
        max_attachment_bytes: config.max_attachment_bytes,
    };
    let app = app(state, &config)?;

    // Start the server
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
