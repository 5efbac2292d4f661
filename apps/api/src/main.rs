use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use logbook_api::config::Config;
use logbook_api::db::create_pool;
use logbook_api::notes::pg_store::PgNoteStore;
use logbook_api::notes::store::{MemoryNoteStore, NoteStore};
use logbook_api::routes::build_router;
use logbook_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Logbook API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn NoteStore> = match &config.database_url {
        Some(url) => Arc::new(PgNoteStore::new(create_pool(url).await?)),
        None => {
            info!("DATABASE_URL not set, notes are kept in memory");
            Arc::new(MemoryNoteStore::default())
        }
    };

    let state = AppState {
        store,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
