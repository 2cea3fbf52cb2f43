use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;

mod auth;
mod autosave;
mod config;
mod controllers;
mod crypto;
mod db_ops;
mod debounce;
mod errors;
mod extractors;
mod models;
mod notes;
mod routes;
mod session;
mod store;
mod validation;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    setup_tracing();

    let config = config::ServerConfig::from_env()?;
    let session_key = Arc::new(crypto::SessionKey::from_env()?);
    let store = create_store(config.store).await?;
    let notes = Arc::new(
        notes::Notes::new(store, config.autosave_delay)
            .with_idle_timeout(config.editor_idle_timeout),
    );
    notes::spawn_editor_reaper(&notes);
    let state = models::AppState {
        notes,
        session_key,
    };
    let app = routes::get_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("listening on {}", config.addr);
    axum::Server::bind(&config.addr)
        .serve(app.into_make_service())
        .await
        .context("server to keep running")?;

    Ok(())
}

fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn create_store(
    backend: config::StoreBackend,
) -> Result<Arc<dyn store::NoteStore>> {
    let store: Arc<dyn store::NoteStore> = match backend {
        config::StoreBackend::Postgres => {
            let db = db_ops::create_pg_pool(&config::postgres_url()?).await?;
            Arc::new(db_ops::PgNoteStore::new(db))
        }
        config::StoreBackend::Memory => {
            info!("using in-memory note store; notes will not survive a restart");
            Arc::new(store::MemoryStore::default())
        }
    };

    Ok(store)
}
