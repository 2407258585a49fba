//! Gradian Backend
//!
//! A schema-driven procurement REST backend persisting JSON collections to
//! files or SQLite.

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod metrics;
mod models;
mod relations;
mod repository;
mod schema;
mod service;
mod storage;

use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::{Clock, SystemClock};
use config::{Config, StorageMode};
use relations::{RelationStore, RelationTypeStore, RELATION_TYPES_COLLECTION};
use schema::SchemaRegistry;
use storage::{CachedStore, CollectionStore, FileStore};

/// Collections served through the TTL cache.
const CACHED_COLLECTIONS: &[&str] = &[api::COMPANIES, RELATION_TYPES_COLLECTION];

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SchemaRegistry>,
    pub store: Arc<dyn CollectionStore>,
    pub relations: Arc<RelationStore>,
    pub relation_types: Arc<RelationTypeStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Open the configured storage backend and load schemas.
    pub async fn initialize(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let registry = SchemaRegistry::load(&config.data_dir)?;
        tracing::info!("Loaded {} schemas", registry.len());

        let backend: Arc<dyn CollectionStore> = match config.storage_mode {
            StorageMode::File => Arc::new(FileStore::new(&config.data_dir)),
            StorageMode::Database => {
                let pool = db::init_database(&config.db_path).await?;
                Arc::new(db::SqliteStore::new(pool))
            }
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store: Arc<dyn CollectionStore> = Arc::new(CachedStore::new(
            backend,
            CACHED_COLLECTIONS,
            config.cache_ttl,
            clock.clone(),
        ));

        Ok(Self {
            relations: Arc::new(RelationStore::new(store.clone(), clock.clone())),
            relation_types: Arc::new(RelationTypeStore::new(store.clone(), clock.clone())),
            registry: Arc::new(registry),
            config: Arc::new(config),
            store,
            clock,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gradian Backend");
    tracing::info!("Data directory: {:?}", config.data_dir);
    tracing::info!("Storage mode: {:?}", config.storage_mode);
    if config.storage_mode == StorageMode::Database {
        tracing::info!("Database path: {:?}", config.db_path);
    }
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (GRADIAN_API_PSK). Authentication is disabled!");
    }

    let bind_addr = config.bind_addr;
    let state = AppState::initialize(config).await?;

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Schema-driven entities
        .route(
            "/data/{schema_id}",
            get(api::list_entities).post(api::create_entity),
        )
        .route(
            "/data/{schema_id}/{id}",
            get(api::get_entity)
                .put(api::update_entity)
                .delete(api::delete_entity),
        )
        // Companies
        .route(
            "/companies",
            get(api::list_companies).post(api::create_company),
        )
        .route(
            "/companies/{id}",
            get(api::get_company)
                .put(api::update_company)
                .delete(api::delete_company),
        )
        // Relations
        .route(
            "/relations",
            get(api::list_relations)
                .post(api::create_relation)
                .delete(api::delete_relations),
        )
        .route(
            "/relations/{id}",
            get(api::get_relation).delete(api::delete_relation),
        )
        // Relation types
        .route(
            "/relation-types",
            get(api::list_relation_types).post(api::create_relation_type),
        )
        .route(
            "/relation-types/{id}",
            get(api::get_relation_type)
                .put(api::update_relation_type)
                .delete(api::delete_relation_type),
        )
        // Schemas
        .route("/schemas", get(api::list_schemas))
        .route("/schemas/{id}", get(api::get_schema))
        // Dashboard
        .route("/dashboard/stats", get(api::get_dashboard_stats))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
