pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use config::{Config, IdentityBackend, StoreBackend};
use services::{
    identity::{GoTrueIdentity, IdentityProvider, StaticIdentity},
    planner::GenerationLocks,
    sessions::SessionRegistry,
};
use store::{MemoryStore, PgStore, RestStore, Store};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionRegistry>,
    pub generation_locks: Arc<GenerationLocks>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            identity,
            sessions: Arc::new(SessionRegistry::new()),
            generation_locks: Arc::new(GenerationLocks::default()),
        }
    }
}

/// Connect the configured store and identity backends.
pub async fn build_state(config: Config) -> anyhow::Result<AppState> {
    let timeout = Duration::from_secs(config.request_timeout_seconds);
    let project = || -> anyhow::Result<(&str, &str)> {
        let url = config
            .supabase_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("SUPABASE_URL is not set"))?;
        let key = config
            .supabase_anon_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("SUPABASE_ANON_KEY is not set"))?;
        Ok((url, key))
    };

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Rest => {
            let (url, key) = project()?;
            info!("Using PostgREST store at {url}");
            Arc::new(RestStore::new(url, key, timeout)?)
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
            let pool = db::create_pool(database_url).await?;
            db::run_migrations(&pool).await?;
            info!("Database connected and migrations applied");
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            for user in &config.static_users {
                store.set_role(user.id, user.role).await;
            }
            info!("Using in-memory store with {} seeded roles", config.static_users.len());
            Arc::new(store)
        }
    };

    let identity: Arc<dyn IdentityProvider> = match config.identity_backend {
        IdentityBackend::Supabase => {
            let (url, key) = project()?;
            Arc::new(GoTrueIdentity::new(url, key, timeout)?)
        }
        IdentityBackend::Static => {
            info!("Using static identity with {} users", config.static_users.len());
            Arc::new(StaticIdentity::new(
                config.static_users.clone(),
                &config.jwt_secret,
                config.static_token_ttl_seconds,
            ))
        }
    };

    Ok(AppState::new(config, store, identity))
}

/// Allow the configured app origin, plus localhost for local development.
fn cors_layer(base_url: &str) -> CorsLayer {
    let base = base_url.trim_end_matches('/').to_string();
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let o = match origin.to_str() {
            Ok(s) => s,
            Err(_) => return false,
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(origin)
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.app_base_url);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/events", get(routes::events::ws_handler))
        // Meal library
        .route("/", get(routes::meals::list_meals))
        .route("/meals", get(routes::meals::list_meals).post(routes::meals::create_meal))
        .route(
            "/meals/{id}",
            get(routes::meals::get_meal)
                .put(routes::meals::update_meal)
                .delete(routes::meals::delete_meal),
        )
        // Weekly plan
        .route("/weekly", get(routes::weekly::get_week).delete(routes::weekly::clear_week))
        .route("/weekly/generate", post(routes::weekly::generate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}
