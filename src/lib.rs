pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
pub mod sync;
pub mod tmdb;
pub mod validation;

use std::{sync::Arc, time::Duration};

use axum::{Router, http::HeaderValue, routing::get};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::Auth,
    config::Config,
    store::{MovieStore, SEED_TITLES},
    tmdb::TmdbClient,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: MovieStore,
    pub auth: Auth,
    pub tmdb: Arc<TmdbClient>,
}

impl AppState {
    /// Opens the database, reconciles its indexes and wires the collaborators.
    pub async fn build(config: Config) -> anyhow::Result<Arc<Self>> {
        let config = Arc::new(config);

        let http = reqwest::Client::builder()
            .user_agent(concat!("movieshelf/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        let db = db::connect_and_migrate(&config.database_url).await?;
        let store = MovieStore::new(db.clone()).with_seed_policy(config.seed_delete_policy);
        if config.seed_on_empty {
            store.insert_seed_if_empty().await?;
        }

        let auth = Auth::new(db, config.jwt_secret.clone(), config.token_ttl_hours);

        let tmdb = TmdbClient::new(
            http,
            config.tmdb_access_token.clone(),
            config.tmdb_base_url.clone(),
            config.tmdb_rps,
        );

        Ok(Arc::new(Self { config, store, auth, tmdb: Arc::new(tmdb) }))
    }
}

/// Removes the legacy starter titles without seeding an empty collection first.
pub async fn purge_seeds(config: &Config) -> anyhow::Result<u64> {
    let movies = MovieStore::new(db::connect_and_migrate(&config.database_url).await?);
    Ok(movies.purge_seed_titles(&SEED_TITLES).await?)
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(routes::index))
        .route("/api/health", get(routes::health))
        .route("/api/movies", get(routes::list_movies).post(routes::create_movie))
        .route(
            "/api/movies/{id}",
            get(routes::get_movie).put(routes::update_movie).delete(routes::delete_movie),
        )
        .route("/api/auth/register", axum::routing::post(routes::register))
        .route("/api/auth/login", axum::routing::post(routes::login))
        .route("/api/auth/me", get(routes::me))
        .route("/api/discover/trending", get(routes::trending))
        .route("/api/discover/now-playing", get(routes::now_playing))
        .route("/api/discover/popular", get(routes::popular))
        .route("/api/discover/search", get(routes::search))
        .fallback(routes::not_found)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let layer = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
