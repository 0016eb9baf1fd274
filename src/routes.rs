use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::{DbErr, SqlErr};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::{AuthUser, MaybeUser},
    error::{AppError, AppResult},
    models::{
        AuthResponse, LoginRequest, Movie, MovieFilters, MovieInput, MoviePatch, NewMovie,
        RegisterRequest, UserView,
    },
    store::DeleteOutcome,
    tmdb::{ExternalMovie, Listing},
    validation::ValidationErrors,
};

const MOVIE_NOT_FOUND: &str = "Movie not found";

pub async fn index(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "Movie API Server",
        "version": env!("CARGO_PKG_VERSION"),
        "imageBase": state.config.tmdb_image_base,
        "endpoints": {
            "health": "/api/health",
            "movies": "/api/movies",
            "movieById": "/api/movies/{id}",
            "auth": "/api/auth",
            "discover": "/api/discover",
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Route not found")
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<MovieFilters>,
) -> AppResult<Json<Vec<Movie>>> {
    let movies = state.store.list(&filters).await?;
    tracing::debug!(count = movies.len(), ?filters, "listed movies");
    Ok(Json(movies))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Movie>> {
    Ok(Json(find_movie(&state, &id).await?))
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    payload: Result<Json<MovieInput>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload.map_err(body_error)?;
    let new = NewMovie::try_from_input(input, user.map(|u| u.id))?;

    let movie = state.store.create(new).await.map_err(conflict_as_validation)?;
    tracing::info!(id = movie.id, title = %movie.title, "movie created");
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    MaybeUser(user): MaybeUser,
    payload: Result<Json<MovieInput>, JsonRejection>,
) -> AppResult<Json<Movie>> {
    let existing = find_movie(&state, &id).await?;
    ensure_owner(&existing, user.as_ref())?;

    let Json(input) = payload.map_err(body_error)?;
    let patch = MoviePatch::try_from_input(input)?;
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".into()));
    }

    let updated = state
        .store
        .update(existing.id, patch)
        .await
        .map_err(conflict_as_validation)?
        .ok_or(AppError::NotFound(MOVIE_NOT_FOUND))?;
    Ok(Json(updated))
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    MaybeUser(user): MaybeUser,
) -> AppResult<StatusCode> {
    let existing = find_movie(&state, &id).await?;
    ensure_owner(&existing, user.as_ref())?;

    match state.store.delete(existing.id, state.store.seed_policy()).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(AppError::NotFound(MOVIE_NOT_FOUND)),
        DeleteOutcome::Protected => Err(AppError::Forbidden("Cannot delete seed movies".into())),
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(req) = payload.map_err(body_error)?;
    let resp = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(req) = payload.map_err(body_error)?;
    Ok(Json(state.auth.login(req).await?))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserView> {
    Json(user)
}

pub async fn trending(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<ExternalMovie>>> {
    Ok(Json(state.tmdb.listing(Listing::Trending).await?))
}

pub async fn now_playing(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<ExternalMovie>>> {
    Ok(Json(state.tmdb.listing(Listing::NowPlaying).await?))
}

pub async fn popular(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<ExternalMovie>>> {
    Ok(Json(state.tmdb.listing(Listing::Popular).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    query: String,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<ExternalMovie>>> {
    Ok(Json(state.tmdb.search(&q.query).await?))
}

/// Ids that do not parse are reported as missing, same as unknown ones.
async fn find_movie(state: &AppState, id: &str) -> AppResult<Movie> {
    let Ok(id) = id.trim().parse::<i32>() else {
        return Err(AppError::NotFound(MOVIE_NOT_FOUND));
    };
    state.store.get_by_id(id).await?.ok_or(AppError::NotFound(MOVIE_NOT_FOUND))
}

/// Records that belong to an account may only be changed by that account.
fn ensure_owner(movie: &Movie, user: Option<&UserView>) -> AppResult<()> {
    match (movie.user_id, user) {
        (None, _) => Ok(()),
        (Some(owner), Some(user)) if owner == user.id => Ok(()),
        _ => Err(AppError::Forbidden("Not allowed to modify this movie".into())),
    }
}

fn body_error(rejection: JsonRejection) -> AppError {
    ValidationErrors::single("body", rejection.body_text()).into()
}

fn conflict_as_validation(err: AppError) -> AppError {
    let is_conflict = match &err {
        AppError::Internal(e) => e
            .downcast_ref::<DbErr>()
            .and_then(DbErr::sql_err)
            .is_some_and(|e| matches!(e, SqlErr::UniqueConstraintViolation(_))),
        _ => false,
    };
    if is_conflict {
        ValidationErrors::single("externalId", "This movie is already in the collection").into()
    } else {
        err
    }
}
