//! Client-side mirror of the movie collection and the favorites list.
//!
//! The server collection is authoritative. The favorites cache is seeded from
//! it once and then patched after each confirmed write. There is no conflict
//! handling: concurrent writers simply overwrite each other.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    error::AppError,
    models::{Movie, MovieFilters, MoviePatch, MovieSource, NewMovie},
    store::{DeleteOutcome, MovieStore},
    tmdb::ExternalMovie,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded {status}: {message}")]
    Api { status: u16, message: String },

    #[error("movie {0} not found")]
    NotFound(i32),

    #[error(transparent)]
    Store(#[from] AppError),

    #[error("cache file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remote operations the synchronizer needs.
#[allow(async_fn_in_trait)]
pub trait MovieApi {
    async fn list(&self) -> Result<Vec<Movie>, SyncError>;
    async fn create(&self, movie: &NewMovie) -> Result<Movie, SyncError>;
    async fn update(&self, id: i32, patch: &MoviePatch) -> Result<Movie, SyncError>;
    async fn delete(&self, id: i32) -> Result<(), SyncError>;
}

/// Something shown on screen that may or may not already be stored.
#[derive(Clone, Debug)]
pub enum Displayed {
    External(ExternalMovie),
    Stored(Movie),
}

impl Displayed {
    fn key(&self) -> String {
        match self {
            Displayed::External(m) => m.id.to_string(),
            Displayed::Stored(m) => m.id.to_string(),
        }
    }

    fn title(&self) -> &str {
        match self {
            Displayed::External(m) => &m.title,
            Displayed::Stored(m) => &m.title,
        }
    }
}

/// Finds the stored record for a displayed item: by external id, then by id,
/// then by exact title. Each rule scans the whole collection before the next
/// one is tried.
pub fn match_existing<'a>(candidate: &Displayed, collection: &'a [Movie]) -> Option<&'a Movie> {
    let key = candidate.key();
    collection
        .iter()
        .find(|m| m.external_id.as_deref() == Some(key.as_str()))
        .or_else(|| collection.iter().find(|m| m.id.to_string() == key))
        .or_else(|| collection.iter().find(|m| m.title == candidate.title()))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesCache {
    items: Vec<Movie>,
    last_updated: Option<Timestamp>,
}

impl FavoritesCache {
    pub fn from_items(items: Vec<Movie>) -> Self {
        Self { items, last_updated: None }
    }

    pub fn items(&self) -> &[Movie] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_updated(&self) -> Option<Timestamp> {
        self.last_updated
    }

    pub fn is_favorite(&self, candidate: &Displayed) -> bool {
        match_existing(candidate, &self.items).is_some()
    }

    /// Ignored when an entry with the same id or title is already present.
    pub fn add(&mut self, movie: Movie) -> bool {
        if self.items.iter().any(|f| f.id == movie.id || f.title == movie.title) {
            return false;
        }
        self.items.push(movie);
        self.touch();
        true
    }

    pub fn remove(&mut self, id: i32) {
        self.items.retain(|f| f.id != id);
        self.touch();
    }

    pub fn remove_matching(&mut self, candidate: &Displayed) {
        if let Some(id) = match_existing(candidate, &self.items).map(|m| m.id) {
            self.remove(id);
        }
    }

    pub fn replace(&mut self, movie: &Movie) {
        if let Some(slot) = self.items.iter_mut().find(|f| f.id == movie.id) {
            *slot = movie.clone();
            self.touch();
        }
    }

    /// Loads the flagged records from the collection, only if nothing is cached yet.
    pub fn seed_from_collection(&mut self, collection: &[Movie]) -> bool {
        if !self.items.is_empty() || collection.is_empty() {
            return false;
        }
        self.items = collection.iter().filter(|m| m.is_favorite).cloned().collect();
        self.touch();
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Some(Timestamp::now());
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToggleOutcome {
    Added(Movie),
    Unfavorited(Movie),
    Deleted(i32),
    /// The item was only in the local cache.
    Dropped,
}

pub struct Synchronizer<A> {
    api: A,
    image_base: String,
    collection: Vec<Movie>,
    favorites: FavoritesCache,
}

impl<A: MovieApi> Synchronizer<A> {
    pub fn new(api: A, image_base: impl Into<String>, favorites: FavoritesCache) -> Self {
        Self { api, image_base: image_base.into(), collection: Vec::new(), favorites }
    }

    pub fn collection(&self) -> &[Movie] {
        &self.collection
    }

    pub fn favorites(&self) -> &FavoritesCache {
        &self.favorites
    }

    pub fn into_parts(self) -> (Vec<Movie>, FavoritesCache) {
        (self.collection, self.favorites)
    }

    /// Refreshes the collection and seeds an empty favorites cache from it.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        self.collection = self.api.list().await?;
        if self.favorites.seed_from_collection(&self.collection) {
            tracing::debug!(count = self.favorites.len(), "seeded favorites from collection");
        }
        Ok(())
    }

    pub fn is_favorite(&self, candidate: &Displayed) -> bool {
        self.favorites.is_favorite(candidate)
    }

    pub async fn toggle_favorite(&mut self, candidate: &Displayed) -> Result<ToggleOutcome, SyncError> {
        let favorited = self.favorites.is_favorite(candidate);
        let existing = match_existing(candidate, &self.collection).cloned();

        match (favorited, existing) {
            (true, Some(record)) if record.source == MovieSource::Tmdb => {
                // Favoriting is the only reason a TMDB record exists locally.
                self.api.delete(record.id).await?;
                self.collection.retain(|m| m.id != record.id);
                self.favorites.remove(record.id);
                Ok(ToggleOutcome::Deleted(record.id))
            }
            (true, Some(record)) => {
                let updated = self.api.update(record.id, &MoviePatch::favorite(false)).await?;
                self.replace_in_collection(&updated);
                self.favorites.remove(record.id);
                Ok(ToggleOutcome::Unfavorited(updated))
            }
            (true, None) => {
                self.favorites.remove_matching(candidate);
                Ok(ToggleOutcome::Dropped)
            }
            (false, Some(record)) => {
                let updated = self.api.update(record.id, &MoviePatch::favorite(true)).await?;
                self.replace_in_collection(&updated);
                self.favorites.add(updated.clone());
                Ok(ToggleOutcome::Added(updated))
            }
            (false, None) => match candidate {
                Displayed::External(ext) => {
                    let saved = self.api.create(&ext.to_new_movie(&self.image_base)).await?;
                    tracing::debug!(id = saved.id, title = %saved.title, "saved external favorite");
                    self.collection.insert(0, saved.clone());
                    self.favorites.add(saved.clone());
                    Ok(ToggleOutcome::Added(saved))
                }
                Displayed::Stored(movie) => Err(SyncError::NotFound(movie.id)),
            },
        }
    }

    /// Sets or clears the personal note on the matching record. Falls back to a
    /// case-insensitive title match when the strict chain finds nothing.
    pub async fn update_opinion(
        &mut self,
        candidate: &Displayed,
        opinion: Option<String>,
    ) -> Result<Option<Movie>, SyncError> {
        let record = match_existing(candidate, &self.collection)
            .or_else(|| {
                let title = candidate.title().to_lowercase();
                self.collection.iter().find(|m| m.title.to_lowercase() == title)
            })
            .cloned();

        let Some(record) = record else {
            tracing::warn!(title = candidate.title(), "no stored movie to attach opinion to");
            return Ok(None);
        };

        let updated = self.api.update(record.id, &MoviePatch::opinion(opinion)).await?;
        self.replace_in_collection(&updated);
        self.favorites.replace(&updated);
        Ok(Some(updated))
    }

    pub async fn add_movie(&mut self, movie: &NewMovie) -> Result<Movie, SyncError> {
        let saved = self.api.create(movie).await?;
        self.collection.insert(0, saved.clone());
        if saved.is_favorite {
            self.favorites.add(saved.clone());
        }
        Ok(saved)
    }

    pub async fn update_movie(&mut self, id: i32, patch: &MoviePatch) -> Result<Movie, SyncError> {
        let updated = self.api.update(id, patch).await?;
        self.replace_in_collection(&updated);
        self.favorites.replace(&updated);
        Ok(updated)
    }

    pub async fn delete_movie(&mut self, id: i32) -> Result<(), SyncError> {
        self.api.delete(id).await?;
        self.collection.retain(|m| m.id != id);
        self.favorites.remove(id);
        Ok(())
    }

    fn replace_in_collection(&mut self, movie: &Movie) {
        match self.collection.iter_mut().find(|m| m.id == movie.id) {
            Some(slot) => *slot = movie.clone(),
            None => self.collection.insert(0, movie.clone()),
        }
    }
}

/// JSON files standing in for the browser's key-value storage: one file per
/// signed-in user, plus a shared one for anonymous use.
#[derive(Clone, Debug)]
pub struct CacheFile {
    dir: PathBuf,
}

impl CacheFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, kind: &str, user_id: Option<i32>) -> PathBuf {
        let owner = user_id.map(|id| id.to_string()).unwrap_or_else(|| "anonymous".to_string());
        self.dir.join(format!("{kind}-{owner}.json"))
    }

    pub async fn load_favorites(&self, user_id: Option<i32>) -> Result<FavoritesCache, SyncError> {
        let items = self.load(&self.path("favorites", user_id)).await?;
        Ok(FavoritesCache::from_items(items))
    }

    pub async fn save_favorites(&self, user_id: Option<i32>, cache: &FavoritesCache) -> Result<(), SyncError> {
        self.save(&self.path("favorites", user_id), cache.items()).await
    }

    pub async fn load_movies(&self, user_id: Option<i32>) -> Result<Vec<Movie>, SyncError> {
        self.load(&self.path("user-movies", user_id)).await
    }

    pub async fn save_movies(&self, user_id: Option<i32>, movies: &[Movie]) -> Result<(), SyncError> {
        self.save(&self.path("user-movies", user_id), movies).await
    }

    async fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, SyncError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                Ok(Vec::new())
            }
        }
    }

    async fn save<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, serde_json::to_vec(items)?).await?;
        Ok(())
    }
}

/// Talks to the movie routes over HTTP.
#[derive(Clone)]
pub struct HttpMovieApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    user_id: Option<i32>,
}

impl HttpMovieApi {
    /// `base_url` points at the API root, e.g. `http://localhost:3001/api`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let base_url = if base.ends_with("/api") { base.to_string() } else { format!("{base}/api") };
        Self { client, base_url, token: None, user_id: None }
    }

    /// Sends the token on every request and lists only this user's movies.
    pub fn signed_in(mut self, token: String, user_id: i32) -> Self {
        self.token = Some(token);
        self.user_id = Some(user_id);
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        Err(SyncError::Api { status: status.as_u16(), message })
    }
}

impl MovieApi for HttpMovieApi {
    async fn list(&self) -> Result<Vec<Movie>, SyncError> {
        let mut req = self.request(reqwest::Method::GET, "/movies");
        if let Some(user_id) = self.user_id {
            req = req.query(&[("userId", user_id)]);
        }
        Ok(Self::check(req.send().await?).await?.json().await?)
    }

    async fn create(&self, movie: &NewMovie) -> Result<Movie, SyncError> {
        let resp = self.request(reqwest::Method::POST, "/movies").json(movie).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn update(&self, id: i32, patch: &MoviePatch) -> Result<Movie, SyncError> {
        let resp = self
            .request(reqwest::Method::PUT, &format!("/movies/{id}"))
            .json(patch)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(id));
        }
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn delete(&self, id: i32) -> Result<(), SyncError> {
        let resp = self.request(reqwest::Method::DELETE, &format!("/movies/{id}")).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(id));
        }
        Self::check(resp).await?;
        Ok(())
    }
}

impl MovieApi for MovieStore {
    async fn list(&self) -> Result<Vec<Movie>, SyncError> {
        Ok(MovieStore::list(self, &MovieFilters::default()).await?)
    }

    async fn create(&self, movie: &NewMovie) -> Result<Movie, SyncError> {
        Ok(MovieStore::create(self, movie.clone()).await?)
    }

    async fn update(&self, id: i32, patch: &MoviePatch) -> Result<Movie, SyncError> {
        MovieStore::update(self, id, patch.clone()).await?.ok_or(SyncError::NotFound(id))
    }

    async fn delete(&self, id: i32) -> Result<(), SyncError> {
        match MovieStore::delete(self, id, self.seed_policy()).await? {
            DeleteOutcome::Deleted => Ok(()),
            DeleteOutcome::NotFound => Err(SyncError::NotFound(id)),
            DeleteOutcome::Protected => {
                Err(SyncError::Api { status: 403, message: "Cannot delete seed movies".into() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{AppState, config::Config, db, store::SeedDeletePolicy};

    const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

    fn stored(id: i32, title: &str, external_id: Option<&str>) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            rating: 7.0,
            genre: "Drama".to_string(),
            description: None,
            poster_path: None,
            external_id: external_id.map(str::to_string),
            trailer_id: None,
            source: MovieSource::User,
            personal_opinion: None,
            is_favorite: false,
            year: None,
            user_id: None,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn external(id: i64, title: &str) -> ExternalMovie {
        ExternalMovie {
            id,
            title: title.to_string(),
            overview: Some("From the listing".into()),
            poster_path: Some("/poster.jpg".into()),
            vote_average: 7.6,
            genre_ids: vec![878],
            release_date: Some("2016-11-10".into()),
        }
    }

    async fn store() -> MovieStore {
        MovieStore::new(db::connect_and_migrate("sqlite::memory:").await.unwrap())
    }

    #[test]
    fn match_prefers_external_id_then_id_then_title() {
        let collection = vec![
            stored(1, "Arrival", None),
            stored(42, "Contact", None),
            stored(7, "Sicario", Some("42")),
        ];

        let by_external = match_existing(&Displayed::External(external(42, "Arrival")), &collection);
        assert_eq!(by_external.map(|m| m.id), Some(7));

        let by_id = match_existing(&Displayed::External(external(1, "Sicario")), &collection);
        assert_eq!(by_id.map(|m| m.id), Some(1));

        let by_title = match_existing(&Displayed::External(external(999, "Contact")), &collection);
        assert_eq!(by_title.map(|m| m.id), Some(42));

        assert!(match_existing(&Displayed::External(external(999, "Heat")), &collection).is_none());
        assert!(match_existing(&Displayed::External(external(999, "arrival")), &collection).is_none());
    }

    #[test]
    fn cache_add_ignores_same_id_or_title() {
        let mut cache = FavoritesCache::default();
        assert!(cache.add(stored(1, "Arrival", None)));
        assert!(!cache.add(stored(1, "Renamed", None)));
        assert!(!cache.add(stored(2, "Arrival", None)));
        assert!(cache.add(stored(3, "Contact", None)));
        assert_eq!(cache.len(), 2);
        assert!(cache.last_updated().is_some());

        cache.remove(1);
        assert_eq!(cache.items().iter().map(|m| m.id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn seeding_only_happens_once() {
        let mut collection = vec![stored(1, "Arrival", None), stored(2, "Contact", None)];
        collection[1].is_favorite = true;

        let mut cache = FavoritesCache::default();
        assert!(!cache.seed_from_collection(&[]));
        assert!(cache.seed_from_collection(&collection));
        assert_eq!(cache.items().len(), 1);
        assert_eq!(cache.items()[0].id, 2);

        collection[0].is_favorite = true;
        assert!(!cache.seed_from_collection(&collection));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn load_seeds_favorites_from_server() {
        let store = store().await;
        store.create(NewMovie::new("Arrival", 9.0, "Sci-Fi")).await.unwrap();
        store
            .create(NewMovie { is_favorite: false, ..NewMovie::new("Contact", 8.0, "Sci-Fi") })
            .await
            .unwrap();

        let mut sync = Synchronizer::new(store, IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();
        assert_eq!(sync.collection().len(), 2);
        assert_eq!(sync.favorites().len(), 1);
        assert_eq!(sync.favorites().items()[0].title, "Arrival");
    }

    #[tokio::test]
    async fn toggling_an_external_item_creates_then_deletes_it() {
        let store = store().await;
        let mut sync = Synchronizer::new(store.clone(), IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();

        let item = Displayed::External(external(329865, "Arrival"));
        let added = match sync.toggle_favorite(&item).await.unwrap() {
            ToggleOutcome::Added(movie) => movie,
            other => panic!("expected Added, got {other:?}"),
        };
        assert_eq!(added.source, MovieSource::Tmdb);
        assert_eq!(added.external_id.as_deref(), Some("329865"));
        assert!(added.is_favorite);
        assert!(sync.is_favorite(&item));
        assert_eq!(sync.favorites().items()[0].id, added.id);
        assert!(store.get_by_id(added.id).await.unwrap().is_some());

        let outcome = sync.toggle_favorite(&item).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Deleted(added.id));
        assert!(!sync.is_favorite(&item));
        assert!(sync.collection().is_empty());
        assert!(store.get_by_id(added.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unfavoriting_a_user_movie_keeps_the_record() {
        let store = store().await;
        let saved = store.create(NewMovie::new("Arrival", 9.0, "Sci-Fi")).await.unwrap();

        let mut sync = Synchronizer::new(store.clone(), IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();
        let item = Displayed::Stored(saved.clone());
        assert!(sync.is_favorite(&item));

        match sync.toggle_favorite(&item).await.unwrap() {
            ToggleOutcome::Unfavorited(movie) => assert!(!movie.is_favorite),
            other => panic!("expected Unfavorited, got {other:?}"),
        }
        assert!(sync.favorites().is_empty());
        let kept = store.get_by_id(saved.id).await.unwrap().unwrap();
        assert!(!kept.is_favorite);

        match sync.toggle_favorite(&item).await.unwrap() {
            ToggleOutcome::Added(movie) => assert_eq!(movie.id, saved.id),
            other => panic!("expected Added, got {other:?}"),
        }
        assert!(store.get_by_id(saved.id).await.unwrap().unwrap().is_favorite);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cache_only_favorite_is_dropped_locally() {
        let store = store().await;
        let cache = FavoritesCache::from_items(vec![stored(77, "Ghost", None)]);
        let mut sync = Synchronizer::new(store, IMAGE_BASE, cache);

        let item = Displayed::External(external(1, "Ghost"));
        assert_eq!(sync.toggle_favorite(&item).await.unwrap(), ToggleOutcome::Dropped);
        assert!(sync.favorites().is_empty());
    }

    #[tokio::test]
    async fn opinion_updates_mirror_into_cache() {
        let store = store().await;
        let saved = store.create(NewMovie::new("Arrival", 9.0, "Sci-Fi")).await.unwrap();
        let mut sync = Synchronizer::new(store, IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();

        let item = Displayed::External(external(5, "ARRIVAL"));
        let updated = sync.update_opinion(&item, Some("Non-linear".into())).await.unwrap().unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(sync.favorites().items()[0].personal_opinion.as_deref(), Some("Non-linear"));

        let missing = Displayed::External(external(6, "Heat"));
        assert!(sync.update_opinion(&missing, Some("?".into())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn crud_keeps_collection_and_cache_in_step() {
        let store = store().await;
        let mut sync = Synchronizer::new(store, IMAGE_BASE, FavoritesCache::default());

        let saved = sync.add_movie(&NewMovie::new("Arrival", 9.0, "Sci-Fi")).await.unwrap();
        assert_eq!(sync.collection().len(), 1);
        assert_eq!(sync.favorites().len(), 1);

        let patch = MoviePatch { rating: Some(10.0), ..Default::default() };
        sync.update_movie(saved.id, &patch).await.unwrap();
        assert_eq!(sync.collection()[0].rating, 10.0);
        assert_eq!(sync.favorites().items()[0].rating, 10.0);

        sync.delete_movie(saved.id).await.unwrap();
        assert!(sync.collection().is_empty());
        assert!(sync.favorites().is_empty());

        assert!(matches!(sync.delete_movie(saved.id).await, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn direct_store_rejects_invalid_external_items() {
        let store = store().await;
        let mut sync = Synchronizer::new(store.clone(), IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();

        let item = Displayed::External(ExternalMovie {
            genre_ids: vec![28, 12, 16, 35, 80, 99, 18],
            ..external(14160, "Up")
        });
        let err = sync.toggle_favorite(&item).await.unwrap_err();
        assert!(matches!(err, SyncError::Store(AppError::Validation(ref e)) if e.contains("title")));
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(sync.favorites().is_empty());
    }

    #[tokio::test]
    async fn direct_store_follows_its_seed_policy() {
        let seed = || NewMovie { source: MovieSource::Seed, ..NewMovie::new("Inception", 9.0, "Sci-Fi") };

        let protected = store().await;
        let saved = protected.create(seed()).await.unwrap();
        let mut sync = Synchronizer::new(protected, IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();
        assert!(matches!(sync.delete_movie(saved.id).await, Err(SyncError::Api { status: 403, .. })));

        let open = store().await.with_seed_policy(SeedDeletePolicy::Allow);
        let saved = open.create(seed()).await.unwrap();
        let mut sync = Synchronizer::new(open.clone(), IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();
        sync.delete_movie(saved.id).await.unwrap();
        assert_eq!(open.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cache_files_are_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let files = CacheFile::new(dir.path());

        let cache = FavoritesCache::from_items(vec![stored(1, "Arrival", None)]);
        files.save_favorites(Some(5), &cache).await.unwrap();
        files.save_movies(None, &[stored(2, "Contact", None)]).await.unwrap();

        assert_eq!(files.load_favorites(Some(5)).await.unwrap().items(), cache.items());
        assert!(files.load_favorites(Some(6)).await.unwrap().is_empty());
        assert!(files.load_favorites(None).await.unwrap().is_empty());
        assert_eq!(files.load_movies(None).await.unwrap().len(), 1);
        assert!(files.path("favorites", None).ends_with("favorites-anonymous.json"));

        tokio::fs::write(files.path("favorites", Some(9)), b"{not json").await.unwrap();
        assert!(files.load_favorites(Some(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_api_round_trips_through_the_router() {
        let config = Config::for_tests();
        let state = AppState::build(config).await.unwrap();
        let app = crate::app(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let api = HttpMovieApi::new(reqwest::Client::new(), &format!("http://{addr}"));
        let mut sync = Synchronizer::new(api, IMAGE_BASE, FavoritesCache::default());
        sync.load().await.unwrap();

        let item = Displayed::External(external(329865, "Arrival"));
        let added = match sync.toggle_favorite(&item).await.unwrap() {
            ToggleOutcome::Added(movie) => movie,
            other => panic!("expected Added, got {other:?}"),
        };
        assert_eq!(added.poster_path.as_deref(), Some("https://image.tmdb.org/t/p/w500/poster.jpg"));

        let bad = sync.add_movie(&NewMovie::new("No", 5.0, "Drama")).await;
        match bad {
            Err(SyncError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Validation failed");
            }
            other => panic!("expected validation failure, got {other:?}"),
        }

        assert_eq!(sync.toggle_favorite(&item).await.unwrap(), ToggleOutcome::Deleted(added.id));
        assert!(state.store.get_by_id(added.id).await.unwrap().is_none());
    }
}
