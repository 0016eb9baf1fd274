use std::str::FromStr;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TryIntoModel,
};

use crate::{
    entities::movie::{self, MovieSource},
    error::AppResult,
    models::{Movie, MovieFilters, MoviePatch, NewMovie},
    validation::validate_record,
};

/// Whether records with `source = seed` may be deleted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeedDeletePolicy {
    #[default]
    Protect,
    Allow,
}

impl FromStr for SeedDeletePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "protect" => Ok(SeedDeletePolicy::Protect),
            "allow" => Ok(SeedDeletePolicy::Allow),
            other => anyhow::bail!("unknown seed delete policy {other:?}, expected protect or allow"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Protected,
}

/// Handle over the `movies` table. Cheap to clone.
///
/// Every write is checked against the field rules in [`crate::validation`], so
/// callers that bypass the HTTP layer cannot persist invalid records.
#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
    seed_policy: SeedDeletePolicy,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, seed_policy: SeedDeletePolicy::default() }
    }

    pub fn with_seed_policy(mut self, policy: SeedDeletePolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    pub fn seed_policy(&self) -> SeedDeletePolicy {
        self.seed_policy
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn list(&self, filters: &MovieFilters) -> AppResult<Vec<Movie>> {
        let mut query = movie::Entity::find();

        if let Some(genre) = non_empty(&filters.genre) {
            query = query.filter(movie::Column::Genre.eq(genre));
        }
        if let Some(source) = non_empty(&filters.source) {
            // An unknown source matches nothing rather than everything.
            let Some(source) = MovieSource::parse(source) else {
                return Ok(Vec::new());
            };
            query = query.filter(movie::Column::Source.eq(source));
        }
        if let Some(user_id) = filters.user_id {
            query = query.filter(movie::Column::UserId.eq(user_id));
        }

        let rows = query
            .order_by_desc(movie::Column::CreatedAt)
            .order_by_desc(movie::Column::Id)
            .all(&self.db)
            .await?;

        // SQLite LIKE folds ASCII only and treats % and _ as wildcards, so the
        // substring match runs here with Unicode lowercasing.
        let needle = non_empty(&filters.search).map(str::to_lowercase);
        Ok(rows
            .into_iter()
            .filter(|row| needle.as_deref().is_none_or(|n| matches_search(row, n)))
            .map(Movie::from)
            .collect())
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Movie>> {
        let row = movie::Entity::find_by_id(id).one(&self.db).await?;
        Ok(row.map(Movie::from))
    }

    pub async fn create(&self, new: NewMovie) -> AppResult<Movie> {
        let now = now_ms();
        let record = movie::Model {
            id: 0,
            title: new.title,
            rating: new.rating,
            genre: new.genre,
            description: new.description,
            poster_path: new.poster_path,
            external_id: new.external_id,
            trailer_id: new.trailer_id,
            source: new.source,
            personal_opinion: new.personal_opinion,
            is_favorite: new.is_favorite,
            year: new.year,
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
        };
        validate_record(&record)?;

        let model = movie::ActiveModel {
            id: NotSet,
            title: Set(record.title),
            rating: Set(record.rating),
            genre: Set(record.genre),
            description: Set(record.description),
            poster_path: Set(record.poster_path),
            external_id: Set(record.external_id),
            trailer_id: Set(record.trailer_id),
            source: Set(record.source),
            personal_opinion: Set(record.personal_opinion),
            is_favorite: Set(record.is_favorite),
            year: Set(record.year),
            user_id: Set(record.user_id),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        };

        let saved = model.insert(&self.db).await?;
        tracing::debug!(id = saved.id, title = %saved.title, "created movie");
        Ok(saved.into())
    }

    pub async fn update(&self, id: i32, patch: MoviePatch) -> AppResult<Option<Movie>> {
        let Some(existing) = movie::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        // Strictly later than the previous write even within the same millisecond.
        let updated_at = now_ms().max(existing.updated_at + 1);
        let mut model = existing.into_active_model();

        if let Some(title) = patch.title {
            model.title = Set(title);
        }
        if let Some(rating) = patch.rating {
            model.rating = Set(rating);
        }
        if let Some(genre) = patch.genre {
            model.genre = Set(genre);
        }
        if let Some(description) = patch.description {
            model.description = Set(description);
        }
        if let Some(poster_path) = patch.poster_path {
            model.poster_path = Set(poster_path);
        }
        if let Some(external_id) = patch.external_id {
            model.external_id = Set(external_id);
        }
        if let Some(trailer_id) = patch.trailer_id {
            model.trailer_id = Set(trailer_id);
        }
        if let Some(source) = patch.source {
            model.source = Set(source);
        }
        if let Some(opinion) = patch.personal_opinion {
            model.personal_opinion = Set(opinion);
        }
        if let Some(is_favorite) = patch.is_favorite {
            model.is_favorite = Set(is_favorite);
        }
        if let Some(year) = patch.year {
            model.year = Set(year);
        }
        model.updated_at = Set(updated_at);

        validate_record(&model.clone().try_into_model()?)?;

        let saved = model.update(&self.db).await?;
        tracing::debug!(id = saved.id, "updated movie");
        Ok(Some(saved.into()))
    }

    pub async fn delete(&self, id: i32, policy: SeedDeletePolicy) -> AppResult<DeleteOutcome> {
        let Some(existing) = movie::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(DeleteOutcome::NotFound);
        };

        if existing.source == MovieSource::Seed && policy == SeedDeletePolicy::Protect {
            tracing::info!(id, title = %existing.title, "refusing to delete seed movie");
            return Ok(DeleteOutcome::Protected);
        }

        let res = movie::Entity::delete_by_id(id).exec(&self.db).await?;
        if res.rows_affected == 0 {
            return Ok(DeleteOutcome::NotFound);
        }
        tracing::debug!(id, "deleted movie");
        Ok(DeleteOutcome::Deleted)
    }

    pub async fn count(&self) -> AppResult<u64> {
        Ok(movie::Entity::find().count(&self.db).await?)
    }

    /// Inserts the starter list when the collection is empty. Returns how many
    /// records were added.
    pub async fn insert_seed_if_empty(&self) -> AppResult<usize> {
        if self.count().await? > 0 {
            return Ok(0);
        }

        let seeds = seed_movies();
        let total = seeds.len();
        for seed in seeds {
            self.create(seed).await?;
        }
        tracing::info!(count = total, "seeded movie collection");
        Ok(total)
    }

    /// Removes seed records whose title is in `titles`.
    pub async fn purge_seed_titles(&self, titles: &[&str]) -> AppResult<u64> {
        let res = movie::Entity::delete_many()
            .filter(movie::Column::Source.eq(MovieSource::Seed))
            .filter(movie::Column::Title.is_in(titles.iter().copied()))
            .exec(&self.db)
            .await?;
        tracing::info!(deleted = res.rows_affected, "purged legacy seed movies");
        Ok(res.rows_affected)
    }
}

pub const SEED_TITLES: [&str; 4] = ["Inception", "The Dark Knight", "Interstellar", "Parasite"];

fn seed_movies() -> Vec<NewMovie> {
    let seed = |title: &str, rating: f64, genre: &str, description: &str, trailer: &str| NewMovie {
        description: Some(description.to_string()),
        trailer_id: Some(trailer.to_string()),
        source: MovieSource::Seed,
        is_favorite: false,
        ..NewMovie::new(title, rating, genre)
    };

    vec![
        seed(
            "Inception",
            9.0,
            "Sci-Fi",
            "A thief who steals corporate secrets through the use of dream-sharing technology.",
            "YoHD9XEInc0",
        ),
        seed(
            "The Dark Knight",
            10.0,
            "Action",
            "When the menace known as the Joker wreaks havoc and chaos on the people of Gotham.",
            "EXeTwQWrcwY",
        ),
        seed(
            "Interstellar",
            8.5,
            "Sci-Fi",
            "A team of explorers travel through a wormhole in space in an attempt to ensure humanity's survival.",
            "zSWdZVtXT7E",
        ),
        seed(
            "Parasite",
            9.5,
            "Drama",
            "Greed and class discrimination threaten the newly formed symbiotic relationship between the wealthy Park family and the destitute Kim clan.",
            "5xH0HfJHsaY",
        ),
    ]
}

fn matches_search(row: &movie::Model, needle: &str) -> bool {
    row.title.to_lowercase().contains(needle)
        || row.description.as_deref().is_some_and(|d| d.to_lowercase().contains(needle))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn now_ms() -> i64 {
    jiff::Timestamp::now().as_millisecond()
}
