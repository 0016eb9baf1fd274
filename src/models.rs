use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    entities::{movie, user},
    validation::{self, ValidationErrors},
};

pub use crate::entities::movie::MovieSource;

/// A movie as served by the API and held in client caches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i32,
    pub title: String,
    pub rating: f64,
    pub genre: String,
    pub description: Option<String>,
    pub poster_path: Option<String>,
    pub external_id: Option<String>,
    pub trailer_id: Option<String>,
    pub source: MovieSource,
    pub personal_opinion: Option<String>,
    pub is_favorite: bool,
    pub year: Option<String>,
    pub user_id: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<movie::Model> for Movie {
    fn from(m: movie::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            rating: m.rating,
            genre: m.genre,
            description: m.description,
            poster_path: m.poster_path,
            external_id: m.external_id,
            trailer_id: m.trailer_id,
            source: m.source,
            personal_opinion: m.personal_opinion,
            is_favorite: m.is_favorite,
            year: m.year,
            user_id: m.user_id,
            created_at: from_millis(m.created_at),
            updated_at: from_millis(m.updated_at),
        }
    }
}

fn from_millis(ms: i64) -> Timestamp {
    Timestamp::from_millisecond(ms).unwrap_or(Timestamp::UNIX_EPOCH)
}

/// Ratings arrive either as JSON numbers or as numeric strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingInput {
    Number(f64),
    Text(String),
}

impl RatingInput {
    pub fn value(&self) -> Option<f64> {
        match self {
            RatingInput::Number(n) => n.is_finite().then_some(*n),
            RatingInput::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalIdInput {
    Text(String),
    Number(i64),
}

impl ExternalIdInput {
    pub fn into_string(self) -> String {
        match self {
            ExternalIdInput::Text(s) => s,
            ExternalIdInput::Number(n) => n.to_string(),
        }
    }
}

/// Raw movie payload for both create and update requests.
///
/// Nullable fields use `Option<Option<_>>`: the outer layer records whether the
/// key was sent at all, the inner one whether it was `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub poster_path: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub external_id: Option<Option<ExternalIdInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub trailer_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub personal_opinion: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub year: Option<Option<String>>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// A validated, trimmed movie ready to be inserted.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMovie {
    pub title: String,
    pub rating: f64,
    pub genre: String,
    pub description: Option<String>,
    pub poster_path: Option<String>,
    pub external_id: Option<String>,
    pub trailer_id: Option<String>,
    pub source: MovieSource,
    pub personal_opinion: Option<String>,
    pub is_favorite: bool,
    pub year: Option<String>,
    #[serde(skip)]
    pub user_id: Option<i32>,
}

impl NewMovie {
    pub fn new(title: &str, rating: f64, genre: &str) -> Self {
        Self {
            title: title.to_string(),
            rating,
            genre: genre.to_string(),
            description: None,
            poster_path: None,
            external_id: None,
            trailer_id: None,
            source: MovieSource::User,
            personal_opinion: None,
            is_favorite: true,
            year: None,
            user_id: None,
        }
    }

    pub fn try_from_input(input: MovieInput, user_id: Option<i32>) -> Result<Self, ValidationErrors> {
        validation::validate_movie(&input)?;

        let source = input.source.as_deref().and_then(MovieSource::parse).unwrap_or_default();

        Ok(Self {
            title: input.title.unwrap_or_default().trim().to_string(),
            rating: input.rating.as_ref().and_then(RatingInput::value).unwrap_or_default(),
            genre: input.genre.unwrap_or_default().trim().to_string(),
            description: trimmed(input.description.flatten()),
            poster_path: trimmed(input.poster_path.flatten()),
            external_id: trimmed(input.external_id.flatten().map(ExternalIdInput::into_string)),
            trailer_id: trimmed(input.trailer_id.flatten()),
            source,
            personal_opinion: trimmed(input.personal_opinion.flatten()),
            is_favorite: input.is_favorite.unwrap_or(true),
            year: trimmed(input.year.flatten()),
            user_id,
        })
    }
}

/// Partial update: `None` leaves a column untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoviePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailer_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<MovieSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_opinion: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Option<String>>,
}

impl MoviePatch {
    pub fn favorite(is_favorite: bool) -> Self {
        Self { is_favorite: Some(is_favorite), ..Default::default() }
    }

    pub fn opinion(text: Option<String>) -> Self {
        Self { personal_opinion: Some(text), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn try_from_input(input: MovieInput) -> Result<Self, ValidationErrors> {
        validation::validate_movie_update(&input)?;

        Ok(Self {
            title: input.title.map(|s| s.trim().to_string()),
            rating: input.rating.as_ref().and_then(RatingInput::value),
            genre: input.genre.map(|s| s.trim().to_string()),
            description: input.description.map(trimmed),
            poster_path: input.poster_path.map(trimmed),
            external_id: input.external_id.map(|v| trimmed(v.map(ExternalIdInput::into_string))),
            trailer_id: input.trailer_id.map(trimmed),
            source: input.source.as_deref().and_then(MovieSource::parse),
            personal_opinion: input.personal_opinion.map(trimmed),
            is_favorite: input.is_favorite,
            year: input.year.map(trimmed),
        })
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    })
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFilters {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub source: Option<String>,
    pub user_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl From<user::Model> for UserView {
    fn from(u: user::Model) -> Self {
        Self { id: u.id, name: u.name, email: u.email, created_at: from_millis(u.created_at) }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}
