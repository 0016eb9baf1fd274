//! Field rules shared by the create and update paths.
//!
//! Validators only inspect the payload. Trimming happens when the caller turns
//! the payload into a [`NewMovie`](crate::models::NewMovie) or
//! [`MoviePatch`](crate::models::MoviePatch).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    entities::movie,
    models::{ExternalIdInput, MovieInput, MovieSource, RatingInput},
};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 200;
pub const GENRE_MIN: usize = 2;
pub const GENRE_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 2000;
pub const POSTER_PATH_MAX: usize = 500;
pub const TRAILER_ID_MAX: usize = 50;
pub const OPINION_MAX: usize = 1000;
pub const RATING_MIN: f64 = 1.0;
pub const RATING_MAX: f64 = 10.0;

/// Field name to message. Serializes as a plain JSON object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_movie(movie: &MovieInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    match &movie.title {
        Some(title) => check_title(title, &mut errors),
        None => errors.add("title", "Title is required"),
    }
    match &movie.rating {
        Some(rating) => check_rating(rating, &mut errors),
        None => errors.add("rating", "Rating is required"),
    }
    match &movie.genre {
        Some(genre) => check_genre(genre, &mut errors),
        None => errors.add("genre", "Genre is required"),
    }
    check_optional_fields(movie, &mut errors);

    errors.into_result()
}

pub fn validate_movie_update(movie: &MovieInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if let Some(title) = &movie.title {
        check_title(title, &mut errors);
    }
    if let Some(rating) = &movie.rating {
        check_rating(rating, &mut errors);
    }
    if let Some(genre) = &movie.genre {
        check_genre(genre, &mut errors);
    }
    check_optional_fields(movie, &mut errors);

    errors.into_result()
}

/// Checks a fully merged record right before it is written.
pub fn validate_record(record: &movie::Model) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_title(&record.title, &mut errors);
    check_rating_value(record.rating, &mut errors);
    check_genre(&record.genre, &mut errors);

    let optional = [
        ("description", &record.description, DESCRIPTION_MAX, "Description must be less than 2000 characters"),
        ("posterPath", &record.poster_path, POSTER_PATH_MAX, "Poster path must be less than 500 characters"),
        ("trailerId", &record.trailer_id, TRAILER_ID_MAX, "Trailer ID must be less than 50 characters"),
        (
            "personalOpinion",
            &record.personal_opinion,
            OPINION_MAX,
            "Personal opinion must be less than 1000 characters",
        ),
    ];
    for (field, value, max, message) in optional {
        check_max(field, Some(value), max, message, &mut errors);
    }

    if record.external_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        errors.add("externalId", "External ID must not be empty");
    }

    errors.into_result()
}

fn check_title(title: &str, errors: &mut ValidationErrors) {
    let len = trimmed_len(title);
    if len < TITLE_MIN {
        errors.add("title", format!("Title must be at least {TITLE_MIN} characters long"));
    } else if len > TITLE_MAX {
        errors.add("title", format!("Title must be less than {TITLE_MAX} characters"));
    }
}

fn check_genre(genre: &str, errors: &mut ValidationErrors) {
    let len = trimmed_len(genre);
    if len < GENRE_MIN {
        errors.add("genre", format!("Genre must be at least {GENRE_MIN} characters long"));
    } else if len > GENRE_MAX {
        errors.add("genre", format!("Genre must be less than {GENRE_MAX} characters"));
    }
}

fn check_rating(rating: &RatingInput, errors: &mut ValidationErrors) {
    match rating.value() {
        None => errors.add("rating", "Rating must be a number"),
        Some(r) => check_rating_value(r, errors),
    }
}

fn check_rating_value(rating: f64, errors: &mut ValidationErrors) {
    if rating.is_nan() {
        errors.add("rating", "Rating must be a number");
    } else if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        errors.add("rating", "Rating must be between 1 and 10");
    }
}

fn check_optional_fields(movie: &MovieInput, errors: &mut ValidationErrors) {
    check_max(
        "description",
        movie.description.as_ref(),
        DESCRIPTION_MAX,
        "Description must be less than 2000 characters",
        errors,
    );
    check_max(
        "posterPath",
        movie.poster_path.as_ref(),
        POSTER_PATH_MAX,
        "Poster path must be less than 500 characters",
        errors,
    );
    check_max(
        "trailerId",
        movie.trailer_id.as_ref(),
        TRAILER_ID_MAX,
        "Trailer ID must be less than 50 characters",
        errors,
    );
    check_max(
        "personalOpinion",
        movie.personal_opinion.as_ref(),
        OPINION_MAX,
        "Personal opinion must be less than 1000 characters",
        errors,
    );

    if let Some(Some(ExternalIdInput::Text(id))) = &movie.external_id {
        if id.trim().is_empty() {
            errors.add("externalId", "External ID must not be empty");
        }
    }

    if let Some(source) = &movie.source {
        if MovieSource::parse(source).is_none() {
            errors.add("source", "Source must be one of seed, user, tmdb");
        }
    }
}

fn check_max(
    field: &'static str,
    value: Option<&Option<String>>,
    max: usize,
    message: &str,
    errors: &mut ValidationErrors,
) {
    if let Some(Some(value)) = value {
        if trimmed_len(value) > max {
            errors.add(field, message);
        }
    }
}

fn trimmed_len(s: &str) -> usize {
    s.trim().chars().count()
}
