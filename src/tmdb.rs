use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult,
    models::{MovieSource, NewMovie},
    validation::GENRE_MAX,
};

const GENRES: &[(i32, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Sci-Fi"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

pub fn genre_name(id: i32) -> Option<&'static str> {
    GENRES.iter().find(|(gid, _)| *gid == id).map(|(_, name)| *name)
}

/// Comma-separated names for the known ids, or "Movie" when none are known.
/// Names that would push the result past the stored genre limit are dropped.
pub fn genre_names(ids: &[i32]) -> String {
    let mut joined = String::new();
    for name in ids.iter().filter_map(|id| genre_name(*id)) {
        let extra = if joined.is_empty() { name.len() } else { name.len() + 2 };
        if joined.len() + extra > GENRE_MAX {
            break;
        }
        if !joined.is_empty() {
            joined.push_str(", ");
        }
        joined.push_str(name);
    }
    if joined.is_empty() { "Movie".to_string() } else { joined }
}

/// A listing entry from the external movie database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalMovie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl ExternalMovie {
    /// The shape saved when an external title is favorited.
    pub fn to_new_movie(&self, image_base: &str) -> NewMovie {
        let year = self
            .release_date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .filter(|y| !y.is_empty())
            .map(str::to_string);

        NewMovie {
            description: self.overview.clone().filter(|s| !s.trim().is_empty()),
            poster_path: self
                .poster_path
                .as_deref()
                .map(|p| format!("{}{}", image_base.trim_end_matches('/'), p)),
            external_id: Some(self.id.to_string()),
            source: MovieSource::Tmdb,
            is_favorite: true,
            year,
            ..NewMovie::new(&self.title, self.vote_average.round().clamp(1.0, 10.0), &genre_names(&self.genre_ids))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listing {
    Trending,
    NowPlaying,
    Popular,
}

impl Listing {
    fn path(self) -> &'static str {
        match self {
            Listing::Trending => "trending/movie/day",
            Listing::NowPlaying => "movie/now_playing",
            Listing::Popular => "movie/popular",
        }
    }
}

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, access_token: String, base_url: String, rps: u32) -> Self {
        if access_token.trim().is_empty() {
            tracing::warn!("Using mock TMDB data - no TMDB_ACCESS_TOKEN provided");
        }

        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN),
        )));
        Self { client, access_token, base_url, limiter }
    }

    fn is_mock(&self) -> bool {
        self.access_token.trim().is_empty()
    }

    pub async fn listing(&self, listing: Listing) -> AppResult<Vec<ExternalMovie>> {
        if self.is_mock() {
            return Ok(mock_movies());
        }
        self.fetch(listing.path(), &[("page", "1")]).await
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<ExternalMovie>> {
        let query = query.trim();
        if query.is_empty() {
            return self.listing(Listing::Popular).await;
        }
        if self.is_mock() {
            let needle = query.to_lowercase();
            return Ok(mock_movies()
                .into_iter()
                .filter(|m| m.title.to_lowercase().contains(&needle))
                .collect());
        }
        self.fetch("search/movie", &[("query", query)]).await
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> AppResult<Vec<ExternalMovie>> {
        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        tracing::debug!(%url, "fetching TMDB listing");

        let resp: ListingResponse = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.results)
    }
}

fn mock_movies() -> Vec<ExternalMovie> {
    let mock = |id: i64, title: &str, vote: f64, genres: &[i32], date: &str| ExternalMovie {
        id,
        title: title.to_string(),
        overview: Some(format!("Mock listing for {title}")),
        poster_path: None,
        vote_average: vote,
        genre_ids: genres.to_vec(),
        release_date: Some(date.to_string()),
    };

    vec![
        mock(329865, "Arrival", 7.6, &[18, 878, 9648], "2016-11-10"),
        mock(550, "Fight Club", 8.4, &[18], "1999-10-15"),
        mock(27205, "Inception", 8.4, &[28, 878, 12], "2010-07-15"),
    ]
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    results: Vec<ExternalMovie>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_lookup() {
        assert_eq!(genre_names(&[878, 18]), "Sci-Fi, Drama");
        assert_eq!(genre_names(&[1, 878]), "Sci-Fi");
        assert_eq!(genre_names(&[]), "Movie");
        assert_eq!(genre_name(12345), None);
    }

    #[test]
    fn long_genre_lists_fit_the_stored_limit() {
        let names = genre_names(&[28, 12, 16, 35, 80, 99, 18]);
        assert_eq!(names, "Action, Adventure, Animation, Comedy, Crime");
        assert!(names.len() <= GENRE_MAX);
    }

    #[test]
    fn external_movie_maps_into_new_movie() {
        let ext = ExternalMovie {
            id: 329865,
            title: "Arrival".into(),
            overview: Some("Linguist meets heptapods.".into()),
            poster_path: Some("/x2FJsf1ElAgr63Y3PNPtJrcmpoe.jpg".into()),
            vote_average: 7.6,
            genre_ids: vec![18, 878],
            release_date: Some("2016-11-10".into()),
        };

        let movie = ext.to_new_movie("https://image.tmdb.org/t/p/w500/");
        assert_eq!(movie.title, "Arrival");
        assert_eq!(movie.rating, 8.0);
        assert_eq!(movie.genre, "Drama, Sci-Fi");
        assert_eq!(
            movie.poster_path.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/x2FJsf1ElAgr63Y3PNPtJrcmpoe.jpg")
        );
        assert_eq!(movie.external_id.as_deref(), Some("329865"));
        assert_eq!(movie.source, MovieSource::Tmdb);
        assert!(movie.is_favorite);
        assert_eq!(movie.year.as_deref(), Some("2016"));
    }

    #[test]
    fn unrated_titles_clamp_to_minimum() {
        let ext = ExternalMovie {
            id: 1,
            title: "Obscure".into(),
            overview: None,
            poster_path: None,
            vote_average: 0.0,
            genre_ids: vec![],
            release_date: Some(String::new()),
        };
        let movie = ext.to_new_movie("https://image.tmdb.org/t/p/w500");
        assert_eq!(movie.rating, 1.0);
        assert_eq!(movie.genre, "Movie");
        assert_eq!(movie.year, None);
        assert_eq!(movie.poster_path, None);
    }

    #[tokio::test]
    async fn mock_mode_filters_search() {
        let client = TmdbClient::new(reqwest::Client::new(), String::new(), String::new(), 4);
        assert_eq!(client.listing(Listing::Trending).await.unwrap().len(), 3);

        let found = client.search("arriv").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 329865);
    }
}
