use std::net::SocketAddr;

use anyhow::Context;

use crate::store::SeedDeletePolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub require_auth: bool,
    pub seed_delete_policy: SeedDeletePolicy,
    pub seed_on_empty: bool,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub tmdb_image_base: String,
    pub tmdb_rps: u32,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3001".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://movieshelf.db?mode=rwc".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();
        let jwt_secret = if jwt_secret.trim().is_empty() {
            tracing::warn!("JWT_SECRET not set, using an insecure development secret");
            "movieshelf-dev-secret".to_string()
        } else {
            jwt_secret
        };

        let token_ttl_hours: i64 =
            std::env::var("TOKEN_TTL_HOURS").ok().and_then(|s| s.parse().ok()).unwrap_or(720);

        let require_auth = env_flag("REQUIRE_AUTH", false);
        let seed_on_empty = env_flag("SEED_ON_EMPTY", true);

        let seed_delete_policy = match std::env::var("SEED_DELETE_POLICY") {
            Ok(s) => s.parse().context("SEED_DELETE_POLICY")?,
            Err(_) => SeedDeletePolicy::default(),
        };

        let tmdb_access_token = std::env::var("TMDB_ACCESS_TOKEN").unwrap_or_default();
        let tmdb_base_url = std::env::var("TMDB_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        let tmdb_image_base = std::env::var("TMDB_IMAGE_BASE")
            .unwrap_or_else(|_| "https://image.tmdb.org/t/p/w500".to_string());
        let tmdb_rps: u32 =
            std::env::var("TMDB_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(4);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|s| parse_list(&s))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:5174".to_string(),
                    "http://localhost:3000".to_string(),
                ]
            });

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            jwt_secret,
            token_ttl_hours,
            require_auth,
            seed_delete_policy,
            seed_on_empty,
            tmdb_access_token,
            tmdb_base_url,
            tmdb_image_base,
            tmdb_rps,
            cors_origins,
        })
    }

    /// Defaults for tests: in-memory database, auth optional, seeds protected.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
            require_auth: false,
            seed_delete_policy: SeedDeletePolicy::Protect,
            seed_on_empty: false,
            tmdb_access_token: String::new(),
            tmdb_base_url: "https://api.themoviedb.org/3".to_string(),
            tmdb_image_base: "https://image.tmdb.org/t/p/w500".to_string(),
            tmdb_rps: 4,
            cors_origins: Vec::new(),
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|s| parse_flag(&s)).unwrap_or(default)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn origin_list_skips_blanks() {
        assert_eq!(
            parse_list("http://a.test, ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
