use std::sync::Arc;

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    entities::user,
    error::{AppError, AppResult},
    models::{AuthResponse, LoginRequest, RegisterRequest, UserView},
    validation::ValidationErrors,
};

const PASSWORD_MIN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i32,
    iat: i64,
    exp: i64,
}

/// Issues and checks bearer tokens for accounts in the `users` table.
#[derive(Clone)]
pub struct Auth {
    db: DatabaseConnection,
    secret: String,
    ttl_hours: i64,
}

impl Auth {
    pub fn new(db: DatabaseConnection, secret: String, ttl_hours: i64) -> Self {
        Self { db, secret, ttl_hours }
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<AuthResponse> {
        let name = req.name.trim().to_string();
        let email = req.email.trim().to_lowercase();

        let mut errors = ValidationErrors::default();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }
        if !email.contains('@') || email.len() < 3 {
            errors.add("email", "A valid email is required");
        }
        if req.password.chars().count() < PASSWORD_MIN {
            errors.add("password", format!("Password must be at least {PASSWORD_MIN} characters long"));
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(ValidationErrors::single("email", "Email is already registered").into());
        }

        let model = user::ActiveModel {
            id: Default::default(),
            email: Set(email),
            name: Set(name),
            password_hash: Set(hash_password(&req.password)?),
            created_at: Set(jiff::Timestamp::now().as_millisecond()),
        };
        let saved = model.insert(&self.db).await?;
        tracing::info!(user_id = saved.id, "registered user");

        let token = self.issue_token(saved.id)?;
        Ok(AuthResponse { token, user: saved.into() })
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        let email = req.email.trim().to_lowercase();
        let Some(found) = self.find_by_email(&email).await? else {
            return Err(AppError::Unauthorized("Invalid email or password".into()));
        };
        if !verify_password(&req.password, &found.password_hash) {
            tracing::debug!(user_id = found.id, "password mismatch");
            return Err(AppError::Unauthorized("Invalid email or password".into()));
        }

        let token = self.issue_token(found.id)?;
        Ok(AuthResponse { token, user: found.into() })
    }

    pub fn issue_token(&self, user_id: i32) -> AppResult<String> {
        let now = jiff::Timestamp::now().as_second();
        let claims = Claims { sub: user_id, iat: now, exp: now + self.ttl_hours * 3600 };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| AppError::Internal(anyhow!("token encoding failed: {e}")))
    }

    /// Verifies a token and loads the user it names.
    pub async fn authenticate(&self, token: &str) -> AppResult<UserView> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            AppError::Unauthorized("Not authorized".into())
        })?;

        let found = user::Entity::find_by_id(data.claims.sub).one(&self.db).await?;
        found
            .map(UserView::from)
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find().filter(user::Column::Email.eq(email)).one(&self.db).await?)
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(anyhow!("salt encoding failed: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Rejects the request unless it carries a valid bearer token.
pub struct AuthUser(pub UserView);

/// Accepts anonymous requests, but a token that is present must be valid.
/// With `REQUIRE_AUTH` set it behaves like [`AuthUser`].
pub struct MaybeUser(pub Option<UserView>);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_user(parts, state).await? {
            Some(user) => Ok(AuthUser(user)),
            None => Err(AppError::Unauthorized("Authorization required".into())),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer_user(parts, state).await?;
        if user.is_none() && state.config.require_auth {
            return Err(AppError::Unauthorized("Authorization required".into()));
        }
        Ok(MaybeUser(user))
    }
}

async fn bearer_user(parts: &mut Parts, state: &Arc<AppState>) -> AppResult<Option<UserView>> {
    if !parts.headers.contains_key(axum::http::header::AUTHORIZATION) {
        return Ok(None);
    }
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized("Not authorized".into()))?;

    state.auth.authenticate(bearer.token()).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn auth() -> Auth {
        let db = db::connect_and_migrate("sqlite::memory:").await.unwrap();
        Auth::new(db, "test-secret".into(), 1)
    }

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest { name: "Louise".into(), email: email.into(), password: "heptapod".into() }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[tokio::test]
    async fn register_login_and_authenticate() {
        let auth = auth().await;
        let registered = auth.register(register_req(" Louise@Example.com ")).await.unwrap();
        assert_eq!(registered.user.email, "louise@example.com");

        let me = auth.authenticate(&registered.token).await.unwrap();
        assert_eq!(me, registered.user);

        let login = auth
            .login(LoginRequest { email: "LOUISE@example.com".into(), password: "heptapod".into() })
            .await
            .unwrap();
        assert_eq!(login.user.id, registered.user.id);

        let bad = auth
            .login(LoginRequest { email: "louise@example.com".into(), password: "wrong-one".into() })
            .await;
        assert!(matches!(bad, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_bad_input() {
        let auth = auth().await;
        auth.register(register_req("ian@example.com")).await.unwrap();

        let dup = auth.register(register_req("IAN@example.com")).await;
        match dup {
            Err(AppError::Validation(errors)) => assert!(errors.contains("email")),
            other => panic!("expected validation error, got {other:?}"),
        }

        let bad = auth
            .register(RegisterRequest { name: " ".into(), email: "nope".into(), password: "123".into() })
            .await;
        match bad {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_foreign_and_orphaned_tokens() {
        let auth = auth().await;
        let other = Auth::new(auth.db.clone(), "another-secret".into(), 1);
        let registered = auth.register(register_req("amy@example.com")).await.unwrap();

        let foreign = other.issue_token(registered.user.id).unwrap();
        assert!(matches!(auth.authenticate(&foreign).await, Err(AppError::Unauthorized(_))));

        let orphan = auth.issue_token(9999).unwrap();
        match auth.authenticate(&orphan).await {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "User no longer exists"),
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }
}
