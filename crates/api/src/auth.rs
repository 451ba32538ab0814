//! Session management and the authenticated-user extractor.
//!
//! Sessions live in the `sessions` table; the session uuid doubles as the
//! opaque bearer token. Expired or unknown tokens are treated as anonymous,
//! so protected routes answer 401 via the extractor.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use famshare_shared::{Session, User};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Persist a fresh session for a user.
pub async fn create_session(pool: &PgPool, user_uuid: Uuid) -> ApiResult<Session> {
    let session = Session::new(user_uuid);

    sqlx::query(
        r#"
        INSERT INTO sessions (uuid, user_uuid, expires_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(session.uuid)
    .bind(session.user_uuid)
    .bind(session.expires_at)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await?;

    Ok(session)
}

/// Remove a session. Logging out an already-removed session is a no-op.
pub async fn delete_session(pool: &PgPool, session_uuid: Uuid) -> ApiResult<()> {
    sqlx::query("DELETE FROM sessions WHERE uuid = $1")
        .bind(session_uuid)
        .execute(pool)
        .await?;

    Ok(())
}

async fn find_valid_session(pool: &PgPool, session_uuid: Uuid) -> ApiResult<Option<Session>> {
    let session: Option<Session> = sqlx::query_as("SELECT * FROM sessions WHERE uuid = $1")
        .bind(session_uuid)
        .fetch_optional(pool)
        .await?;

    Ok(session.filter(|s| !s.is_expired(OffsetDateTime::now_utc())))
}

/// Bearer token taken from the `Authorization` header.
pub struct SessionToken(pub Uuid);

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let uuid = Uuid::parse_str(token.trim()).map_err(|_| ApiError::Unauthorized)?;

        Ok(Self(uuid))
    }
}

/// The authenticated user for the current request.
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionToken(session_uuid) = SessionToken::from_request_parts(parts, state).await?;

        let session = find_valid_session(&state.pool, session_uuid)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let user = state
            .billing
            .users
            .find(session.user_uuid)
            .await
            .map_err(ApiError::Billing)?
            .ok_or(ApiError::Unauthorized)?;

        Ok(Self { user, session })
    }
}
