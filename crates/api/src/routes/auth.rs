//! Login and logout.
//!
//! The OAuth exchange itself happens in a separate collaborator; this
//! endpoint only consumes the verified identity it produces.

use axum::extract::State;
use axum::Json;
use famshare_billing::VerifiedIdentity;
use famshare_shared::User;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::auth::{create_session, delete_session, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(identity): Json<VerifiedIdentity>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state.billing.users.login_with_oauth(identity).await?;
    let session = create_session(&state.pool, user.uuid).await?;

    let expires_at = session
        .expires_at
        .format(&Rfc3339)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    Ok(Json(LoginResponse {
        token: session.uuid.to_string(),
        expires_at,
        user,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    delete_session(&state.pool, current.session.uuid).await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
