//! Invite routes.

use axum::extract::{Path, State};
use axum::Json;
use famshare_shared::{Invite, User};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_INVITE_TTL: Duration = Duration::days(7);

#[derive(Deserialize)]
pub struct CreateInviteRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

pub async fn create_invite(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(plan_uuid): Path<Uuid>,
    Json(request): Json<CreateInviteRequest>,
) -> ApiResult<Json<Invite>> {
    let expires_at = request
        .expires_at
        .unwrap_or_else(|| OffsetDateTime::now_utc() + DEFAULT_INVITE_TTL);

    let invite = state
        .billing
        .plans
        .create_invite(current.user.uuid, plan_uuid, expires_at)
        .await?;

    Ok(Json(invite))
}

pub async fn plan_invites(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(plan_uuid): Path<Uuid>,
) -> ApiResult<Json<Vec<Invite>>> {
    let invites = state.billing.plans.invites_of(plan_uuid).await?;

    Ok(Json(invites))
}

#[derive(Serialize)]
pub struct InviteResponse {
    #[serde(flatten)]
    pub invite: Invite,
    /// The user who consumed the invite, if anyone has.
    pub redeemer: Option<User>,
}

pub async fn get_invite(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(code): Path<String>,
) -> ApiResult<Json<InviteResponse>> {
    let invite = state.billing.invites.get_by_short_code(&code).await?;
    let redeemer = state.billing.invites.redeemer_of(&invite).await?;

    Ok(Json(InviteResponse { invite, redeemer }))
}

pub async fn cancel_invite(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(code): Path<String>,
) -> ApiResult<Json<Invite>> {
    let invite = state.billing.invites.get_by_short_code(&code).await?;
    let cancelled = state
        .billing
        .invites
        .cancel(current.user.uuid, &invite)
        .await?;

    Ok(Json(cancelled))
}
