//! Subscription routes.

use axum::extract::{Path, State};
use axum::Json;
use famshare_billing::BillingError;
use famshare_shared::{AccessLevel, Subscription, SubscriptionStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubscribeRequest {
    /// Short code from an invite.
    pub code: String,
}

/// Redeem an invite code, joining its plan.
pub async fn subscribe(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<Json<Subscription>> {
    let invite = state.billing.invites.get_by_short_code(&request.code).await?;
    let plan = state.billing.plans.get(invite.plan_uuid).await?;

    let subscription = state
        .billing
        .subscriptions
        .subscribe_user(&plan, &current.user, &invite)
        .await?;

    Ok(Json(subscription))
}

/// Cancel the caller's own membership of a plan.
pub async fn unsubscribe(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(plan_uuid): Path<Uuid>,
) -> ApiResult<Json<Subscription>> {
    let subscription = state
        .billing
        .subscriptions
        .unsubscribe(current.user.uuid, plan_uuid)
        .await?;

    Ok(Json(subscription))
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: SubscriptionStatus,
}

/// Administrative status overwrite, driven by the external billing
/// collaborator (webhook/cron) that watches payment outcomes.
pub async fn set_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(uuid): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<Json<Subscription>> {
    if current.user.access_level != Some(AccessLevel::Admin) {
        return Err(BillingError::Forbidden.into());
    }

    let subscription = state.billing.subscriptions.get(uuid).await?;
    let updated = state
        .billing
        .subscriptions
        .set_status(&subscription, request.status)
        .await?;

    Ok(Json(updated))
}
