//! Plan routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use famshare_shared::{Plan, User};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Default service fee applied when a plan is created without one.
const DEFAULT_FEE_BASIS_POINTS: i32 = 10_00;

#[derive(Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    /// Total cost in minor currency units.
    pub amount: i64,
    /// 1-indexed day in month payments are done.
    pub payment_day: i16,
    pub fee_basis_points: Option<i32>,
}

#[derive(Serialize)]
pub struct PlanResponse {
    #[serde(flatten)]
    pub plan: Plan,
    /// The date the next payment will be attempted.
    pub next_payment_date: String,
    /// Amount each payer owes at the current member count.
    pub member_amount: i64,
    pub member_count: usize,
}

async fn plan_response(state: &AppState, plan: Plan) -> ApiResult<PlanResponse> {
    let members = state.billing.plans.members(plan.uuid).await?;
    let member_amount = plan.payment_amount(members.len() as u32);
    let next_payment_date = plan
        .next_payment_date(OffsetDateTime::now_utc())
        .format(&Rfc3339)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    Ok(PlanResponse {
        plan,
        next_payment_date,
        member_amount,
        member_count: members.len(),
    })
}

pub async fn create_plan(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CreatePlanRequest>,
) -> ApiResult<Json<PlanResponse>> {
    if request.amount <= 0 {
        return Err(ApiError::BadRequest(
            "amount must be positive".to_string(),
        ));
    }
    if !(1..=31).contains(&request.payment_day) {
        return Err(ApiError::BadRequest(
            "payment_day must be between 1 and 31".to_string(),
        ));
    }

    let fee_basis_points = request.fee_basis_points.unwrap_or(DEFAULT_FEE_BASIS_POINTS);
    if fee_basis_points < 0 {
        return Err(ApiError::BadRequest(
            "fee_basis_points must not be negative".to_string(),
        ));
    }

    let plan = state
        .billing
        .plans
        .create(
            &current.user,
            &request.name,
            request.amount,
            fee_basis_points,
            request.payment_day,
        )
        .await?;

    let response = plan_response(&state, plan).await?;

    Ok(Json(response))
}

pub async fn my_plans(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<Plan>>> {
    let plans = state.billing.plans.plans_of(current.user.uuid).await?;

    Ok(Json(plans))
}

pub async fn get_plan(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(uuid): Path<Uuid>,
) -> ApiResult<Json<PlanResponse>> {
    let plan = state.billing.plans.get(uuid).await?;
    let response = plan_response(&state, plan).await?;

    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct EditPlanRequest {
    pub name: Option<String>,
}

pub async fn edit_plan(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(uuid): Path<Uuid>,
    Json(request): Json<EditPlanRequest>,
) -> ApiResult<Json<Plan>> {
    let plan = match request.name {
        Some(name) if !name.is_empty() => {
            state
                .billing
                .plans
                .rename(current.user.uuid, uuid, &name)
                .await?
        }
        _ => state.billing.plans.get(uuid).await?,
    };

    Ok(Json(plan))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(uuid): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.billing.plans.delete(current.user.uuid, uuid).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn plan_members(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(uuid): Path<Uuid>,
) -> ApiResult<Json<Vec<User>>> {
    let members = state.billing.plans.members(uuid).await?;

    Ok(Json(members))
}
