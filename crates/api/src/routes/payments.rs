//! Payment method registration.

use axum::extract::State;
use axum::Json;
use famshare_shared::User;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterMethodRequest {
    /// Tokenized payment source from the provider's client-side SDK.
    pub token: String,
}

pub async fn register_method(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<RegisterMethodRequest>,
) -> ApiResult<Json<User>> {
    if request.token.is_empty() {
        return Err(ApiError::BadRequest("invalid token received".to_string()));
    }

    let user = state
        .billing
        .users
        .attach_payment_method(&current.user, &request.token)
        .await?;

    Ok(Json(user))
}
