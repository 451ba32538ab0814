//! HTTP error mapping.
//!
//! Billing errors keep their messages; anything internal is logged and
//! collapsed into an opaque 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use famshare_billing::BillingError;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("you need to be logged in to access this resource")]
    Unauthorized,

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Billing(BillingError::Database(err))
    }
}

fn billing_status(err: &BillingError) -> StatusCode {
    match err {
        BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
        BillingError::Forbidden => StatusCode::FORBIDDEN,
        BillingError::OwnerOfPlanSubscribe
        | BillingError::InviteAlreadyUsed
        | BillingError::InviteCancelled
        | BillingError::InviteExpired
        | BillingError::AlreadySubscribed
        | BillingError::NotSubscribed
        | BillingError::InvalidStatusChange => StatusCode::CONFLICT,
        BillingError::PaymentNotConfigured => StatusCode::BAD_REQUEST,
        BillingError::ProviderRegistrationFailed(_)
        | BillingError::ProviderUpdateFailed { .. } => StatusCode::BAD_GATEWAY,
        BillingError::ShortCodeSpaceExhausted
        | BillingError::Config(_)
        | BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Billing(err) => billing_status(err),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
