//! Current-user reads and external account linking.

use axum::extract::State;
use axum::Json;
use famshare_billing::ConnectionProfile;
use famshare_shared::{Connection, Subscription, User};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

pub async fn my_connections(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<Connection>>> {
    let connections = state
        .billing
        .users
        .connections_of(current.user.uuid)
        .await?;

    Ok(Json(connections))
}

/// Link an external account. The profile data comes back from the OAuth
/// collaborator after the user completes the provider's consent flow.
pub async fn connect(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(profile): Json<ConnectionProfile>,
) -> ApiResult<Json<Connection>> {
    let connection = state
        .billing
        .connections
        .connect(&current.user, profile)
        .await?;

    Ok(Json(connection))
}

pub async fn my_subscriptions(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<Subscription>>> {
    let subscriptions = state
        .billing
        .users
        .subscriptions_of(current.user.uuid)
        .await?;

    Ok(Json(subscriptions))
}
