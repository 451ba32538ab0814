//! Route composition.

pub mod auth;
pub mod invites;
pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod users;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/users/me", get(users::me))
        .route(
            "/users/me/connections",
            get(users::my_connections).post(users::connect),
        )
        .route("/users/me/subscriptions", get(users::my_subscriptions))
        .route("/payments/register-method", post(payments::register_method))
        .route("/plans", post(plans::create_plan).get(plans::my_plans))
        .route(
            "/plans/{uuid}",
            get(plans::get_plan)
                .patch(plans::edit_plan)
                .delete(plans::delete_plan),
        )
        .route("/plans/{uuid}/members", get(plans::plan_members))
        .route(
            "/plans/{uuid}/invites",
            post(invites::create_invite).get(invites::plan_invites),
        )
        .route(
            "/plans/{uuid}/subscription",
            delete(subscriptions::unsubscribe),
        )
        .route(
            "/invites/{code}",
            get(invites::get_invite).delete(invites::cancel_invite),
        )
        .route("/subscriptions", post(subscriptions::subscribe))
        .route(
            "/subscriptions/{uuid}/status",
            post(subscriptions::set_status),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
