//! Shared foundation for the famshare workspace: database pool construction,
//! embedded migrations, and the domain entities used by the billing core and
//! the API server.

pub mod db;
pub mod models;

pub use db::{create_pool, run_migrations};
pub use models::{
    AccessLevel, Connection, ConnectionKind, Invite, Plan, Session, Subscription,
    SubscriptionStatus, User,
};
