// Billing crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Famshare billing core.
//!
//! The plan/subscription/invite lifecycle and the payment-splitting engine:
//!
//! - **Invite engine**: unique short codes, single-use consumption,
//!   cancellation
//! - **Plan engine**: cost splitting, payment-date arithmetic, remote
//!   Product/Plan registration, membership-driven repricing
//! - **Subscription engine**: redeem flow, status transitions, cancellation
//! - **Identity & connections**: OAuth-backed users and provider links
//! - **Invariants**: runnable consistency checks over the billing tables

pub mod connections;
pub mod error;
pub mod invariants;
pub mod invites;
pub mod pg_store;
pub mod plans;
pub mod provider;
pub mod store;
pub mod stripe_gateway;
pub mod subscriptions;
pub mod users;

#[cfg(test)]
mod edge_case_tests;

// Connections
pub use connections::{ConnectionProfile, ConnectionService};

// Error
pub use error::{BillingError, BillingResult, PricingState};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Invites
pub use invites::InviteService;

// Plans
pub use plans::{MemberChange, PlanService, Repricing};

// Provider
pub use provider::PaymentProvider;
pub use stripe_gateway::{StripeConfig, StripeGateway};

// Store
pub use pg_store::PgStore;
pub use store::{ConnectionStore, InviteStore, PlanStore, SubscriptionStore, UserStore};

// Subscriptions
pub use subscriptions::SubscriptionService;

// Users
pub use users::{UserService, VerifiedIdentity};

use std::sync::Arc;

use sqlx::PgPool;

/// Main billing service that combines all billing functionality.
pub struct BillingService {
    pub users: UserService,
    pub connections: ConnectionService,
    pub plans: PlanService,
    pub invites: InviteService,
    pub subscriptions: SubscriptionService,
    pub invariants: InvariantChecker,
}

impl BillingService {
    /// Create a new billing service from environment variables.
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let provider = Arc::new(StripeGateway::from_env()?);

        Ok(Self::with_provider(pool, provider))
    }

    /// Create a new billing service with explicit Stripe config.
    pub fn new(config: StripeConfig, pool: PgPool) -> Self {
        Self::with_provider(pool, Arc::new(StripeGateway::new(config)))
    }

    /// Wire the engines over a shared store and an arbitrary provider.
    pub fn with_provider(pool: PgPool, provider: Arc<dyn PaymentProvider>) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));

        let user_store: Arc<dyn UserStore> = store.clone();
        let plan_store: Arc<dyn PlanStore> = store.clone();
        let invite_store: Arc<dyn InviteStore> = store.clone();
        let subscription_store: Arc<dyn SubscriptionStore> = store.clone();
        let connection_store: Arc<dyn ConnectionStore> = store;

        let invites = InviteService::new(invite_store.clone(), plan_store.clone());
        let plans = PlanService::new(
            plan_store,
            subscription_store.clone(),
            invites.clone(),
            provider.clone(),
        );
        let subscriptions = SubscriptionService::new(
            subscription_store.clone(),
            user_store.clone(),
            invite_store,
            plans.clone(),
            provider.clone(),
        );
        let users = UserService::new(
            user_store,
            connection_store.clone(),
            subscription_store,
            provider,
        );
        let connections = ConnectionService::new(connection_store);

        Self {
            users,
            connections,
            plans,
            invites,
            subscriptions,
            invariants: InvariantChecker::new(pool),
        }
    }
}
