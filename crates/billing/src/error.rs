//! Billing error taxonomy.
//!
//! Validation errors are detected before any mutation and surface unchanged;
//! provider errors abort the enclosing operation and are never swallowed.

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

/// Remote pricing state after a failed provider update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingState {
    /// The previous price is still registered; nothing changed remotely.
    Unchanged,
    /// The new price could not be registered but the previous one was
    /// restored.
    Restored,
    /// Neither the new nor the previous price is registered. The plan has no
    /// remote price until an operator intervenes.
    Undefined,
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("could not find {entity}:{id}")]
    NotFound { entity: &'static str, id: String },

    #[error("the owner of a plan cannot subscribe to it")]
    OwnerOfPlanSubscribe,

    #[error("this invite has already been used")]
    InviteAlreadyUsed,

    #[error("this invite has been cancelled")]
    InviteCancelled,

    #[error("this invite has expired")]
    InviteExpired,

    #[error("you need to be the owner of the plan to do this")]
    Forbidden,

    #[error("user is already subscribed to this plan")]
    AlreadySubscribed,

    #[error("user is not subscribed to this plan")]
    NotSubscribed,

    #[error("user has no payment method configured")]
    PaymentNotConfigured,

    #[error("payment provider registration failed: {0}")]
    ProviderRegistrationFailed(String),

    #[error("payment provider update failed (pricing {pricing:?}): {detail}")]
    ProviderUpdateFailed {
        detail: String,
        pricing: PricingState,
    },

    #[error("exhausted attempts to generate a unique invite code")]
    ShortCodeSpaceExhausted,

    #[error("subscriptions can only reach CANCELLED through the cancel flow")]
    InvalidStatusChange,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BillingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
