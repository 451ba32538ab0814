use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Access level tag granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_level", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    Admin,
}

/// A person's canonical identity. Created on first successful OAuth login,
/// linked to exactly one Discord account and optionally a Stripe customer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub uuid: Uuid,
    pub discord_id: String,
    pub email: String,
    pub access_level: Option<AccessLevel>,
    /// Set once a payment source has been registered with the provider.
    pub stripe_customer_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn new(discord_id: impl Into<String>, email: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uuid: Uuid::new_v4(),
            discord_id: discord_id.into(),
            email: email.into(),
            access_level: None,
            stripe_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the user has a payment method configured with the provider.
    pub fn has_payment_method(&self) -> bool {
        self.stripe_customer_id.is_some()
    }
}
