use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle of a plan membership.
///
/// `Joined`, `Active`, and `Late` are paying states; the rest are terminal.
/// `Cancelled` is only reachable through the cancel flow, never by a direct
/// status overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    /// Reserved pre-join state. No flow currently assigns it; redemption
    /// creates subscriptions as `Joined` directly.
    Invited,
    Joined,
    Active,
    Late,
    Expired,
    Exempted,
    Cancelled,
}

impl SubscriptionStatus {
    /// Whether this status counts toward membership and pricing.
    pub fn is_paying(self) -> bool {
        matches!(self, Self::Joined | Self::Active | Self::Late)
    }
}

/// The join record between a user and a plan, created from exactly one
/// invite and mirrored to a remote provider subscription.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub uuid: Uuid,
    pub status: SubscriptionStatus,
    /// Remote provider subscription id, set once registration succeeds.
    pub stripe_id: Option<String>,
    pub plan_uuid: Uuid,
    pub user_uuid: Uuid,
    pub invite_uuid: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Subscription {
    pub fn new(plan_uuid: Uuid, user_uuid: Uuid, invite_uuid: Uuid) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uuid: Uuid::new_v4(),
            status: SubscriptionStatus::Joined,
            stripe_id: None,
            plan_uuid,
            user_uuid,
            invite_uuid,
            created_at: now,
            updated_at: now,
        }
    }

    /// True iff the member is expected to pay on the next billing day.
    pub fn should_pay(&self) -> bool {
        self.status.is_paying()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paying_statuses() {
        let paying = [
            SubscriptionStatus::Joined,
            SubscriptionStatus::Active,
            SubscriptionStatus::Late,
        ];
        let non_paying = [
            SubscriptionStatus::Invited,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Exempted,
            SubscriptionStatus::Cancelled,
        ];

        for status in paying {
            assert!(status.is_paying(), "{status:?} should pay");
        }
        for status in non_paying {
            assert!(!status.is_paying(), "{status:?} should not pay");
        }
    }

    #[test]
    fn should_pay_follows_status() {
        let mut subscription =
            Subscription::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert!(subscription.should_pay());

        subscription.status = SubscriptionStatus::Cancelled;
        assert!(!subscription.should_pay());
    }
}
