use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A single-use, time-bounded token permitting one user to join one plan.
///
/// "Consumed" is not stored here: an invite is consumed iff a subscription
/// references it, which keeps a single source of truth for redemption.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Invite {
    pub uuid: Uuid,
    /// Human-enterable code, unique across all invites.
    pub short_code: String,
    pub cancelled: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub plan_uuid: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Invite {
    pub fn new(short_code: impl Into<String>, expires_at: OffsetDateTime, plan_uuid: Uuid) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uuid: Uuid::new_v4(),
            short_code: short_code.into(),
            cancelled: false,
            expires_at,
            plan_uuid,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}
