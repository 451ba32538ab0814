use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// An authenticated session. The session uuid doubles as the bearer token
/// handed to the client.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub uuid: Uuid,
    pub user_uuid: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Session {
    pub const DEFAULT_TTL: Duration = Duration::weeks(1);

    pub fn new(user_uuid: Uuid) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uuid: Uuid::new_v4(),
            user_uuid,
            expires_at: now + Self::DEFAULT_TTL,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}
