use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// External provider a user can link to their account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "connection_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionKind {
    Google,
}

/// A link to an external provider account. A user holds at most one
/// connection per provider kind.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Connection {
    pub uuid: Uuid,
    pub kind: ConnectionKind,
    pub owner_uuid: Uuid,
    pub external_user_id: String,
    /// Display identifier, e.g. the account's email address.
    pub identifier: String,
    pub picture: Option<String>,
    pub link: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Connection {
    pub fn new(
        kind: ConnectionKind,
        owner_uuid: Uuid,
        external_user_id: impl Into<String>,
        identifier: impl Into<String>,
        picture: Option<String>,
        link: Option<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uuid: Uuid::new_v4(),
            kind,
            owner_uuid,
            external_user_id: external_user_id.into(),
            identifier: identifier.into(),
            picture,
            link,
            created_at: now,
            updated_at: now,
        }
    }
}
