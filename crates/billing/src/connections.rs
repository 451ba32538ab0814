//! Connection record operations.
//!
//! A connection links a user to an external provider account. Re-linking
//! the same provider refreshes the stored profile instead of erroring.

use std::sync::Arc;

use famshare_shared::{Connection, ConnectionKind, User};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::store::ConnectionStore;

/// Profile data returned by the external provider when an account is linked.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionProfile {
    pub kind: ConnectionKind,
    pub external_user_id: String,
    pub identifier: String,
    pub picture: Option<String>,
    pub link: Option<String>,
}

#[derive(Clone)]
pub struct ConnectionService {
    connections: Arc<dyn ConnectionStore>,
}

impl ConnectionService {
    pub fn new(connections: Arc<dyn ConnectionStore>) -> Self {
        Self { connections }
    }

    /// Link an external account to a user, replacing any previous link of
    /// the same kind.
    pub async fn connect(&self, owner: &User, profile: ConnectionProfile) -> BillingResult<Connection> {
        let connection = Connection::new(
            profile.kind,
            owner.uuid,
            profile.external_user_id,
            profile.identifier,
            profile.picture,
            profile.link,
        );

        let stored = self.connections.upsert(&connection).await?;

        tracing::info!(
            user_uuid = %owner.uuid,
            kind = ?stored.kind,
            "Linked external account"
        );

        Ok(stored)
    }

    pub async fn connections_of(&self, owner_uuid: Uuid) -> BillingResult<Vec<Connection>> {
        self.connections.find_by_owner(owner_uuid).await
    }
}
