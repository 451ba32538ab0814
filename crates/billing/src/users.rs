//! Identity record operations.
//!
//! Users are created on first successful OAuth login. Attaching a Stripe
//! customer is the only place this module talks to the payment provider,
//! and its failure propagates rather than leaving a half-configured user.

use std::sync::Arc;

use famshare_shared::{Connection, Subscription, User};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::provider::PaymentProvider;
use crate::store::{ConnectionStore, SubscriptionStore, UserStore};

/// Identity tuple produced by the OAuth collaborator after a completed
/// exchange. The handshake itself is a black box; only verified identities
/// reach this service.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedIdentity {
    pub discord_id: String,
    pub email: String,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    connections: Arc<dyn ConnectionStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        connections: Arc<dyn ConnectionStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            users,
            connections,
            subscriptions,
            provider,
        }
    }

    pub async fn find(&self, uuid: Uuid) -> BillingResult<Option<User>> {
        self.users.find_by_uuid(uuid).await
    }

    pub async fn get(&self, uuid: Uuid) -> BillingResult<User> {
        self.users
            .find_by_uuid(uuid)
            .await?
            .ok_or_else(|| BillingError::not_found("User", uuid))
    }

    pub async fn find_by_discord_id(&self, discord_id: &str) -> BillingResult<Option<User>> {
        self.users.find_by_discord_id(discord_id).await
    }

    /// Resolve the user for a verified OAuth identity, creating the record
    /// on first login.
    pub async fn login_with_oauth(&self, identity: VerifiedIdentity) -> BillingResult<User> {
        if let Some(user) = self.users.find_by_discord_id(&identity.discord_id).await? {
            return Ok(user);
        }

        let user = User::new(identity.discord_id, identity.email);
        self.users.insert(&user).await?;

        tracing::info!(user_uuid = %user.uuid, "Created user on first login");

        Ok(user)
    }

    /// Register a payment source with the provider and remember the
    /// resulting customer id.
    ///
    /// Idempotent: a user who already has a customer attached is returned
    /// unchanged without another provider call.
    pub async fn attach_payment_method(
        &self,
        user: &User,
        source_token: &str,
    ) -> BillingResult<User> {
        if user.stripe_customer_id.is_some() {
            return Ok(user.clone());
        }

        let customer_id = self
            .provider
            .create_customer(&user.email, source_token, user.uuid)
            .await?;

        self.users
            .set_stripe_customer(user.uuid, &customer_id)
            .await?;

        tracing::info!(
            user_uuid = %user.uuid,
            customer_id = %customer_id,
            "Attached payment method"
        );

        Ok(User {
            stripe_customer_id: Some(customer_id),
            ..user.clone()
        })
    }

    pub async fn connections_of(&self, user_uuid: Uuid) -> BillingResult<Vec<Connection>> {
        self.connections.find_by_owner(user_uuid).await
    }

    pub async fn subscriptions_of(&self, user_uuid: Uuid) -> BillingResult<Vec<Subscription>> {
        self.subscriptions.find_by_user(user_uuid).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::MockPaymentProvider;
    use crate::store::{MockConnectionStore, MockSubscriptionStore, MockUserStore};

    fn service(users: MockUserStore, provider: MockPaymentProvider) -> UserService {
        UserService::new(
            Arc::new(users),
            Arc::new(MockConnectionStore::new()),
            Arc::new(MockSubscriptionStore::new()),
            Arc::new(provider),
        )
    }

    #[tokio::test]
    async fn login_reuses_an_existing_user() {
        let existing = User::new("discord-1", "one@example.com");
        let expected = existing.uuid;

        let mut users = MockUserStore::new();
        users
            .expect_find_by_discord_id()
            .returning(move |_| Ok(Some(existing.clone())));
        users.expect_insert().never();

        let service = service(users, MockPaymentProvider::new());

        let user = service
            .login_with_oauth(VerifiedIdentity {
                discord_id: "discord-1".to_string(),
                email: "one@example.com".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(user.uuid, expected);
    }

    #[tokio::test]
    async fn login_creates_a_user_on_first_sight() {
        let mut users = MockUserStore::new();
        users.expect_find_by_discord_id().returning(|_| Ok(None));
        users.expect_insert().times(1).returning(|_| Ok(()));

        let service = service(users, MockPaymentProvider::new());

        let user = service
            .login_with_oauth(VerifiedIdentity {
                discord_id: "discord-2".to_string(),
                email: "two@example.com".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(user.discord_id, "discord-2");
        assert!(!user.has_payment_method());
    }

    #[tokio::test]
    async fn attach_payment_method_is_a_noop_when_already_attached() {
        let mut user = User::new("discord-3", "three@example.com");
        user.stripe_customer_id = Some("cus_123".to_string());

        let mut provider = MockPaymentProvider::new();
        provider.expect_create_customer().never();

        let service = service(MockUserStore::new(), provider);

        let unchanged = service.attach_payment_method(&user, "tok_abc").await.unwrap();
        assert_eq!(unchanged.stripe_customer_id.as_deref(), Some("cus_123"));
    }

    #[tokio::test]
    async fn attach_payment_method_propagates_provider_failure() {
        let user = User::new("discord-4", "four@example.com");

        let mut users = MockUserStore::new();
        users.expect_set_stripe_customer().never();

        let mut provider = MockPaymentProvider::new();
        provider.expect_create_customer().returning(|_, _, _| {
            Err(BillingError::ProviderRegistrationFailed(
                "card declined".to_string(),
            ))
        });

        let service = service(users, provider);

        assert!(matches!(
            service.attach_payment_method(&user, "tok_abc").await,
            Err(BillingError::ProviderRegistrationFailed(_))
        ));
    }

    #[tokio::test]
    async fn attach_payment_method_stores_the_customer_id() {
        let user = User::new("discord-5", "five@example.com");

        let mut users = MockUserStore::new();
        users
            .expect_set_stripe_customer()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut provider = MockPaymentProvider::new();
        provider
            .expect_create_customer()
            .returning(|_, _, _| Ok("cus_456".to_string()));

        let service = service(users, provider);

        let updated = service.attach_payment_method(&user, "tok_abc").await.unwrap();
        assert_eq!(updated.stripe_customer_id.as_deref(), Some("cus_456"));
        assert!(updated.has_payment_method());
    }
}
