//! Storage contracts.
//!
//! One trait per entity, covering the find/insert/update/delete/count
//! operations the engines need, plus the two joins that keep invite
//! consumption and plan membership derived instead of duplicated.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use famshare_shared::{Connection, Invite, Plan, Subscription, SubscriptionStatus, User};
use uuid::Uuid;

use crate::error::BillingResult;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<User>>;
    async fn find_by_discord_id(&self, discord_id: &str) -> BillingResult<Option<User>>;
    async fn insert(&self, user: &User) -> BillingResult<()>;
    async fn set_stripe_customer(&self, uuid: Uuid, stripe_customer_id: &str) -> BillingResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<Plan>>;
    async fn find_by_owner(&self, owner_uuid: Uuid) -> BillingResult<Vec<Plan>>;
    async fn insert(&self, plan: &Plan) -> BillingResult<()>;
    /// Only the name is mutable after creation.
    async fn update_name(&self, uuid: Uuid, name: &str) -> BillingResult<()>;
    async fn delete(&self, uuid: Uuid) -> BillingResult<()>;
    /// Users with a paying subscription to this plan (the owner is never
    /// among them; owners do not subscribe to their own plans).
    async fn members(&self, plan_uuid: Uuid) -> BillingResult<Vec<User>>;
    async fn count_paying_members(&self, plan_uuid: Uuid) -> BillingResult<u32>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<Invite>>;
    async fn find_by_short_code(&self, short_code: &str) -> BillingResult<Option<Invite>>;
    async fn find_by_plan(&self, plan_uuid: Uuid) -> BillingResult<Vec<Invite>>;
    async fn short_code_exists(&self, short_code: &str) -> BillingResult<bool>;
    async fn insert(&self, invite: &Invite) -> BillingResult<()>;
    async fn set_cancelled(&self, uuid: Uuid) -> BillingResult<()>;
    /// The user who consumed this invite, resolved through the subscription
    /// that references it. `None` means unconsumed.
    async fn redeemer_of(&self, invite_uuid: Uuid) -> BillingResult<Option<User>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<Subscription>>;
    async fn find_by_user(&self, user_uuid: Uuid) -> BillingResult<Vec<Subscription>>;
    async fn find_by_plan(&self, plan_uuid: Uuid) -> BillingResult<Vec<Subscription>>;
    async fn find_by_plan_and_user(
        &self,
        plan_uuid: Uuid,
        user_uuid: Uuid,
    ) -> BillingResult<Option<Subscription>>;
    /// Fails with `AlreadySubscribed` when the (plan, user) unique
    /// constraint is violated.
    async fn insert(&self, subscription: &Subscription) -> BillingResult<()>;
    async fn update_status(&self, uuid: Uuid, status: SubscriptionStatus) -> BillingResult<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn find_by_owner(&self, owner_uuid: Uuid) -> BillingResult<Vec<Connection>>;
    /// Insert, or refresh the existing row for the same (owner, kind).
    async fn upsert(&self, connection: &Connection) -> BillingResult<Connection>;
}
