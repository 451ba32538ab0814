//! Subscription engine.
//!
//! Binds a user to a plan through a consumed invite, drives the remote
//! subscription lifecycle, and triggers repricing on every membership
//! change.

use std::sync::Arc;

use famshare_shared::{Invite, Plan, Subscription, SubscriptionStatus, User};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::plans::{MemberChange, PlanService};
use crate::provider::PaymentProvider;
use crate::store::{InviteStore, SubscriptionStore, UserStore};

#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionStore>,
    users: Arc<dyn UserStore>,
    invites: Arc<dyn InviteStore>,
    plans: PlanService,
    provider: Arc<dyn PaymentProvider>,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        users: Arc<dyn UserStore>,
        invites: Arc<dyn InviteStore>,
        plans: PlanService,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            subscriptions,
            users,
            invites,
            plans,
            provider,
        }
    }

    /// Subscribe a user to a plan by consuming an invite.
    ///
    /// All validation runs before any mutation. On success the plan is
    /// repriced for the new member count, a remote subscription is
    /// registered anchored at the plan's next payment date, and the local
    /// row is written as `JOINED`. A failure after the repricing unwinds the
    /// price change best-effort and leaves no subscription behind, local or
    /// remote.
    pub async fn subscribe_user(
        &self,
        plan: &Plan,
        user: &User,
        invite: &Invite,
    ) -> BillingResult<Subscription> {
        if user.uuid == plan.owner_uuid {
            return Err(BillingError::OwnerOfPlanSubscribe);
        }

        if self.users.find_by_uuid(user.uuid).await?.is_none() {
            return Err(BillingError::not_found("User", user.uuid));
        }

        if invite.plan_uuid != plan.uuid {
            return Err(BillingError::not_found("Invite", &invite.short_code));
        }

        if invite.cancelled {
            return Err(BillingError::InviteCancelled);
        }

        let now = OffsetDateTime::now_utc();
        if invite.is_expired(now) {
            return Err(BillingError::InviteExpired);
        }

        if self.invites.redeemer_of(invite.uuid).await?.is_some() {
            return Err(BillingError::InviteAlreadyUsed);
        }

        if self
            .subscriptions
            .find_by_plan_and_user(plan.uuid, user.uuid)
            .await?
            .is_some()
        {
            return Err(BillingError::AlreadySubscribed);
        }

        let customer_id = user
            .stripe_customer_id
            .as_deref()
            .ok_or(BillingError::PaymentNotConfigured)?;

        let repricing = self.plans.reprice(plan, MemberChange::Add).await?;

        let anchor = plan.next_payment_date(now);
        let stripe_id = match self
            .provider
            .create_subscription(customer_id, &plan.uuid.to_string(), anchor)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.plans
                    .restore_price(plan, repricing.previous_amount)
                    .await;

                return Err(err);
            }
        };

        let mut subscription = Subscription::new(plan.uuid, user.uuid, invite.uuid);
        subscription.stripe_id = Some(stripe_id.clone());

        if let Err(err) = self.subscriptions.insert(&subscription).await {
            if let Err(cleanup_err) = self.provider.delete_subscription(&stripe_id).await {
                tracing::error!(
                    subscription_uuid = %subscription.uuid,
                    stripe_id = %stripe_id,
                    error = %cleanup_err,
                    "Failed to remove remote subscription after local insert failure"
                );
            }
            self.plans
                .restore_price(plan, repricing.previous_amount)
                .await;

            return Err(err);
        }

        tracing::info!(
            subscription_uuid = %subscription.uuid,
            plan_uuid = %plan.uuid,
            user_uuid = %user.uuid,
            invite_uuid = %invite.uuid,
            "Subscribed user to plan"
        );

        Ok(subscription)
    }

    /// Overwrite the status directly, for billing-driven transitions such as
    /// marking a member `LATE` or `EXPIRED`. Never touches the provider, and
    /// never produces `CANCELLED` — that is the cancel flow's job.
    pub async fn set_status(
        &self,
        subscription: &Subscription,
        status: SubscriptionStatus,
    ) -> BillingResult<Subscription> {
        if status == SubscriptionStatus::Cancelled {
            return Err(BillingError::InvalidStatusChange);
        }

        self.subscriptions
            .update_status(subscription.uuid, status)
            .await?;

        Ok(Subscription {
            status,
            ..subscription.clone()
        })
    }

    /// Cancel a membership: remove the remote subscription, reprice the plan
    /// for one member fewer, and mark the row `CANCELLED`.
    pub async fn cancel(&self, subscription: &Subscription) -> BillingResult<Subscription> {
        let plan = self.plans.get(subscription.plan_uuid).await?;

        if let Some(stripe_id) = &subscription.stripe_id {
            self.provider.delete_subscription(stripe_id).await?;
        }

        // The member is already gone remotely at this point. A repricing
        // failure must not keep the row in a paying state, or members() and
        // every later repricing would count a member who no longer bills.
        if let Err(err) = self.plans.reprice(&plan, MemberChange::Remove).await {
            tracing::error!(
                subscription_uuid = %subscription.uuid,
                plan_uuid = %plan.uuid,
                error = %err,
                "Repricing after cancellation failed; remote price does not \
                 reflect the reduced member count"
            );
        }

        self.subscriptions
            .update_status(subscription.uuid, SubscriptionStatus::Cancelled)
            .await?;

        tracing::info!(
            subscription_uuid = %subscription.uuid,
            plan_uuid = %plan.uuid,
            "Cancelled subscription"
        );

        Ok(Subscription {
            status: SubscriptionStatus::Cancelled,
            ..subscription.clone()
        })
    }

    /// Cancel the caller's own membership of a plan.
    pub async fn unsubscribe(
        &self,
        actor_uuid: Uuid,
        plan_uuid: Uuid,
    ) -> BillingResult<Subscription> {
        let subscription = self
            .subscriptions
            .find_by_plan_and_user(plan_uuid, actor_uuid)
            .await?
            .ok_or(BillingError::NotSubscribed)?;

        self.cancel(&subscription).await
    }

    pub async fn find(&self, uuid: Uuid) -> BillingResult<Option<Subscription>> {
        self.subscriptions.find_by_uuid(uuid).await
    }

    pub async fn get(&self, uuid: Uuid) -> BillingResult<Subscription> {
        self.subscriptions
            .find_by_uuid(uuid)
            .await?
            .ok_or_else(|| BillingError::not_found("Subscription", uuid))
    }

    /// All subscriptions held by a user, any status.
    pub async fn subscriptions_of(&self, user_uuid: Uuid) -> BillingResult<Vec<Subscription>> {
        self.subscriptions.find_by_user(user_uuid).await
    }

    /// All subscriptions of a plan, any status — unlike `members()`, which
    /// filters to paying statuses.
    pub async fn by_plan(&self, plan_uuid: Uuid) -> BillingResult<Vec<Subscription>> {
        self.subscriptions.find_by_plan(plan_uuid).await
    }
}
