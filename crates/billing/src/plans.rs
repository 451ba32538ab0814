//! Plan engine.
//!
//! Owns pricing and payment-date arithmetic (on the `Plan` entity), the
//! provider-side Product/Plan registration, and the repricing that follows
//! every membership change.

use std::sync::Arc;

use famshare_shared::{Invite, Plan, Subscription, User};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult, PricingState};
use crate::invites::InviteService;
use crate::provider::PaymentProvider;
use crate::store::{PlanStore, SubscriptionStore};

/// Direction of a membership change for repricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberChange {
    Add,
    Remove,
}

/// Amounts involved in a successful repricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repricing {
    pub previous_amount: i64,
    pub new_amount: i64,
}

#[derive(Clone)]
pub struct PlanService {
    plans: Arc<dyn PlanStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    invites: InviteService,
    provider: Arc<dyn PaymentProvider>,
}

impl PlanService {
    pub fn new(
        plans: Arc<dyn PlanStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        invites: InviteService,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            invites,
            provider,
        }
    }

    /// Create a plan and register its remote Product and Plan, priced for
    /// zero non-owner members. A provider failure aborts the creation; no
    /// local row is written.
    pub async fn create(
        &self,
        owner: &User,
        name: &str,
        amount: i64,
        fee_basis_points: i32,
        payment_day: i16,
    ) -> BillingResult<Plan> {
        let plan = Plan::new(name, amount, fee_basis_points, payment_day, owner.uuid);
        let plan_id = plan.uuid.to_string();
        let initial_amount = plan.payment_amount(0);

        self.provider.create_product(&plan_id, &plan.name).await?;

        if let Err(err) = self
            .provider
            .create_plan(&plan_id, &plan_id, initial_amount)
            .await
        {
            if let Err(cleanup_err) = self.provider.delete_product(&plan_id).await {
                tracing::warn!(
                    plan_uuid = %plan.uuid,
                    error = %cleanup_err,
                    "Failed to clean up product after plan registration failure"
                );
            }

            return Err(err);
        }

        if let Err(err) = self.plans.insert(&plan).await {
            // The row never landed; tear the remote records down again.
            if let Err(cleanup_err) = self.provider.delete_plan(&plan_id).await {
                tracing::error!(
                    plan_uuid = %plan.uuid,
                    error = %cleanup_err,
                    "Failed to remove remote plan after local insert failure"
                );
            }
            if let Err(cleanup_err) = self.provider.delete_product(&plan_id).await {
                tracing::error!(
                    plan_uuid = %plan.uuid,
                    error = %cleanup_err,
                    "Failed to remove remote product after local insert failure"
                );
            }

            return Err(err);
        }

        tracing::info!(
            plan_uuid = %plan.uuid,
            owner_uuid = %owner.uuid,
            amount = plan.amount,
            initial_amount,
            "Created plan"
        );

        Ok(plan)
    }

    /// Rename a plan. Owner-only; the name is the only mutable field.
    pub async fn rename(
        &self,
        actor_uuid: Uuid,
        plan_uuid: Uuid,
        name: &str,
    ) -> BillingResult<Plan> {
        let plan = self.get(plan_uuid).await?;

        if plan.owner_uuid != actor_uuid {
            return Err(BillingError::Forbidden);
        }

        self.plans.update_name(plan.uuid, name).await?;

        Ok(Plan {
            name: name.to_string(),
            ..plan
        })
    }

    /// Recompute the per-member amount around a membership change and swap
    /// the remote price.
    ///
    /// The provider does not allow two active prices with the same id, so
    /// the old price is deleted before the new one is created. This is a
    /// compensating-action sequence, not a transaction: if the new price
    /// cannot be registered the old amount is restored best-effort, and a
    /// failed restore leaves remote pricing undefined — surfaced in the
    /// error and logged, never hidden.
    pub async fn reprice(&self, plan: &Plan, change: MemberChange) -> BillingResult<Repricing> {
        let current = self.plans.count_paying_members(plan.uuid).await?;
        let adjusted = match change {
            MemberChange::Add => current + 1,
            MemberChange::Remove => current.saturating_sub(1),
        };

        let previous_amount = plan.payment_amount(current);
        let new_amount = plan.payment_amount(adjusted);
        let plan_id = plan.uuid.to_string();

        self.provider.delete_plan(&plan_id).await?;

        if let Err(err) = self
            .provider
            .create_plan(&plan_id, &plan_id, new_amount)
            .await
        {
            return match self
                .provider
                .create_plan(&plan_id, &plan_id, previous_amount)
                .await
            {
                Ok(()) => {
                    tracing::warn!(
                        plan_uuid = %plan.uuid,
                        previous_amount,
                        new_amount,
                        error = %err,
                        "Repricing failed; previous price restored"
                    );

                    Err(BillingError::ProviderUpdateFailed {
                        detail: err.to_string(),
                        pricing: PricingState::Restored,
                    })
                }
                Err(rollback_err) => {
                    tracing::error!(
                        plan_uuid = %plan.uuid,
                        previous_amount,
                        new_amount,
                        error = %err,
                        rollback_error = %rollback_err,
                        "Repricing failed and the previous price could not be restored; \
                         remote pricing is undefined"
                    );

                    Err(BillingError::ProviderUpdateFailed {
                        detail: format!("{err}; rollback failed: {rollback_err}"),
                        pricing: PricingState::Undefined,
                    })
                }
            };
        }

        tracing::info!(
            plan_uuid = %plan.uuid,
            members = adjusted,
            previous_amount,
            new_amount,
            "Repriced plan"
        );

        Ok(Repricing {
            previous_amount,
            new_amount,
        })
    }

    /// Best-effort restore of a known-good per-member amount, used to unwind
    /// an already-applied repricing when a later step of the enclosing
    /// operation fails.
    pub(crate) async fn restore_price(&self, plan: &Plan, amount: i64) {
        let plan_id = plan.uuid.to_string();

        if let Err(err) = self.provider.delete_plan(&plan_id).await {
            tracing::error!(
                plan_uuid = %plan.uuid,
                amount,
                error = %err,
                "Failed to delete remote price while restoring; pricing may be stale"
            );
            return;
        }

        if let Err(err) = self.provider.create_plan(&plan_id, &plan_id, amount).await {
            tracing::error!(
                plan_uuid = %plan.uuid,
                amount,
                error = %err,
                "Failed to restore remote price; remote pricing is undefined"
            );
        }
    }

    /// Create an invite for this plan. Owner-only.
    pub async fn create_invite(
        &self,
        actor_uuid: Uuid,
        plan_uuid: Uuid,
        expires_at: OffsetDateTime,
    ) -> BillingResult<Invite> {
        let plan = self.get(plan_uuid).await?;

        if plan.owner_uuid != actor_uuid {
            return Err(BillingError::Forbidden);
        }

        self.invites.create(plan.uuid, expires_at).await
    }

    /// Users with a paying subscription to this plan, excluding the owner.
    pub async fn members(&self, plan_uuid: Uuid) -> BillingResult<Vec<User>> {
        self.plans.members(plan_uuid).await
    }

    pub async fn invites_of(&self, plan_uuid: Uuid) -> BillingResult<Vec<Invite>> {
        self.invites.find_by_plan(plan_uuid).await
    }

    pub async fn subscriptions_of(&self, plan_uuid: Uuid) -> BillingResult<Vec<Subscription>> {
        self.subscriptions.find_by_plan(plan_uuid).await
    }

    pub async fn find(&self, plan_uuid: Uuid) -> BillingResult<Option<Plan>> {
        self.plans.find_by_uuid(plan_uuid).await
    }

    pub async fn get(&self, plan_uuid: Uuid) -> BillingResult<Plan> {
        self.plans
            .find_by_uuid(plan_uuid)
            .await?
            .ok_or_else(|| BillingError::not_found("Plan", plan_uuid))
    }

    pub async fn plans_of(&self, owner_uuid: Uuid) -> BillingResult<Vec<Plan>> {
        self.plans.find_by_owner(owner_uuid).await
    }

    /// Delete a plan. Owner-only.
    ///
    /// Remote cleanup runs first — member subscriptions, then the plan's
    /// price, then the product — so a provider failure leaves the local
    /// record intact for a retry instead of orphaning remote billing state.
    pub async fn delete(&self, actor_uuid: Uuid, plan_uuid: Uuid) -> BillingResult<()> {
        let plan = self.get(plan_uuid).await?;

        if plan.owner_uuid != actor_uuid {
            return Err(BillingError::Forbidden);
        }

        let subscriptions = self.subscriptions.find_by_plan(plan.uuid).await?;

        for subscription in &subscriptions {
            if let Some(stripe_id) = &subscription.stripe_id {
                self.provider.delete_subscription(stripe_id).await?;
            }
        }

        let plan_id = plan.uuid.to_string();
        self.provider.delete_plan(&plan_id).await?;
        self.provider.delete_product(&plan_id).await?;

        self.plans.delete(plan.uuid).await?;

        tracing::info!(
            plan_uuid = %plan.uuid,
            subscriptions = subscriptions.len(),
            "Deleted plan"
        );

        Ok(())
    }
}
