// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge case tests for the billing core.
//!
//! Covers the redeem flow guards, the repricing compensating action, plan
//! registration/teardown ordering, and the status machine. Storage and the
//! payment provider are mocked at their trait seams.

use std::sync::{Arc, Mutex};

use famshare_shared::{Invite, Plan, Subscription, SubscriptionStatus, User};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::invites::InviteService;
use crate::plans::{MemberChange, PlanService};
use crate::provider::{MockPaymentProvider, PaymentProvider};
use crate::store::{
    InviteStore, MockInviteStore, MockPlanStore, MockSubscriptionStore, MockUserStore, PlanStore,
    SubscriptionStore, UserStore,
};
use crate::subscriptions::SubscriptionService;
use crate::BillingError;

fn paying_user(discord_id: &str) -> User {
    let mut user = User::new(discord_id, format!("{discord_id}@example.com"));
    user.stripe_customer_id = Some(format!("cus_{discord_id}"));
    user
}

fn week_from_now() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::days(7)
}

/// Wire real services over mocked stores and provider.
fn services(
    users: MockUserStore,
    plan_store: MockPlanStore,
    invite_store: MockInviteStore,
    sub_store: MockSubscriptionStore,
    provider: MockPaymentProvider,
) -> (PlanService, SubscriptionService) {
    let users: Arc<dyn UserStore> = Arc::new(users);
    let plan_store: Arc<dyn PlanStore> = Arc::new(plan_store);
    let invite_store: Arc<dyn InviteStore> = Arc::new(invite_store);
    let sub_store: Arc<dyn SubscriptionStore> = Arc::new(sub_store);
    let provider: Arc<dyn PaymentProvider> = Arc::new(provider);

    let invites = InviteService::new(invite_store.clone(), plan_store.clone());
    let plans = PlanService::new(
        plan_store,
        sub_store.clone(),
        invites,
        provider.clone(),
    );
    let subscriptions =
        SubscriptionService::new(sub_store, users, invite_store, plans.clone(), provider);

    (plans, subscriptions)
}

mod redeem_flow {
    use super::*;

    #[tokio::test]
    async fn redeeming_an_invite_creates_a_joined_subscription() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let member = paying_user("member");
        let invite = Invite::new("AAAAAA", week_from_now(), plan.uuid);

        let mut users = MockUserStore::new();
        let stored_member = member.clone();
        users
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored_member.clone())));

        let mut invite_store = MockInviteStore::new();
        invite_store.expect_redeemer_of().returning(|_| Ok(None));

        let mut plan_store = MockPlanStore::new();
        plan_store.expect_count_paying_members().returning(|_| Ok(0));

        let inserted: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inserted_probe = inserted.clone();
        let mut sub_store = MockSubscriptionStore::new();
        sub_store
            .expect_find_by_plan_and_user()
            .returning(|_, _| Ok(None));
        sub_store.expect_insert().times(1).returning(move |sub| {
            *inserted_probe.lock().unwrap() = Some(sub.clone());
            Ok(())
        });

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_plan().returning(|_| Ok(()));
        provider.expect_create_plan().returning(|_, _, _| Ok(()));
        provider
            .expect_create_subscription()
            .times(1)
            .returning(|_, _, _| Ok("sub_remote".to_string()));

        let (_, subscriptions) = services(users, plan_store, invite_store, sub_store, provider);

        let subscription = subscriptions
            .subscribe_user(&plan, &member, &invite)
            .await
            .unwrap();

        assert_eq!(subscription.status, SubscriptionStatus::Joined);
        assert_eq!(subscription.stripe_id.as_deref(), Some("sub_remote"));

        let row = inserted.lock().unwrap().clone().unwrap();
        assert_eq!(row.plan_uuid, plan.uuid);
        assert_eq!(row.user_uuid, member.uuid);
        assert_eq!(row.invite_uuid, invite.uuid);
    }

    #[tokio::test]
    async fn a_consumed_invite_cannot_be_redeemed_again() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let first_member = paying_user("first");
        let second_member = paying_user("second");
        let invite = Invite::new("AAAAAA", week_from_now(), plan.uuid);

        let mut users = MockUserStore::new();
        let stored = second_member.clone();
        users
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut invite_store = MockInviteStore::new();
        let redeemer = first_member.clone();
        invite_store
            .expect_redeemer_of()
            .returning(move |_| Ok(Some(redeemer.clone())));

        let mut sub_store = MockSubscriptionStore::new();
        sub_store.expect_insert().never();

        let mut provider = MockPaymentProvider::new();
        provider.expect_create_subscription().never();

        let (_, subscriptions) =
            services(users, MockPlanStore::new(), invite_store, sub_store, provider);

        assert!(matches!(
            subscriptions
                .subscribe_user(&plan, &second_member, &invite)
                .await,
            Err(BillingError::InviteAlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn the_owner_cannot_subscribe_to_their_own_plan() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let invite = Invite::new("AAAAAA", week_from_now(), plan.uuid);

        let mut users = MockUserStore::new();
        users.expect_find_by_uuid().never();

        let mut sub_store = MockSubscriptionStore::new();
        sub_store.expect_insert().never();

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_plan().never();
        provider.expect_create_plan().never();
        provider.expect_create_subscription().never();

        let (_, subscriptions) = services(
            users,
            MockPlanStore::new(),
            MockInviteStore::new(),
            sub_store,
            provider,
        );

        assert!(matches!(
            subscriptions.subscribe_user(&plan, &owner, &invite).await,
            Err(BillingError::OwnerOfPlanSubscribe)
        ));
    }

    #[tokio::test]
    async fn a_cancelled_invite_cannot_be_redeemed() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let member = paying_user("member");
        let mut invite = Invite::new("AAAAAA", week_from_now(), plan.uuid);
        invite.cancelled = true;

        let mut users = MockUserStore::new();
        let stored = member.clone();
        users
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored.clone())));

        let (_, subscriptions) = services(
            users,
            MockPlanStore::new(),
            MockInviteStore::new(),
            MockSubscriptionStore::new(),
            MockPaymentProvider::new(),
        );

        assert!(matches!(
            subscriptions.subscribe_user(&plan, &member, &invite).await,
            Err(BillingError::InviteCancelled)
        ));
    }

    #[tokio::test]
    async fn an_expired_invite_cannot_be_redeemed() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let member = paying_user("member");
        let invite = Invite::new(
            "AAAAAA",
            OffsetDateTime::now_utc() - Duration::days(1),
            plan.uuid,
        );

        let mut users = MockUserStore::new();
        let stored = member.clone();
        users
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored.clone())));

        let (_, subscriptions) = services(
            users,
            MockPlanStore::new(),
            MockInviteStore::new(),
            MockSubscriptionStore::new(),
            MockPaymentProvider::new(),
        );

        assert!(matches!(
            subscriptions.subscribe_user(&plan, &member, &invite).await,
            Err(BillingError::InviteExpired)
        ));
    }

    #[tokio::test]
    async fn a_second_subscription_to_the_same_plan_is_rejected() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let member = paying_user("member");
        let invite = Invite::new("AAAAAA", week_from_now(), plan.uuid);

        let mut users = MockUserStore::new();
        let stored = member.clone();
        users
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut invite_store = MockInviteStore::new();
        invite_store.expect_redeemer_of().returning(|_| Ok(None));

        let existing = Subscription::new(plan.uuid, member.uuid, Uuid::new_v4());
        let mut sub_store = MockSubscriptionStore::new();
        sub_store
            .expect_find_by_plan_and_user()
            .returning(move |_, _| Ok(Some(existing.clone())));
        sub_store.expect_insert().never();

        let mut provider = MockPaymentProvider::new();
        provider.expect_create_subscription().never();

        let (_, subscriptions) =
            services(users, MockPlanStore::new(), invite_store, sub_store, provider);

        assert!(matches!(
            subscriptions.subscribe_user(&plan, &member, &invite).await,
            Err(BillingError::AlreadySubscribed)
        ));
    }

    #[tokio::test]
    async fn a_member_without_a_payment_method_cannot_join() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let member = User::new("member", "member@example.com");
        let invite = Invite::new("AAAAAA", week_from_now(), plan.uuid);

        let mut users = MockUserStore::new();
        let stored = member.clone();
        users
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut invite_store = MockInviteStore::new();
        invite_store.expect_redeemer_of().returning(|_| Ok(None));

        let mut sub_store = MockSubscriptionStore::new();
        sub_store
            .expect_find_by_plan_and_user()
            .returning(|_, _| Ok(None));
        sub_store.expect_insert().never();

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_plan().never();

        let (_, subscriptions) =
            services(users, MockPlanStore::new(), invite_store, sub_store, provider);

        assert!(matches!(
            subscriptions.subscribe_user(&plan, &member, &invite).await,
            Err(BillingError::PaymentNotConfigured)
        ));
    }

    #[tokio::test]
    async fn provider_registration_failure_leaves_no_subscription_behind() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);
        let member = paying_user("member");
        let invite = Invite::new("AAAAAA", week_from_now(), plan.uuid);

        let mut users = MockUserStore::new();
        let stored = member.clone();
        users
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut invite_store = MockInviteStore::new();
        invite_store.expect_redeemer_of().returning(|_| Ok(None));

        let mut plan_store = MockPlanStore::new();
        plan_store.expect_count_paying_members().returning(|_| Ok(0));

        let mut sub_store = MockSubscriptionStore::new();
        sub_store
            .expect_find_by_plan_and_user()
            .returning(|_, _| Ok(None));
        sub_store.expect_insert().never();

        // Reprice applies, registration fails, and the price is restored:
        // two delete/create pairs in total.
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_delete_plan()
            .times(2)
            .returning(|_| Ok(()));
        provider
            .expect_create_plan()
            .times(2)
            .returning(|_, _, _| Ok(()));
        provider.expect_create_subscription().returning(|_, _, _| {
            Err(BillingError::ProviderRegistrationFailed(
                "customer has no source".to_string(),
            ))
        });

        let (_, subscriptions) = services(users, plan_store, invite_store, sub_store, provider);

        assert!(matches!(
            subscriptions.subscribe_user(&plan, &member, &invite).await,
            Err(BillingError::ProviderRegistrationFailed(_))
        ));
    }
}

mod repricing {
    use super::*;

    fn plan_with_owner() -> Plan {
        Plan::new("plan", 100_000, 1000, 1, Uuid::new_v4())
    }

    fn plan_service(plan_store: MockPlanStore, provider: MockPaymentProvider) -> PlanService {
        let (plans, _) = services(
            MockUserStore::new(),
            plan_store,
            MockInviteStore::new(),
            MockSubscriptionStore::new(),
            provider,
        );

        plans
    }

    #[tokio::test]
    async fn adding_a_member_swaps_the_price_for_the_larger_split() {
        let plan = plan_with_owner();
        let previous = plan.payment_amount(0);
        let expected = plan.payment_amount(1);

        let mut plan_store = MockPlanStore::new();
        plan_store.expect_count_paying_members().returning(|_| Ok(0));

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_plan().times(1).returning(|_| Ok(()));
        provider
            .expect_create_plan()
            .withf(move |_, _, amount| *amount == expected)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let plans = plan_service(plan_store, provider);

        let repricing = plans.reprice(&plan, MemberChange::Add).await.unwrap();
        assert_eq!(repricing.previous_amount, previous);
        assert_eq!(repricing.new_amount, expected);
    }

    #[tokio::test]
    async fn a_failed_recreation_restores_the_previous_amount() {
        let plan = plan_with_owner();
        let previous = plan.payment_amount(1);
        let new_amount = plan.payment_amount(2);

        let mut plan_store = MockPlanStore::new();
        plan_store.expect_count_paying_members().returning(|_| Ok(1));

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_plan().times(1).returning(|_| Ok(()));
        provider
            .expect_create_plan()
            .withf(move |_, _, amount| *amount == new_amount)
            .times(1)
            .returning(|_, _, _| {
                Err(BillingError::ProviderRegistrationFailed(
                    "rate limited".to_string(),
                ))
            });
        provider
            .expect_create_plan()
            .withf(move |_, _, amount| *amount == previous)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let plans = plan_service(plan_store, provider);

        match plans.reprice(&plan, MemberChange::Add).await {
            Err(BillingError::ProviderUpdateFailed { pricing, .. }) => {
                assert_eq!(pricing, crate::PricingState::Restored);
            }
            other => panic!("expected rolled-back repricing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_failed_rollback_reports_pricing_as_undefined() {
        let plan = plan_with_owner();

        let mut plan_store = MockPlanStore::new();
        plan_store.expect_count_paying_members().returning(|_| Ok(1));

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_plan().times(1).returning(|_| Ok(()));
        provider.expect_create_plan().times(2).returning(|_, _, _| {
            Err(BillingError::ProviderRegistrationFailed(
                "provider down".to_string(),
            ))
        });

        let plans = plan_service(plan_store, provider);

        match plans.reprice(&plan, MemberChange::Add).await {
            Err(BillingError::ProviderUpdateFailed { pricing, .. }) => {
                assert_eq!(pricing, crate::PricingState::Undefined);
            }
            other => panic!("expected undefined pricing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn removing_the_last_member_prices_for_the_owner_alone() {
        let plan = plan_with_owner();
        let expected = plan.payment_amount(0);

        let mut plan_store = MockPlanStore::new();
        plan_store.expect_count_paying_members().returning(|_| Ok(1));

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_plan().returning(|_| Ok(()));
        provider
            .expect_create_plan()
            .withf(move |_, _, amount| *amount == expected)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let plans = plan_service(plan_store, provider);

        let repricing = plans.reprice(&plan, MemberChange::Remove).await.unwrap();
        assert_eq!(repricing.new_amount, expected);
    }
}

mod plan_lifecycle {
    use super::*;

    #[tokio::test]
    async fn creation_registers_remote_records_before_the_local_row() {
        let owner = paying_user("owner");

        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let mut plan_store = MockPlanStore::new();
        let insert_order = order.clone();
        plan_store.expect_insert().times(1).returning(move |_| {
            insert_order.lock().unwrap().push("local_insert");
            Ok(())
        });

        let mut provider = MockPaymentProvider::new();
        let product_order = order.clone();
        provider
            .expect_create_product()
            .times(1)
            .returning(move |_, _| {
                product_order.lock().unwrap().push("create_product");
                Ok(())
            });
        let plan_order = order.clone();
        provider
            .expect_create_plan()
            .withf(|_, _, amount| *amount == 110_000)
            .times(1)
            .returning(move |_, _, _| {
                plan_order.lock().unwrap().push("create_plan");
                Ok(())
            });

        let (plans, _) = services(
            MockUserStore::new(),
            plan_store,
            MockInviteStore::new(),
            MockSubscriptionStore::new(),
            provider,
        );

        let plan = plans
            .create(&owner, "netflix", 100_000, 1000, 15)
            .await
            .unwrap();

        assert_eq!(plan.owner_uuid, owner.uuid);
        assert_eq!(
            order.lock().unwrap().as_slice(),
            ["create_product", "create_plan", "local_insert"]
        );
    }

    #[tokio::test]
    async fn creation_aborts_without_a_local_row_when_registration_fails() {
        let owner = paying_user("owner");

        let mut plan_store = MockPlanStore::new();
        plan_store.expect_insert().never();

        let mut provider = MockPaymentProvider::new();
        provider.expect_create_product().returning(|_, _| Ok(()));
        provider.expect_create_plan().returning(|_, _, _| {
            Err(BillingError::ProviderRegistrationFailed(
                "invalid amount".to_string(),
            ))
        });
        // The dangling product is cleaned up again.
        provider
            .expect_delete_product()
            .times(1)
            .returning(|_| Ok(()));

        let (plans, _) = services(
            MockUserStore::new(),
            plan_store,
            MockInviteStore::new(),
            MockSubscriptionStore::new(),
            provider,
        );

        assert!(matches!(
            plans.create(&owner, "netflix", 100_000, 1000, 15).await,
            Err(BillingError::ProviderRegistrationFailed(_))
        ));
    }

    #[tokio::test]
    async fn deletion_tears_down_remote_state_before_the_local_row() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);

        let mut member_sub = Subscription::new(plan.uuid, Uuid::new_v4(), Uuid::new_v4());
        member_sub.stripe_id = Some("sub_remote".to_string());

        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let mut plan_store = MockPlanStore::new();
        let stored_plan = plan.clone();
        plan_store
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored_plan.clone())));
        let delete_order = order.clone();
        plan_store.expect_delete().times(1).returning(move |_| {
            delete_order.lock().unwrap().push("local_delete");
            Ok(())
        });

        let mut sub_store = MockSubscriptionStore::new();
        let stored_sub = member_sub.clone();
        sub_store
            .expect_find_by_plan()
            .returning(move |_| Ok(vec![stored_sub.clone()]));

        let mut provider = MockPaymentProvider::new();
        let sub_order = order.clone();
        provider
            .expect_delete_subscription()
            .times(1)
            .returning(move |_| {
                sub_order.lock().unwrap().push("delete_subscription");
                Ok(())
            });
        let plan_order = order.clone();
        provider.expect_delete_plan().times(1).returning(move |_| {
            plan_order.lock().unwrap().push("delete_plan");
            Ok(())
        });
        let product_order = order.clone();
        provider
            .expect_delete_product()
            .times(1)
            .returning(move |_| {
                product_order.lock().unwrap().push("delete_product");
                Ok(())
            });

        let (plans, _) = services(
            MockUserStore::new(),
            plan_store,
            MockInviteStore::new(),
            sub_store,
            provider,
        );

        plans.delete(owner.uuid, plan.uuid).await.unwrap();

        assert_eq!(
            order.lock().unwrap().as_slice(),
            [
                "delete_subscription",
                "delete_plan",
                "delete_product",
                "local_delete"
            ]
        );
    }

    #[tokio::test]
    async fn deletion_keeps_the_local_row_when_remote_cleanup_fails() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);

        let mut member_sub = Subscription::new(plan.uuid, Uuid::new_v4(), Uuid::new_v4());
        member_sub.stripe_id = Some("sub_remote".to_string());

        let mut plan_store = MockPlanStore::new();
        let stored_plan = plan.clone();
        plan_store
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored_plan.clone())));
        plan_store.expect_delete().never();

        let mut sub_store = MockSubscriptionStore::new();
        let stored_sub = member_sub.clone();
        sub_store
            .expect_find_by_plan()
            .returning(move |_| Ok(vec![stored_sub.clone()]));

        let mut provider = MockPaymentProvider::new();
        provider.expect_delete_subscription().returning(|_| {
            Err(BillingError::ProviderUpdateFailed {
                detail: "network".to_string(),
                pricing: crate::PricingState::Unchanged,
            })
        });

        let (plans, _) = services(
            MockUserStore::new(),
            plan_store,
            MockInviteStore::new(),
            sub_store,
            provider,
        );

        assert!(matches!(
            plans.delete(owner.uuid, plan.uuid).await,
            Err(BillingError::ProviderUpdateFailed { .. })
        ));
    }

    #[tokio::test]
    async fn only_the_owner_can_delete_a_plan() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);

        let mut plan_store = MockPlanStore::new();
        let stored_plan = plan.clone();
        plan_store
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored_plan.clone())));
        plan_store.expect_delete().never();

        let (plans, _) = services(
            MockUserStore::new(),
            plan_store,
            MockInviteStore::new(),
            MockSubscriptionStore::new(),
            MockPaymentProvider::new(),
        );

        assert!(matches!(
            plans.delete(Uuid::new_v4(), plan.uuid).await,
            Err(BillingError::Forbidden)
        ));
    }
}

mod status_machine {
    use super::*;

    fn subscription_service(
        plan_store: MockPlanStore,
        sub_store: MockSubscriptionStore,
        provider: MockPaymentProvider,
    ) -> SubscriptionService {
        let (_, subscriptions) = services(
            MockUserStore::new(),
            plan_store,
            MockInviteStore::new(),
            sub_store,
            provider,
        );

        subscriptions
    }

    #[tokio::test]
    async fn set_status_applies_billing_transitions() {
        let subscription = Subscription::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut sub_store = MockSubscriptionStore::new();
        sub_store
            .expect_update_status()
            .withf(|_, status| *status == SubscriptionStatus::Late)
            .times(1)
            .returning(|_, _| Ok(()));

        let service = subscription_service(
            MockPlanStore::new(),
            sub_store,
            MockPaymentProvider::new(),
        );

        let updated = service
            .set_status(&subscription, SubscriptionStatus::Late)
            .await
            .unwrap();

        assert_eq!(updated.status, SubscriptionStatus::Late);
    }

    #[tokio::test]
    async fn set_status_cannot_produce_cancelled() {
        let subscription = Subscription::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut sub_store = MockSubscriptionStore::new();
        sub_store.expect_update_status().never();

        let service = subscription_service(
            MockPlanStore::new(),
            sub_store,
            MockPaymentProvider::new(),
        );

        assert!(matches!(
            service
                .set_status(&subscription, SubscriptionStatus::Cancelled)
                .await,
            Err(BillingError::InvalidStatusChange)
        ));
    }

    #[tokio::test]
    async fn cancel_removes_the_remote_subscription_and_reprices() {
        let owner = paying_user("owner");
        let plan = Plan::new("plan", 100_000, 1000, 1, owner.uuid);

        let mut subscription = Subscription::new(plan.uuid, Uuid::new_v4(), Uuid::new_v4());
        subscription.stripe_id = Some("sub_remote".to_string());

        let mut plan_store = MockPlanStore::new();
        let stored_plan = plan.clone();
        plan_store
            .expect_find_by_uuid()
            .returning(move |_| Ok(Some(stored_plan.clone())));
        plan_store.expect_count_paying_members().returning(|_| Ok(1));

        let mut sub_store = MockSubscriptionStore::new();
        sub_store
            .expect_update_status()
            .withf(|_, status| *status == SubscriptionStatus::Cancelled)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut provider = MockPaymentProvider::new();
        provider
            .expect_delete_subscription()
            .times(1)
            .returning(|_| Ok(()));
        provider.expect_delete_plan().returning(|_| Ok(()));
        provider.expect_create_plan().returning(|_, _, _| Ok(()));

        let service = subscription_service(plan_store, sub_store, provider);

        let cancelled = service.cancel(&subscription).await.unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn unsubscribe_requires_an_existing_subscription() {
        let mut sub_store = MockSubscriptionStore::new();
        sub_store
            .expect_find_by_plan_and_user()
            .returning(|_, _| Ok(None));

        let service = subscription_service(
            MockPlanStore::new(),
            sub_store,
            MockPaymentProvider::new(),
        );

        assert!(matches!(
            service.unsubscribe(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(BillingError::NotSubscribed)
        ));
    }
}
