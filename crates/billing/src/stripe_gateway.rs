//! Stripe implementation of the payment provider contract.
//!
//! Every call runs under a bounded timeout; a timeout is reported the same
//! way as any other provider failure rather than hanging the operation.

use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use stripe::{
    CancelSubscription, CreateCustomer, CreatePlan, CreateProduct, CreateSubscription,
    CreateSubscriptionItems, Currency, Customer, CustomerId, IdOrCreate, PaymentSourceParams,
    Plan, PlanId, PlanInterval, Product, ProductId, Subscription, SubscriptionId,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult, PricingState};
use crate::provider::PaymentProvider;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Stripe configuration, read once from the environment.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub request_timeout: Duration,
}

impl StripeConfig {
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".to_string()))?;

        let request_timeout = std::env::var("STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));

        Ok(Self {
            secret_key,
            request_timeout,
        })
    }
}

/// Statement descriptor shown on members' bank statements.
fn statement_descriptor(name: &str) -> String {
    let prefix: String = name.to_uppercase().chars().take(10).collect();

    format!("famshare-{prefix}")
}

fn registration_failed(err: impl Display) -> BillingError {
    BillingError::ProviderRegistrationFailed(err.to_string())
}

fn update_failed(err: impl Display) -> BillingError {
    BillingError::ProviderUpdateFailed {
        detail: err.to_string(),
        pricing: PricingState::Unchanged,
    }
}

/// Stripe gateway holding the API client and the per-request timeout.
pub struct StripeGateway {
    client: stripe::Client,
    request_timeout: Duration,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: stripe::Client::new(config.secret_key),
            request_timeout: config.request_timeout,
        }
    }

    pub fn from_env() -> BillingResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, String>
    where
        F: std::future::Future<Output = Result<T, stripe::StripeError>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(format!("{operation}: {err}")),
            Err(_) => Err(format!("{operation}: timed out")),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeGateway {
    async fn create_product(&self, product_id: &str, name: &str) -> BillingResult<()> {
        let descriptor = statement_descriptor(name);

        let mut params = CreateProduct::new(name);
        params.id = Some(product_id);
        params.statement_descriptor = Some(&descriptor);

        self.bounded("products.create", Product::create(&self.client, params))
            .await
            .map_err(registration_failed)?;

        Ok(())
    }

    async fn create_plan(
        &self,
        plan_id: &str,
        product_id: &str,
        amount: i64,
    ) -> BillingResult<()> {
        let mut params = CreatePlan::new(Currency::EUR, PlanInterval::Month);
        params.id = Some(plan_id);
        params.product = Some(IdOrCreate::Id(product_id));
        params.amount = Some(amount);

        self.bounded("plans.create", Plan::create(&self.client, params))
            .await
            .map_err(registration_failed)?;

        Ok(())
    }

    async fn delete_plan(&self, plan_id: &str) -> BillingResult<()> {
        let id = plan_id.parse::<PlanId>().map_err(update_failed)?;

        self.bounded("plans.delete", Plan::delete(&self.client, &id))
            .await
            .map_err(update_failed)?;

        Ok(())
    }

    async fn delete_product(&self, product_id: &str) -> BillingResult<()> {
        let id = product_id.parse::<ProductId>().map_err(update_failed)?;

        self.bounded("products.delete", Product::delete(&self.client, &id))
            .await
            .map_err(update_failed)?;

        Ok(())
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        billing_anchor: OffsetDateTime,
    ) -> BillingResult<String> {
        let customer = customer_id
            .parse::<CustomerId>()
            .map_err(registration_failed)?;

        let mut params = CreateSubscription::new(customer);
        params.items = Some(vec![CreateSubscriptionItems {
            price: Some(plan_id.to_string()),
            ..Default::default()
        }]);
        params.billing_cycle_anchor = Some(billing_anchor.unix_timestamp());

        let subscription = self
            .bounded(
                "subscriptions.create",
                Subscription::create(&self.client, params),
            )
            .await
            .map_err(registration_failed)?;

        Ok(subscription.id.to_string())
    }

    async fn delete_subscription(&self, subscription_id: &str) -> BillingResult<()> {
        let id = subscription_id
            .parse::<SubscriptionId>()
            .map_err(update_failed)?;

        let params = CancelSubscription {
            cancellation_details: None,
            invoice_now: None,
            prorate: None,
        };

        self.bounded(
            "subscriptions.delete",
            Subscription::cancel(&self.client, &id, params),
        )
        .await
        .map_err(update_failed)?;

        Ok(())
    }

    async fn create_customer(
        &self,
        email: &str,
        source_token: &str,
        user_uuid: Uuid,
    ) -> BillingResult<String> {
        let token = source_token.parse().map_err(registration_failed)?;

        let mut metadata = HashMap::new();
        metadata.insert("user_uuid".to_string(), user_uuid.to_string());

        let mut params = CreateCustomer::new();
        params.email = Some(email);
        params.source = Some(PaymentSourceParams::Token(token));
        params.metadata = Some(metadata);

        let customer = self
            .bounded("customers.create", Customer::create(&self.client, params))
            .await
            .map_err(registration_failed)?;

        Ok(customer.id.to_string())
    }
}
