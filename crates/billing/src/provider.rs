//! Payment provider contract.
//!
//! The engines are written against this trait; the Stripe implementation
//! lives in [`crate::stripe_gateway`]. Products and plans mirror local Plan
//! records 1:1 by shared id, while subscriptions and customers carry
//! provider-assigned ids.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Register the billing catalog entry for a plan.
    async fn create_product(&self, product_id: &str, name: &str) -> BillingResult<()>;

    /// Register a monthly recurring price for a product, in minor units.
    /// The provider rejects two active prices with the same id.
    async fn create_plan(&self, plan_id: &str, product_id: &str, amount: i64)
        -> BillingResult<()>;

    async fn delete_plan(&self, plan_id: &str) -> BillingResult<()>;

    async fn delete_product(&self, product_id: &str) -> BillingResult<()>;

    /// Create a recurring subscription for a customer on a plan's price,
    /// with the first billing cycle anchored at `billing_anchor`. Returns
    /// the provider-assigned subscription id.
    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        billing_anchor: OffsetDateTime,
    ) -> BillingResult<String>;

    async fn delete_subscription(&self, subscription_id: &str) -> BillingResult<()>;

    /// Create a customer with an attached payment source. Returns the
    /// provider-assigned customer id.
    async fn create_customer(
        &self,
        email: &str,
        source_token: &str,
        user_uuid: Uuid,
    ) -> BillingResult<String>;
}
