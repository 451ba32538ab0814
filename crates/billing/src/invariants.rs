//! Billing invariants.
//!
//! Runnable consistency checks over the plan/invite/subscription tables.
//! Each check is a real SQL query that only reads; violations carry enough
//! context to debug the affected rows. Meant to be run after mutations or
//! on an operational schedule.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// Result of running a single invariant check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated.
    pub invariant: String,
    /// Rows affected.
    pub entity_uuids: Vec<Uuid>,
    /// Human-readable description of the violation.
    pub description: String,
    /// Additional context for debugging.
    pub context: serde_json::Value,
    /// Severity level.
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - members may be billed incorrectly.
    Critical,
    /// High - data inconsistency that needs attention.
    High,
    /// Medium - potential issue, should investigate.
    Medium,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// Summary of all invariant checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct OwnerSubscriptionRow {
    subscription_uuid: Uuid,
    plan_uuid: Uuid,
    user_uuid: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct CancelledConsumedRow {
    invite_uuid: Uuid,
    subscription_uuid: Uuid,
    plan_uuid: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct DuplicateSubscriptionRow {
    plan_uuid: Uuid,
    user_uuid: Uuid,
    sub_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct InvitePlanMismatchRow {
    subscription_uuid: Uuid,
    subscription_plan: Uuid,
    invite_plan: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct MissingCustomerRow {
    user_uuid: Uuid,
    email: String,
    subscription_uuid: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct MissingRemoteRow {
    subscription_uuid: Uuid,
    plan_uuid: Uuid,
    status: String,
}

/// Service for running billing invariant checks.
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all invariant checks and return a summary.
    pub async fn run_all_checks(&self) -> BillingResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_subscriber_is_not_owner().await?);
        violations.extend(self.check_cancelled_invite_unconsumed().await?);
        violations.extend(self.check_single_subscription_per_plan_user().await?);
        violations.extend(self.check_invite_belongs_to_subscription_plan().await?);
        violations.extend(self.check_paying_member_has_customer().await?);
        violations.extend(self.check_paying_subscription_has_remote().await?);

        let checks_run = 6;
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: No subscription where the subscriber owns the plan.
    ///
    /// The owner is counted as a payer implicitly; a subscription of their
    /// own would double-charge them and skew the split.
    async fn check_subscriber_is_not_owner(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<OwnerSubscriptionRow> = sqlx::query_as(
            r#"
            SELECT s.uuid AS subscription_uuid, s.plan_uuid, s.user_uuid
            FROM subscriptions s
            JOIN plans p ON p.uuid = s.plan_uuid
            WHERE s.user_uuid = p.owner_uuid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "subscriber_is_not_owner".to_string(),
                entity_uuids: vec![row.subscription_uuid],
                description: "Plan owner holds a subscription to their own plan".to_string(),
                context: serde_json::json!({
                    "plan_uuid": row.plan_uuid,
                    "user_uuid": row.user_uuid,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: Cancelled invites are never consumed.
    ///
    /// Cancellation and consumption are mutually exclusive terminal states.
    async fn check_cancelled_invite_unconsumed(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<CancelledConsumedRow> = sqlx::query_as(
            r#"
            SELECT i.uuid AS invite_uuid, s.uuid AS subscription_uuid, i.plan_uuid
            FROM invites i
            JOIN subscriptions s ON s.invite_uuid = i.uuid
            WHERE i.cancelled = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "cancelled_invite_unconsumed".to_string(),
                entity_uuids: vec![row.invite_uuid],
                description: "Cancelled invite is referenced by a subscription".to_string(),
                context: serde_json::json!({
                    "subscription_uuid": row.subscription_uuid,
                    "plan_uuid": row.plan_uuid,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 3: At most one subscription per (plan, user).
    ///
    /// Backstop behind the unique constraint; more than one means the
    /// member would be billed twice for the same plan.
    async fn check_single_subscription_per_plan_user(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<DuplicateSubscriptionRow> = sqlx::query_as(
            r#"
            SELECT plan_uuid, user_uuid, COUNT(*) AS sub_count
            FROM subscriptions
            GROUP BY plan_uuid, user_uuid
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "single_subscription_per_plan_user".to_string(),
                entity_uuids: vec![row.plan_uuid],
                description: format!(
                    "User has {} subscriptions to the same plan (expected at most 1)",
                    row.sub_count
                ),
                context: serde_json::json!({
                    "user_uuid": row.user_uuid,
                    "subscription_count": row.sub_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 4: A subscription's invite belongs to the same plan.
    async fn check_invite_belongs_to_subscription_plan(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<InvitePlanMismatchRow> = sqlx::query_as(
            r#"
            SELECT
                s.uuid AS subscription_uuid,
                s.plan_uuid AS subscription_plan,
                i.plan_uuid AS invite_plan
            FROM subscriptions s
            JOIN invites i ON i.uuid = s.invite_uuid
            WHERE i.plan_uuid != s.plan_uuid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "invite_belongs_to_subscription_plan".to_string(),
                entity_uuids: vec![row.subscription_uuid],
                description: "Subscription references an invite from a different plan"
                    .to_string(),
                context: serde_json::json!({
                    "subscription_plan": row.subscription_plan,
                    "invite_plan": row.invite_plan,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 5: Paying members have a provider customer.
    ///
    /// A paying subscription cannot bill without a customer to charge.
    async fn check_paying_member_has_customer(&self) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<MissingCustomerRow> = sqlx::query_as(
            r#"
            SELECT u.uuid AS user_uuid, u.email, s.uuid AS subscription_uuid
            FROM users u
            JOIN subscriptions s ON s.user_uuid = u.uuid
            WHERE s.status IN ('JOINED', 'ACTIVE', 'LATE')
              AND u.stripe_customer_id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "paying_member_has_customer".to_string(),
                entity_uuids: vec![row.user_uuid],
                description: format!(
                    "User '{}' holds a paying subscription but has no provider customer",
                    row.email
                ),
                context: serde_json::json!({
                    "subscription_uuid": row.subscription_uuid,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 6: Paying subscriptions have a remote subscription id.
    async fn check_paying_subscription_has_remote(
        &self,
    ) -> BillingResult<Vec<InvariantViolation>> {
        let rows: Vec<MissingRemoteRow> = sqlx::query_as(
            r#"
            SELECT uuid AS subscription_uuid, plan_uuid, status::TEXT AS status
            FROM subscriptions
            WHERE status IN ('JOINED', 'ACTIVE', 'LATE')
              AND stripe_id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "paying_subscription_has_remote".to_string(),
                entity_uuids: vec![row.subscription_uuid],
                description: format!(
                    "Subscription in status '{}' has no remote provider record",
                    row.status
                ),
                context: serde_json::json!({
                    "plan_uuid": row.plan_uuid,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Run a single invariant check by name.
    pub async fn run_check(&self, name: &str) -> BillingResult<Vec<InvariantViolation>> {
        match name {
            "subscriber_is_not_owner" => self.check_subscriber_is_not_owner().await,
            "cancelled_invite_unconsumed" => self.check_cancelled_invite_unconsumed().await,
            "single_subscription_per_plan_user" => {
                self.check_single_subscription_per_plan_user().await
            }
            "invite_belongs_to_subscription_plan" => {
                self.check_invite_belongs_to_subscription_plan().await
            }
            "paying_member_has_customer" => self.check_paying_member_has_customer().await,
            "paying_subscription_has_remote" => self.check_paying_subscription_has_remote().await,
            _ => Ok(vec![]),
        }
    }

    /// Get list of all available invariant checks.
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "subscriber_is_not_owner",
            "cancelled_invite_unconsumed",
            "single_subscription_per_plan_user",
            "invite_belongs_to_subscription_plan",
            "paying_member_has_customer",
            "paying_subscription_has_remote",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
    }

    #[test]
    fn test_available_checks() {
        let checks = InvariantChecker::available_checks();
        assert_eq!(checks.len(), 6);
        assert!(checks.contains(&"subscriber_is_not_owner"));
        assert!(checks.contains(&"cancelled_invite_unconsumed"));
    }
}
