//! Postgres implementation of the storage contracts.
//!
//! Queries are runtime `query_as` calls bound to the entity structs. The
//! subscription insert relies on the `subscriptions_plan_user_key` constraint
//! so concurrent redeems of the same plan by the same user collapse into an
//! `AlreadySubscribed` error instead of a duplicate row.

use async_trait::async_trait;
use famshare_shared::{Connection, Invite, Plan, Subscription, SubscriptionStatus, User};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::store::{ConnectionStore, InviteStore, PlanStore, SubscriptionStore, UserStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_discord_id(&self, discord_id: &str) -> BillingResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE discord_id = $1")
            .bind(discord_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn insert(&self, user: &User) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (uuid, discord_id, email, access_level, stripe_customer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.uuid)
        .bind(&user.discord_id)
        .bind(&user.email)
        .bind(user.access_level)
        .bind(&user.stripe_customer_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_stripe_customer(&self, uuid: Uuid, stripe_customer_id: &str) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET stripe_customer_id = $2,
                updated_at = $3
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .bind(stripe_customer_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<Plan>> {
        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(plan)
    }

    async fn find_by_owner(&self, owner_uuid: Uuid) -> BillingResult<Vec<Plan>> {
        let plans = sqlx::query_as::<_, Plan>(
            "SELECT * FROM plans WHERE owner_uuid = $1 ORDER BY created_at",
        )
        .bind(owner_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(plans)
    }

    async fn insert(&self, plan: &Plan) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO plans
                (uuid, name, amount, fee_basis_points, payment_day, owner_uuid,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(plan.uuid)
        .bind(&plan.name)
        .bind(plan.amount)
        .bind(plan.fee_basis_points)
        .bind(plan.payment_day)
        .bind(plan.owner_uuid)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_name(&self, uuid: Uuid, name: &str) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE plans
            SET name = $2,
                updated_at = $3
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .bind(name)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, uuid: Uuid) -> BillingResult<()> {
        sqlx::query("DELETE FROM plans WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn members(&self, plan_uuid: Uuid) -> BillingResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.*
            FROM users u
            INNER JOIN subscriptions s ON s.user_uuid = u.uuid
            WHERE s.plan_uuid = $1
              AND s.status IN ('JOINED', 'ACTIVE', 'LATE')
            ORDER BY s.created_at
            "#,
        )
        .bind(plan_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count_paying_members(&self, plan_uuid: Uuid) -> BillingResult<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM subscriptions
            WHERE plan_uuid = $1
              AND status IN ('JOINED', 'ACTIVE', 'LATE')
            "#,
        )
        .bind(plan_uuid)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u32)
    }
}

#[async_trait]
impl InviteStore for PgStore {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<Invite>> {
        let invite = sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE uuid = $1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invite)
    }

    async fn find_by_short_code(&self, short_code: &str) -> BillingResult<Option<Invite>> {
        let invite = sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE short_code = $1")
            .bind(short_code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invite)
    }

    async fn find_by_plan(&self, plan_uuid: Uuid) -> BillingResult<Vec<Invite>> {
        let invites = sqlx::query_as::<_, Invite>(
            "SELECT * FROM invites WHERE plan_uuid = $1 ORDER BY created_at",
        )
        .bind(plan_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(invites)
    }

    async fn short_code_exists(&self, short_code: &str) -> BillingResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invites WHERE short_code = $1")
            .bind(short_code)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn insert(&self, invite: &Invite) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invites
                (uuid, short_code, cancelled, expires_at, plan_uuid, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(invite.uuid)
        .bind(&invite.short_code)
        .bind(invite.cancelled)
        .bind(invite.expires_at)
        .bind(invite.plan_uuid)
        .bind(invite.created_at)
        .bind(invite.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_cancelled(&self, uuid: Uuid) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE invites
            SET cancelled = TRUE,
                updated_at = $2
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn redeemer_of(&self, invite_uuid: Uuid) -> BillingResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.*
            FROM users u
            INNER JOIN subscriptions s ON s.user_uuid = u.uuid
            WHERE s.invite_uuid = $1
            "#,
        )
        .bind(invite_uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn find_by_uuid(&self, uuid: Uuid) -> BillingResult<Option<Subscription>> {
        let subscription =
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE uuid = $1")
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;

        Ok(subscription)
    }

    async fn find_by_user(&self, user_uuid: Uuid) -> BillingResult<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE user_uuid = $1 ORDER BY created_at",
        )
        .bind(user_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn find_by_plan(&self, plan_uuid: Uuid) -> BillingResult<Vec<Subscription>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE plan_uuid = $1 ORDER BY created_at",
        )
        .bind(plan_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(subscriptions)
    }

    async fn find_by_plan_and_user(
        &self,
        plan_uuid: Uuid,
        user_uuid: Uuid,
    ) -> BillingResult<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE plan_uuid = $1 AND user_uuid = $2",
        )
        .bind(plan_uuid)
        .bind(user_uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn insert(&self, subscription: &Subscription) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (uuid, status, stripe_id, plan_uuid, user_uuid, invite_uuid,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(subscription.uuid)
        .bind(subscription.status)
        .bind(&subscription.stripe_id)
        .bind(subscription.plan_uuid)
        .bind(subscription.user_uuid)
        .bind(subscription.invite_uuid)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db)
                if db.constraint() == Some("subscriptions_plan_user_key") =>
            {
                BillingError::AlreadySubscribed
            }
            _ => BillingError::Database(err),
        })?;

        Ok(())
    }

    async fn update_status(&self, uuid: Uuid, status: SubscriptionStatus) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2,
                updated_at = $3
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .bind(status)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ConnectionStore for PgStore {
    async fn find_by_owner(&self, owner_uuid: Uuid) -> BillingResult<Vec<Connection>> {
        let connections = sqlx::query_as::<_, Connection>(
            "SELECT * FROM connections WHERE owner_uuid = $1 ORDER BY created_at",
        )
        .bind(owner_uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(connections)
    }

    async fn upsert(&self, connection: &Connection) -> BillingResult<Connection> {
        let stored = sqlx::query_as::<_, Connection>(
            r#"
            INSERT INTO connections
                (uuid, kind, owner_uuid, external_user_id, identifier, picture, link,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ON CONSTRAINT connections_owner_kind_key DO UPDATE
            SET external_user_id = EXCLUDED.external_user_id,
                identifier = EXCLUDED.identifier,
                picture = EXCLUDED.picture,
                link = EXCLUDED.link,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(connection.uuid)
        .bind(connection.kind)
        .bind(connection.owner_uuid)
        .bind(&connection.external_user_id)
        .bind(&connection.identifier)
        .bind(&connection.picture)
        .bind(&connection.link)
        .bind(connection.created_at)
        .bind(connection.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }
}
