//! Invite engine.
//!
//! Mints unique short codes for joining a plan and tracks cancellation.
//! Consumption is never stored: an invite is consumed iff a subscription
//! references it, resolved through [`InviteStore::redeemer_of`].

use std::sync::Arc;

use famshare_shared::{Invite, User};
use rand::Rng;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::store::{InviteStore, PlanStore};

const SHORT_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";
const SHORT_CODE_LENGTH: usize = 6;

/// At 36^6 codes a collision retry is already unlikely; the bound exists so
/// a persistence fault can never spin the generation loop forever.
const MAX_SHORT_CODE_ATTEMPTS: u32 = 32;

fn random_short_code() -> String {
    let mut rng = rand::rng();

    (0..SHORT_CODE_LENGTH)
        .map(|_| {
            let index = rng.random_range(0..SHORT_CODE_ALPHABET.len());
            SHORT_CODE_ALPHABET[index] as char
        })
        .collect()
}

#[derive(Clone)]
pub struct InviteService {
    invites: Arc<dyn InviteStore>,
    plans: Arc<dyn PlanStore>,
}

impl InviteService {
    pub fn new(invites: Arc<dyn InviteStore>, plans: Arc<dyn PlanStore>) -> Self {
        Self { invites, plans }
    }

    /// Produce a short code that does not collide with any existing invite.
    ///
    /// Lookup failures abort immediately; only a genuine collision retries.
    pub async fn generate_short_code(&self) -> BillingResult<String> {
        for _ in 0..MAX_SHORT_CODE_ATTEMPTS {
            let code = random_short_code();

            if !self.invites.short_code_exists(&code).await? {
                return Ok(code);
            }
        }

        Err(BillingError::ShortCodeSpaceExhausted)
    }

    /// Mint and persist a new invite for a plan.
    pub async fn create(
        &self,
        plan_uuid: Uuid,
        expires_at: OffsetDateTime,
    ) -> BillingResult<Invite> {
        let short_code = self.generate_short_code().await?;
        let invite = Invite::new(short_code, expires_at, plan_uuid);

        self.invites.insert(&invite).await?;

        tracing::info!(
            invite_uuid = %invite.uuid,
            plan_uuid = %plan_uuid,
            short_code = %invite.short_code,
            "Created invite"
        );

        Ok(invite)
    }

    /// The user who has consumed this invite, if any.
    pub async fn redeemer_of(&self, invite: &Invite) -> BillingResult<Option<User>> {
        self.invites.redeemer_of(invite.uuid).await
    }

    /// Cancel an unconsumed invite. Owner-only; cancelling twice is a no-op.
    pub async fn cancel(&self, actor_uuid: Uuid, invite: &Invite) -> BillingResult<Invite> {
        let plan = self
            .plans
            .find_by_uuid(invite.plan_uuid)
            .await?
            .ok_or_else(|| BillingError::not_found("Plan", invite.plan_uuid))?;

        if plan.owner_uuid != actor_uuid {
            return Err(BillingError::Forbidden);
        }

        if invite.cancelled {
            return Ok(invite.clone());
        }

        if self.invites.redeemer_of(invite.uuid).await?.is_some() {
            return Err(BillingError::InviteAlreadyUsed);
        }

        self.invites.set_cancelled(invite.uuid).await?;

        tracing::info!(invite_uuid = %invite.uuid, "Cancelled invite");

        Ok(Invite {
            cancelled: true,
            ..invite.clone()
        })
    }

    pub async fn find_by_short_code(&self, short_code: &str) -> BillingResult<Option<Invite>> {
        self.invites.find_by_short_code(short_code).await
    }

    pub async fn get_by_short_code(&self, short_code: &str) -> BillingResult<Invite> {
        self.invites
            .find_by_short_code(short_code)
            .await?
            .ok_or_else(|| BillingError::not_found("Invite", short_code))
    }

    pub async fn find_by_plan(&self, plan_uuid: Uuid) -> BillingResult<Vec<Invite>> {
        self.invites.find_by_plan(plan_uuid).await
    }
}
