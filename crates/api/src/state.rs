//! Application state.

use std::sync::Arc;

use famshare_billing::BillingService;
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub billing: Arc<BillingService>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let billing = Arc::new(BillingService::from_env(pool.clone())?);
        tracing::info!("Stripe billing service initialized");

        Ok(Self {
            pool,
            config,
            billing,
        })
    }
}
