use std::{sync::Arc, time::Duration};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{error, info};

use crate::{
    accrual::AccrualClient,
    api::handler::AppState,
    auth::{AuthService, TokenKeys},
    config::Config,
    error::AppResult,
    ledger::{BalanceLedger, LedgerRepository, LedgerStore, OrderLedger},
    reconciliation::{Reconciler, ReconciliationScheduler},
};

/// Wire every component from `config`. Storage failures here are fatal.
pub async fn initialize_app_state(config: &Config) -> AppResult<(AppState, ReconciliationScheduler)> {
    info!("Initializing application components ...");

    // Database pool
    let pool = initialize_database(&config.database_uri).await?;
    let store: Arc<dyn LedgerStore> = Arc::new(LedgerRepository::new(pool));

    // Ledgers
    let orders = OrderLedger::new(store.clone());
    let balances = BalanceLedger::new(store.clone());

    // Accrual oracle
    let oracle = Arc::new(AccrualClient::new(
        &config.accrual_system_address,
        config.accrual_timeout(),
        config.accrual_default_retry_after(),
    )?);
    info!("✅ Accrual oracle client ready for {}", config.accrual_system_address);

    let reconciler = Arc::new(Reconciler::new(
        orders.clone(),
        balances.clone(),
        oracle,
        config.reconcile_batch_size,
    ));
    let scheduler = ReconciliationScheduler::new(config.reconcile_interval(), reconciler.clone());

    // Auth
    if config.jwt_previous_secret.is_some() {
        info!("🔐 Previous token secret accepted for verification");
    }
    let keys = TokenKeys::new(
        &config.jwt_secret,
        config.jwt_previous_secret.as_deref(),
        config.token_ttl(),
    );
    let auth = Arc::new(AuthService::new(store, keys, config.bcrypt_cost));

    info!("✅ Application state initialized");
    Ok((
        AppState {
            orders,
            balances,
            auth,
            reconciler,
        },
        scheduler,
    ))
}

async fn initialize_database(database_uri: &str) -> AppResult<PgPool> {
    info!("🗄️ Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_uri)
        .await
        .map_err(|e| {
            error!("❌ Database connection failed: {}", e);
            e
        })?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("✅ Database migrations applied");

    Ok(pool)
}
