use clap::Parser;
use config::{Environment, Map};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Cost bounds bcrypt accepts when hashing.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Command-line flags. A non-empty environment variable wins over its flag.
#[derive(Debug, Default, Parser)]
#[command(name = "server", about = "Loyalty points ledger with accrual reconciliation")]
pub struct Cli {
    /// HTTP listen address (RUN_ADDRESS)
    #[arg(short = 'a', long = "address")]
    pub run_address: Option<String>,

    /// PostgreSQL connection string (DATABASE_URI)
    #[arg(short = 'd', long = "database-uri")]
    pub database_uri: Option<String>,

    /// Accrual system base URL (ACCRUAL_SYSTEM_ADDRESS)
    #[arg(short = 'r', long = "accrual-address")]
    pub accrual_system_address: Option<String>,

    /// Token signing secret (JWT_SECRET)
    #[arg(long = "jwt-secret")]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub run_address: String,
    pub database_uri: String,
    pub accrual_system_address: String,
    pub jwt_secret: String,
    pub jwt_previous_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub reconcile_interval_secs: u64,
    pub reconcile_batch_size: i64,
    pub accrual_timeout_secs: u64,
    pub accrual_default_retry_after_secs: u64,
}

impl Config {
    /// Flags from argv, then the process environment.
    pub fn load() -> AppResult<Self> {
        Self::from_sources(Cli::parse(), None)
    }

    /// `env` replaces the process environment when given.
    pub fn from_sources(cli: Cli, env: Option<Map<String, String>>) -> AppResult<Self> {
        let mut builder = config::Config::builder()
            .set_default("run_address", cli.run_address.unwrap_or_else(|| "localhost:8080".to_string()))?
            .set_default("token_ttl_hours", 24)?
            .set_default("bcrypt_cost", i64::from(bcrypt::DEFAULT_COST))?
            .set_default("reconcile_interval_secs", 60)?
            .set_default("reconcile_batch_size", 100)?
            .set_default("accrual_timeout_secs", 5)?
            .set_default("accrual_default_retry_after_secs", 60)?;

        // required values only get a default when a flag supplies one
        for (key, flag) in [
            ("database_uri", cli.database_uri),
            ("accrual_system_address", cli.accrual_system_address),
            ("jwt_secret", cli.jwt_secret),
        ] {
            if let Some(value) = flag {
                builder = builder.set_default(key, value)?;
            }
        }

        let config: Config = builder
            .add_source(
                Environment::default()
                    .try_parsing(true)
                    .ignore_empty(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("RUN_ADDRESS", &self.run_address),
            ("DATABASE_URI", &self.database_uri),
            ("ACCRUAL_SYSTEM_ADDRESS", &self.accrual_system_address),
            ("JWT_SECRET", &self.jwt_secret),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.reconcile_interval_secs == 0 {
            return Err(AppError::Config("RECONCILE_INTERVAL_SECS must be positive".to_string()));
        }
        if self.reconcile_batch_size <= 0 {
            return Err(AppError::Config("RECONCILE_BATCH_SIZE must be positive".to_string()));
        }
        if self.token_ttl_hours <= 0 {
            return Err(AppError::Config("TOKEN_TTL_HOURS must be positive".to_string()));
        }
        if self.accrual_timeout_secs == 0 {
            return Err(AppError::Config("ACCRUAL_TIMEOUT_SECS must be positive".to_string()));
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(AppError::Config(format!(
                "BCRYPT_COST must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            )));
        }
        Ok(())
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn accrual_timeout(&self) -> Duration {
        Duration::from_secs(self.accrual_timeout_secs)
    }

    pub fn accrual_default_retry_after(&self) -> Duration {
        Duration::from_secs(self.accrual_default_retry_after_secs)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}
