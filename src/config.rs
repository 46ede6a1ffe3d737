// src/config.rs
use anyhow::{bail, Context, Result};
use log::warn;
use std::env;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
pub const DEFAULT_CACHE_SWEEP_SECONDS: u64 = 60;
pub const DEFAULT_MONTH_FETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_STALE_DEAL_DAYS: i64 = 14;
pub const MAX_CACHE_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;
pub const MAX_STALE_DEAL_DAYS: i64 = 3650;

/// Tuning for the aggregation engine itself.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub cache_ttl_seconds: u64,
    pub month_fetch_concurrency: usize,
    pub stale_deal_days: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            month_fetch_concurrency: DEFAULT_MONTH_FETCH_CONCURRENCY,
            stale_deal_days: DEFAULT_STALE_DEAL_DAYS,
        }
    }
}

impl EngineSettings {
    /// Rejects values that would overflow date arithmetic or stall the engine.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_seconds > MAX_CACHE_TTL_SECONDS {
            bail!(
                "CACHE_TTL_SECONDS must be at most {}, got {}",
                MAX_CACHE_TTL_SECONDS,
                self.cache_ttl_seconds
            );
        }
        if self.month_fetch_concurrency == 0 {
            bail!("MONTH_FETCH_CONCURRENCY must be at least 1");
        }
        if !(0..=MAX_STALE_DEAL_DAYS).contains(&self.stale_deal_days) {
            bail!(
                "STALE_DEAL_DAYS must be between 0 and {}, got {}",
                MAX_STALE_DEAL_DAYS,
                self.stale_deal_days
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bitrix_webhook_url: String,
    pub listings_entity_type_id: u32,
    pub cache_sweep_seconds: u64,
    pub engine: EngineSettings,
}

impl Config {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        let bitrix_webhook_url = env::var("BITRIX_WEBHOOK_URL")
            .context("BITRIX_WEBHOOK_URL must be set")?
            .trim_end_matches('/')
            .to_string();

        let listings_entity_type_id: u32 = env::var("LISTINGS_ENTITY_TYPE_ID")
            .context("LISTINGS_ENTITY_TYPE_ID must be set")?
            .parse()
            .context("LISTINGS_ENTITY_TYPE_ID must be a number")?;
        if listings_entity_type_id == 0 {
            bail!("LISTINGS_ENTITY_TYPE_ID must be positive");
        }

        let engine = EngineSettings {
            cache_ttl_seconds: var_or("CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)?,
            month_fetch_concurrency: var_or(
                "MONTH_FETCH_CONCURRENCY",
                DEFAULT_MONTH_FETCH_CONCURRENCY,
            )?,
            stale_deal_days: var_or("STALE_DEAL_DAYS", DEFAULT_STALE_DEAL_DAYS)?,
        };
        engine.validate()?;

        Ok(Config {
            port: var_or("PORT", DEFAULT_PORT)?,
            bitrix_webhook_url,
            listings_entity_type_id,
            cache_sweep_seconds: var_or("CACHE_SWEEP_SECONDS", DEFAULT_CACHE_SWEEP_SECONDS)?,
            engine,
        })
    }
}

fn var_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, raw)),
        Err(_) => {
            warn!("${} not set, defaulting to {}", name, default);
            Ok(default)
        }
    }
}
