// src/bin/test_agent.rs
use agent_dashboard::config::Config;
use agent_dashboard::services::bitrix::{BitrixClient, BitrixConfig};
use agent_dashboard::services::cache::ResponseCache;
use agent_dashboard::services::dashboard::Dashboard;
use anyhow::{Context, Result};
use chrono::Utc;
use dotenv::dotenv;
use log::{error, info};
use std::env;
use std::sync::Arc;

/// Runs both dashboard operations for one agent against the live CRM.
///
/// Usage: `test_agent <agent-id> [--yearly]`
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let mut args = env::args().skip(1);
    let agent_id: u64 = args
        .next()
        .context("usage: test_agent <agent-id> [--yearly]")?
        .parse()
        .context("agent id must be a number")?;
    let yearly = args.any(|arg| arg == "--yearly");

    let config = Config::from_env()?;
    let fetcher = Arc::new(BitrixClient::new(BitrixConfig {
        webhook_url: config.bitrix_webhook_url.clone(),
        listings_entity_type_id: config.listings_entity_type_id,
    }));
    let dashboard = Dashboard::new(fetcher, Arc::new(ResponseCache::new()), config.engine);

    info!("Fetching performance for agent {} (yearly: {})", agent_id, yearly);
    match dashboard.get_performance(agent_id, yearly, Utc::now()).await {
        Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        Err(e) => error!("Performance failed: {}", e),
    }

    info!("Fetching ranking for agent {}", agent_id);
    match dashboard.get_ranking(agent_id, Utc::now()).await {
        Ok(ranking) => println!("{}", serde_json::to_string_pretty(&ranking)?),
        Err(e) => error!("Ranking failed: {}", e),
    }

    Ok(())
}
