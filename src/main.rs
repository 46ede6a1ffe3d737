use agent_dashboard::config::Config;
use agent_dashboard::routes;
use agent_dashboard::services::bitrix::{BitrixClient, BitrixConfig};
use agent_dashboard::services::cache::ResponseCache;
use agent_dashboard::services::dashboard::Dashboard;
use chrono::Utc;
use dotenv::dotenv;
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = Config::from_env()?;
    info!("Using PORT: {}", config.port);

    // Bind to 0.0.0.0 so the service is reachable inside containers
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    let fetcher = Arc::new(BitrixClient::new(BitrixConfig {
        webhook_url: config.bitrix_webhook_url.clone(),
        listings_entity_type_id: config.listings_entity_type_id,
    }));
    let cache = Arc::new(ResponseCache::new());
    let dashboard = Arc::new(Dashboard::new(fetcher, cache.clone(), config.engine.clone()));

    // Expired entries are already ignored on read; this only frees memory.
    let sweep_every = Duration::from_secs(config.cache_sweep_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired(Utc::now());
            if purged > 0 {
                debug!("Purged {} expired cache entries", purged);
            }
        }
    });

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization", "x-requested-with"])
        .allow_methods(vec!["GET", "OPTIONS"]);

    // Set up routes
    let api = routes::routes(dashboard).with(cors);
    info!("Routes configured successfully with CORS.");

    // Start the server
    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
