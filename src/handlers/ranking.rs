// src/handlers/ranking.rs
use chrono::Utc;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::agent_id_param;
use super::error::ApiError;
use crate::services::dashboard::Dashboard;

pub async fn get_ranking(
    query: HashMap<String, String>,
    dashboard: Arc<Dashboard>,
) -> Result<Json, Rejection> {
    let agent_id = agent_id_param(&query).map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    info!("Handling ranking request for agent {}", agent_id);

    let ranking = dashboard.get_ranking(agent_id, Utc::now()).await.map_err(|e| {
        warn!("Ranking for agent {} failed: {}", agent_id, e);
        warp::reject::custom(ApiError::from(e))
    })?;

    Ok(warp::reply::json(&ranking))
}
