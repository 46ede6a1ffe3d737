// src/handlers/performance.rs
use chrono::Utc;
use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::agent_id_param;
use super::error::ApiError;
use crate::error::DashboardError;
use crate::services::dashboard::Dashboard;

pub async fn get_performance(
    query: HashMap<String, String>,
    dashboard: Arc<Dashboard>,
) -> Result<Json, Rejection> {
    let agent_id = agent_id_param(&query).map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    let yearly = query.get("yearly").map(|v| v == "true").unwrap_or(false);
    info!("Handling performance request for agent {} (yearly: {})", agent_id, yearly);

    match dashboard.get_performance(agent_id, yearly, Utc::now()).await {
        Ok(report) => Ok(warp::reply::json(&report)),
        Err(e) => {
            if let DashboardError::Upstream(ref cause) = e {
                error!("Failed to build performance for agent {}: {}", agent_id, cause);
            }
            Err(warp::reject::custom(ApiError::from(e)))
        }
    }
}
