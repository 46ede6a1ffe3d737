// src/handlers/mod.rs
use std::collections::HashMap;

use crate::error::DashboardError;
use crate::models::AgentId;

pub mod error;
pub mod performance;
pub mod ranking;

/// Reads the `id` query parameter as an agent id.
pub fn agent_id_param(query: &HashMap<String, String>) -> Result<AgentId, DashboardError> {
    let raw = match query.get("id").map(|id| id.trim()) {
        Some(id) if !id.is_empty() => id,
        _ => {
            return Err(DashboardError::Validation(
                "Missing required parameter 'id'".to_string(),
            ))
        }
    };
    raw.parse()
        .map_err(|_| DashboardError::Validation("Parameter 'id' must be a number".to_string()))
}
