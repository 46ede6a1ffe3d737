// src/error.rs
use thiserror::Error;

/// Failure of the CRM collaborator. Always surfaced, never read as "no records".
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("CRM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("CRM returned error {code}: {description}")]
    Api { code: String, description: String },

    #[error("malformed CRM data: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] FetchError),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
