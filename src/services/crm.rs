// src/services/crm.rs
use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{
    Agent, AgentField, AgentId, Deal, DealField, DealFilter, Listing, ListingField, ListingFilter,
};

/// Read-only access to CRM records.
///
/// Implementations hand back complete collections: any paging happens behind
/// this trait. A failure is reported as an error, never as an empty result.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn list_deals(
        &self,
        filter: &DealFilter,
        select: &[DealField],
    ) -> Result<Vec<Deal>, FetchError>;

    async fn list_listings(
        &self,
        filter: &ListingFilter,
        select: &[ListingField],
    ) -> Result<Vec<Listing>, FetchError>;

    /// Active users, in the order the CRM lists them.
    async fn list_active_agents(&self, select: &[AgentField]) -> Result<Vec<Agent>, FetchError>;

    async fn get_agent(
        &self,
        id: AgentId,
        select: &[AgentField],
    ) -> Result<Option<Agent>, FetchError>;
}
