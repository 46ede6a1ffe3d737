// tests/common/mod.rs
use agent_dashboard::error::FetchError;
use agent_dashboard::models::{
    Agent, AgentField, AgentId, Deal, DealField, DealFilter, Listing, ListingField, ListingFilter,
};
use agent_dashboard::services::crm::RecordFetcher;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Canned CRM data for driving the HTTP layer.
#[derive(Default)]
pub struct StubCrm {
    pub deals: Vec<Deal>,
    pub listings: Vec<Listing>,
    pub agents: Vec<Agent>,
    pub calls: AtomicUsize,
    pub offline: AtomicBool,
}

impl StubCrm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Malformed("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordFetcher for StubCrm {
    async fn list_deals(
        &self,
        filter: &DealFilter,
        _: &[DealField],
    ) -> Result<Vec<Deal>, FetchError> {
        self.touch()?;
        Ok(self.deals.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    async fn list_listings(
        &self,
        filter: &ListingFilter,
        _: &[ListingField],
    ) -> Result<Vec<Listing>, FetchError> {
        self.touch()?;
        Ok(self
            .listings
            .iter()
            .filter(|l| l.agent_email == filter.agent_email)
            .cloned()
            .collect())
    }

    async fn list_active_agents(&self, _: &[AgentField]) -> Result<Vec<Agent>, FetchError> {
        self.touch()?;
        Ok(self.agents.clone())
    }

    async fn get_agent(&self, id: AgentId, _: &[AgentField]) -> Result<Option<Agent>, FetchError> {
        self.touch()?;
        Ok(self.agents.iter().find(|a| a.id == id).cloned())
    }
}

pub fn agent(id: AgentId, name: &str) -> Agent {
    Agent {
        id,
        display_name: name.to_string(),
        email: Some(format!("agent{}@example.com", id)),
        ..Default::default()
    }
}

pub fn won_deal(id: u64, agent_id: AgentId, close: NaiveDate, opportunity: f64) -> Deal {
    Deal {
        id,
        assigned_agent_id: agent_id,
        close_date: Some(close),
        opportunity,
        gross_commission: opportunity * 0.02,
        stage: "WON".to_string(),
        closed: true,
        last_activity: None,
    }
}
