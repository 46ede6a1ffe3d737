// src/testkit.rs
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::FetchError;
use crate::models::{
    Agent, AgentField, AgentId, Channels, Deal, DealField, DealFilter, Listing, ListingField,
    ListingFilter, ListingStatus,
};
use crate::services::crm::RecordFetcher;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn timestamp(raw: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(raw).unwrap()
}

pub fn agent(id: AgentId, name: &str, email: &str) -> Agent {
    Agent {
        id,
        display_name: name.to_string(),
        email: Some(email.to_string()),
        ..Default::default()
    }
}

pub fn closed_deal(id: u64, agent_id: AgentId, close: NaiveDate, opportunity: f64) -> Deal {
    Deal {
        id,
        assigned_agent_id: agent_id,
        close_date: Some(close),
        opportunity,
        gross_commission: 0.0,
        stage: "WON".to_string(),
        closed: true,
        last_activity: None,
    }
}

pub fn listing(id: u64, email: &str, status: ListingStatus, created: &str, price: f64) -> Listing {
    Listing {
        id,
        agent_email: email.to_string(),
        status,
        channels: Channels::default(),
        price,
        created_time: Some(timestamp(created)),
    }
}

/// Fetcher over fixed vectors that counts calls and can be told to fail.
#[derive(Default)]
pub struct MemoryFetcher {
    pub deals: Mutex<Vec<Deal>>,
    pub listings: Mutex<Vec<Listing>>,
    pub agents: Mutex<Vec<Agent>>,
    pub deal_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
    pub agent_calls: AtomicUsize,
    pub fail: AtomicBool,
    pub deal_limit: Mutex<Option<usize>>,
}

impl MemoryFetcher {
    pub fn new(deals: Vec<Deal>, listings: Vec<Listing>, agents: Vec<Agent>) -> Self {
        MemoryFetcher {
            deals: Mutex::new(deals),
            listings: Mutex::new(listings),
            agents: Mutex::new(agents),
            ..Default::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.deal_calls.load(Ordering::SeqCst)
            + self.listing_calls.load(Ordering::SeqCst)
            + self.agent_calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Lets the next `calls` deal fetches through, then fails every later one.
    pub fn fail_deals_after(&self, calls: usize) {
        let served = self.deal_calls.load(Ordering::SeqCst);
        *self.deal_limit.lock().unwrap() = Some(served + calls);
    }

    fn check(&self) -> Result<(), FetchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(rate_limited());
        }
        Ok(())
    }
}

fn rate_limited() -> FetchError {
    FetchError::Api {
        code: "QUERY_LIMIT_EXCEEDED".to_string(),
        description: "Too many requests".to_string(),
    }
}

#[async_trait]
impl RecordFetcher for MemoryFetcher {
    async fn list_deals(
        &self,
        filter: &DealFilter,
        _select: &[DealField],
    ) -> Result<Vec<Deal>, FetchError> {
        let served = self.deal_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if matches!(*self.deal_limit.lock().unwrap(), Some(limit) if served >= limit) {
            return Err(rate_limited());
        }
        let deals = self.deals.lock().unwrap();
        Ok(deals.iter().filter(|deal| filter.matches(deal)).cloned().collect())
    }

    async fn list_listings(
        &self,
        filter: &ListingFilter,
        _select: &[ListingField],
    ) -> Result<Vec<Listing>, FetchError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let listings = self.listings.lock().unwrap();
        Ok(listings
            .iter()
            .filter(|listing| listing.agent_email == filter.agent_email)
            .cloned()
            .collect())
    }

    async fn list_active_agents(&self, _select: &[AgentField]) -> Result<Vec<Agent>, FetchError> {
        self.agent_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.agents.lock().unwrap().clone())
    }

    async fn get_agent(
        &self,
        id: AgentId,
        _select: &[AgentField],
    ) -> Result<Option<Agent>, FetchError> {
        self.agent_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let agents = self.agents.lock().unwrap();
        Ok(agents.iter().find(|agent| agent.id == id).cloned())
    }
}
