// src/models.rs
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

pub type AgentId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Deal {
    pub id: u64,
    pub assigned_agent_id: AgentId,
    pub close_date: Option<NaiveDate>,
    pub opportunity: f64,
    /// The commission recorded on the deal itself, as opposed to the flat
    /// ranking commission derived from `opportunity`.
    pub gross_commission: f64,
    pub stage: String,
    pub closed: bool,
    pub last_activity: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingStatus {
    Draft,
    Published,
    Live,
    Other(String),
}

impl ListingStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "DRAFT" => ListingStatus::Draft,
            "PUBLISHED" => ListingStatus::Published,
            "LIVE" => ListingStatus::Live,
            other => ListingStatus::Other(other.to_string()),
        }
    }
}

/// Portals a published listing is pushed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Channels {
    pub property_finder: bool,
    pub bayut: bool,
    pub dubizzle: bool,
    pub website: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: u64,
    pub agent_email: String,
    pub status: ListingStatus,
    pub channels: Channels,
    pub price: f64,
    pub created_time: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactHandles {
    pub skype: Option<String>,
    pub skype_chat: Option<String>,
    pub zoom: Option<String>,
    pub xing: Option<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub role: Option<String>,
    pub photo: Option<String>,
    pub email: Option<String>,
    pub handles: ContactHandles,
}

/// Profile block returned alongside performance figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub employee: String,
    pub role: String,
    pub employee_photo: String,
    pub skype: String,
    #[serde(rename = "skypeChat")]
    pub skype_chat: String,
    pub zoom: String,
    pub xing: String,
    pub linkedin: String,
    pub facebook: String,
    pub twitter: String,
}

impl From<&Agent> for AgentProfile {
    fn from(agent: &Agent) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        AgentProfile {
            employee: agent.display_name.clone(),
            role: text(&agent.role),
            employee_photo: text(&agent.photo),
            skype: text(&agent.handles.skype),
            skype_chat: text(&agent.handles.skype_chat),
            zoom: text(&agent.handles.zoom),
            xing: text(&agent.handles.xing),
            linkedin: text(&agent.handles.linkedin),
            facebook: text(&agent.handles.facebook),
            twitter: text(&agent.handles.twitter),
        }
    }
}

/// Deal query filter. Every populated condition must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealFilter {
    pub assigned_agent_id: Option<AgentId>,
    /// Inclusive lower bound on the close date.
    pub close_date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the close date.
    pub close_date_to: Option<NaiveDate>,
    pub closed: Option<bool>,
    pub opportunity_greater_than: Option<f64>,
}

impl DealFilter {
    pub fn assigned_between(agent_id: AgentId, from: NaiveDate, to: NaiveDate) -> Self {
        DealFilter {
            assigned_agent_id: Some(agent_id),
            close_date_from: Some(from),
            close_date_to: Some(to),
            ..Default::default()
        }
    }

    pub fn closed_with_opportunity() -> Self {
        DealFilter {
            closed: Some(true),
            opportunity_greater_than: Some(0.0),
            ..Default::default()
        }
    }

    pub fn matches(&self, deal: &Deal) -> bool {
        if let Some(agent_id) = self.assigned_agent_id {
            if deal.assigned_agent_id != agent_id {
                return false;
            }
        }
        if self.close_date_from.is_some() || self.close_date_to.is_some() {
            let Some(close_date) = deal.close_date else {
                return false;
            };
            if self.close_date_from.map_or(false, |from| close_date < from)
                || self.close_date_to.map_or(false, |to| close_date > to)
            {
                return false;
            }
        }
        if let Some(closed) = self.closed {
            if deal.closed != closed {
                return false;
            }
        }
        if let Some(floor) = self.opportunity_greater_than {
            if deal.opportunity <= floor {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFilter {
    pub agent_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealField {
    Id,
    AssignedAgent,
    CloseDate,
    Opportunity,
    GrossCommission,
    Stage,
    Closed,
    LastActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingField {
    Status,
    Channels,
    Price,
    CreatedTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentField {
    Id,
    Name,
    Role,
    Photo,
    Email,
    ContactHandles,
}
