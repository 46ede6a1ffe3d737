// src/services/bitrix.rs
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::error::FetchError;
use crate::models::{
    Agent, AgentField, AgentId, Channels, ContactHandles, Deal, DealField, DealFilter, Listing,
    ListingField, ListingFilter, ListingStatus,
};
use crate::services::crm::RecordFetcher;

/// Custom deal field holding the recorded gross commission.
const GROSS_COMMISSION_FIELD: &str = "UF_CRM_1743850215298";

#[derive(Clone)]
pub struct BitrixConfig {
    /// Inbound webhook base, e.g. `https://example.bitrix24.com/rest/1/abc123`.
    pub webhook_url: String,
    /// Smart-process entity type that stores listings.
    pub listings_entity_type_id: u32,
}

pub struct BitrixClient {
    pub config: BitrixConfig,
    client: Client,
}

/// Where a list method puts its records in the response.
enum ResultShape {
    Array,
    Items,
}

impl BitrixClient {
    pub fn new(config: BitrixConfig) -> Self {
        BitrixClient {
            config,
            client: Client::new(),
        }
    }

    async fn call(&self, method: &str, params: &Value) -> Result<Value, FetchError> {
        let url = format!("{}/{}.json", self.config.webhook_url, method);
        let response = self.client.post(&url).json(params).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if let Some(code) = body.get("error").and_then(|v| v.as_str()) {
            let description = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            return Err(FetchError::Api {
                code: code.to_string(),
                description,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Api {
                code: status.as_u16().to_string(),
                description: format!("{} returned {}", method, status),
            });
        }
        Ok(body)
    }

    /// Calls a list method repeatedly, following `next`, and returns every record.
    async fn call_all(
        &self,
        method: &str,
        mut params: Value,
        shape: ResultShape,
    ) -> Result<Vec<Value>, FetchError> {
        let mut records = Vec::new();
        let mut start: u64 = 0;

        loop {
            params["start"] = json!(start);
            let body = self.call(method, &params).await?;
            let page = match shape {
                ResultShape::Array => body.get("result"),
                ResultShape::Items => body.get("result").and_then(|r| r.get("items")),
            }
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                FetchError::Malformed(format!("{} response has no result list", method))
            })?;

            records.extend(page.iter().cloned());
            match body.get("next").and_then(as_u64) {
                Some(next) => start = next,
                None => break,
            }
        }

        debug!("{} returned {} records", method, records.len());
        Ok(records)
    }
}

#[async_trait]
impl RecordFetcher for BitrixClient {
    async fn list_deals(
        &self,
        filter: &DealFilter,
        select: &[DealField],
    ) -> Result<Vec<Deal>, FetchError> {
        let params = json!({
            "filter": deal_filter_params(filter),
            "select": deal_select(select),
        });
        let rows = self.call_all("crm.deal.list", params, ResultShape::Array).await?;
        rows.iter().map(parse_deal).collect()
    }

    async fn list_listings(
        &self,
        filter: &ListingFilter,
        select: &[ListingField],
    ) -> Result<Vec<Listing>, FetchError> {
        let params = json!({
            "entityTypeId": self.config.listings_entity_type_id,
            "filter": { "ufCrm18AgentEmail": filter.agent_email },
            "select": listing_select(select),
        });
        let rows = self.call_all("crm.item.list", params, ResultShape::Items).await?;
        rows.iter().map(|row| parse_listing(row, &filter.agent_email)).collect()
    }

    async fn list_active_agents(&self, select: &[AgentField]) -> Result<Vec<Agent>, FetchError> {
        let params = json!({
            "order": { "ID": "ASC" },
            "filter": { "ACTIVE": "Y" },
            "select": agent_select(select),
        });
        let rows = self.call_all("user.get", params, ResultShape::Array).await?;
        info!("Fetched {} active agents", rows.len());
        rows.iter().map(parse_agent).collect()
    }

    async fn get_agent(
        &self,
        id: AgentId,
        select: &[AgentField],
    ) -> Result<Option<Agent>, FetchError> {
        let params = json!({ "ID": id, "select": agent_select(select) });
        let body = self.call("user.get", &params).await?;
        match body.get("result").and_then(|r| r.as_array()).and_then(|r| r.first()) {
            Some(row) => parse_agent(row).map(Some),
            None => Ok(None),
        }
    }
}

fn deal_filter_params(filter: &DealFilter) -> Value {
    let mut params = Map::new();
    if let Some(agent_id) = filter.assigned_agent_id {
        params.insert("ASSIGNED_BY_ID".into(), json!(agent_id));
    }
    if let Some(from) = filter.close_date_from {
        params.insert(">=CLOSEDATE".into(), json!(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filter.close_date_to {
        params.insert("<=CLOSEDATE".into(), json!(to.format("%Y-%m-%d").to_string()));
    }
    if let Some(closed) = filter.closed {
        params.insert("CLOSED".into(), json!(if closed { "Y" } else { "N" }));
    }
    if let Some(floor) = filter.opportunity_greater_than {
        params.insert(">OPPORTUNITY".into(), json!(floor));
    }
    Value::Object(params)
}

fn deal_select(fields: &[DealField]) -> Vec<&'static str> {
    fields
        .iter()
        .map(|field| match field {
            DealField::Id => "ID",
            DealField::AssignedAgent => "ASSIGNED_BY_ID",
            DealField::CloseDate => "CLOSEDATE",
            DealField::Opportunity => "OPPORTUNITY",
            DealField::GrossCommission => GROSS_COMMISSION_FIELD,
            DealField::Stage => "STAGE_ID",
            DealField::Closed => "CLOSED",
            DealField::LastActivity => "LAST_ACTIVITY_TIME",
        })
        .collect()
}

fn listing_select(fields: &[ListingField]) -> Vec<&'static str> {
    let mut names = vec!["id", "ufCrm18AgentEmail"];
    for field in fields {
        match field {
            ListingField::Status => names.push("ufCrm18Status"),
            ListingField::Channels => names.extend([
                "ufCrm18PfEnable",
                "ufCrm18BayutEnable",
                "ufCrm18DubizzleEnable",
                "ufCrm18WebsiteEnable",
            ]),
            ListingField::Price => names.push("ufCrm18Price"),
            ListingField::CreatedTime => names.push("createdTime"),
        }
    }
    names
}

fn agent_select(fields: &[AgentField]) -> Vec<&'static str> {
    let mut names = Vec::new();
    for field in fields {
        match field {
            AgentField::Id => names.push("ID"),
            AgentField::Name => names.extend(["NAME", "LAST_NAME"]),
            AgentField::Role => names.push("WORK_POSITION"),
            AgentField::Photo => names.push("PERSONAL_PHOTO"),
            AgentField::Email => names.push("EMAIL"),
            AgentField::ContactHandles => names.extend([
                "UF_SKYPE",
                "UF_SKYPE_LINK",
                "UF_ZOOM",
                "UF_XING",
                "UF_LINKEDIN",
                "UF_FACEBOOK",
                "UF_TWITTER",
            ]),
        }
    }
    names
}

// Bitrix sends most scalars as strings ("123", "1500.00", "Y"), sometimes as
// numbers or booleans. These readers accept either.

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Missing or unparseable amounts read as zero.
fn amount(row: &Value, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn flag(row: &Value, key: &str) -> bool {
    match row.get(key) {
        Some(Value::String(s)) => s == "Y",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

fn timestamp(row: &Value, key: &str) -> Option<DateTime<FixedOffset>> {
    text(row, key).and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
}

/// Calendar date as the CRM reports it, in the timestamp's own offset.
fn calendar_date(row: &Value, key: &str) -> Option<NaiveDate> {
    let raw = text(row, key)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
        .ok()
}

fn required_id(row: &Value, key: &str, entity: &str) -> Result<u64, FetchError> {
    row.get(key)
        .and_then(as_u64)
        .ok_or_else(|| {
            FetchError::Malformed(format!("{} without a numeric {}: {}", entity, key, row))
        })
}

fn parse_deal(row: &Value) -> Result<Deal, FetchError> {
    Ok(Deal {
        id: required_id(row, "ID", "deal")?,
        assigned_agent_id: required_id(row, "ASSIGNED_BY_ID", "deal")?,
        close_date: calendar_date(row, "CLOSEDATE"),
        opportunity: amount(row, "OPPORTUNITY"),
        gross_commission: amount(row, GROSS_COMMISSION_FIELD),
        stage: text(row, "STAGE_ID").unwrap_or_default(),
        closed: flag(row, "CLOSED"),
        last_activity: timestamp(row, "LAST_ACTIVITY_TIME"),
    })
}

fn parse_listing(row: &Value, requested_email: &str) -> Result<Listing, FetchError> {
    Ok(Listing {
        id: required_id(row, "id", "listing")?,
        agent_email: text(row, "ufCrm18AgentEmail").unwrap_or_else(|| requested_email.to_string()),
        status: ListingStatus::parse(&text(row, "ufCrm18Status").unwrap_or_default()),
        channels: Channels {
            property_finder: flag(row, "ufCrm18PfEnable"),
            bayut: flag(row, "ufCrm18BayutEnable"),
            dubizzle: flag(row, "ufCrm18DubizzleEnable"),
            website: flag(row, "ufCrm18WebsiteEnable"),
        },
        price: amount(row, "ufCrm18Price"),
        created_time: timestamp(row, "createdTime"),
    })
}

fn parse_agent(row: &Value) -> Result<Agent, FetchError> {
    let display_name = format!(
        "{} {}",
        text(row, "NAME").unwrap_or_default(),
        text(row, "LAST_NAME").unwrap_or_default()
    )
    .trim()
    .to_string();

    Ok(Agent {
        id: required_id(row, "ID", "user")?,
        display_name,
        role: text(row, "WORK_POSITION"),
        photo: text(row, "PERSONAL_PHOTO"),
        email: text(row, "EMAIL"),
        handles: ContactHandles {
            skype: text(row, "UF_SKYPE"),
            skype_chat: text(row, "UF_SKYPE_LINK"),
            zoom: text(row, "UF_ZOOM"),
            xing: text(row, "UF_XING"),
            linkedin: text(row, "UF_LINKEDIN"),
            facebook: text(row, "UF_FACEBOOK"),
            twitter: text(row, "UF_TWITTER"),
        },
    })
}
