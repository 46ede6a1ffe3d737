// src/services/performance.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::config::{EngineSettings, MAX_STALE_DEAL_DAYS};
use crate::error::{self, DashboardError};
use crate::models::{
    AgentId, AgentProfile, Deal, DealField, DealFilter, Listing, ListingField, ListingFilter,
    ListingStatus,
};
use crate::services::cache::{keys, ResponseCache};
use crate::services::calendar::{month_bounds, month_name};
use crate::services::crm::RecordFetcher;

const ACTIVE_STAGES: [&str; 4] = ["NEW", "PREPARATION", "IN_PROGRESS", "FINAL_INVOICE"];
const UNASSIGNED_STAGE: &str = "NEW";
const MEETING_STAGES: [&str; 1] = ["UC_9QFUT2"];

pub const PERFORMANCE_DEAL_FIELDS: &[DealField] = &[
    DealField::Id,
    DealField::AssignedAgent,
    DealField::CloseDate,
    DealField::Opportunity,
    DealField::Stage,
    DealField::GrossCommission,
    DealField::Closed,
    DealField::LastActivity,
];

pub const PERFORMANCE_LISTING_FIELDS: &[ListingField] = &[
    ListingField::Status,
    ListingField::Channels,
    ListingField::Price,
    ListingField::CreatedTime,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthMetrics {
    pub live_ads: usize,
    pub total_worth_of_ads: f64,
    pub published_ads: usize,
    pub draft_ads: usize,
    pub pf_ads: usize,
    pub bayut_ads: usize,
    pub dubizzle_ads: usize,
    pub website_ads: usize,
    pub total_ads: usize,
    pub closed_deals: usize,
    pub active_deals: usize,
    pub unassigned_deals: usize,
    pub deals_without_updates: usize,
    pub meetings_arranged: usize,
    pub monthly_earnings: f64,
    pub gross_commission: f64,
}

/// Metrics for one month, labelled with the month's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPerformance {
    pub month: String,
    pub metrics: MonthMetrics,
}

/// Months in calendar order. Serializes as a JSON object keyed by month name,
/// keeping insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSeries(pub Vec<MonthlyPerformance>);

impl Serialize for PerformanceSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.month, &entry.metrics)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PerformanceSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeriesVisitor;

        impl<'de> Visitor<'de> for SeriesVisitor {
            type Value = PerformanceSeries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of month names to metrics")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut months = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((month, metrics)) = access.next_entry::<String, MonthMetrics>()? {
                    months.push(MonthlyPerformance { month, metrics });
                }
                Ok(PerformanceSeries(months))
            }
        }

        deserializer.deserialize_map(SeriesVisitor)
    }
}

/// Agent profile merged with a `performance` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    #[serde(flatten)]
    pub profile: AgentProfile,
    pub performance: PerformanceSeries,
}

pub struct PerformanceCalculator {
    fetcher: Arc<dyn RecordFetcher>,
    cache: Arc<ResponseCache>,
    settings: EngineSettings,
    stale_after: Duration,
}

impl PerformanceCalculator {
    pub fn new(
        fetcher: Arc<dyn RecordFetcher>,
        cache: Arc<ResponseCache>,
        settings: EngineSettings,
    ) -> Self {
        PerformanceCalculator {
            fetcher,
            cache,
            stale_after: Duration::days(settings.stale_deal_days.clamp(0, MAX_STALE_DEAL_DAYS)),
            settings,
        }
    }

    /// Metrics for one agent over a 1-based month.
    pub async fn compute_month(
        &self,
        agent_id: AgentId,
        month: u32,
        year: i32,
        agent_email: &str,
        now: DateTime<Utc>,
    ) -> error::Result<MonthlyPerformance> {
        let (start, end) = month_bounds(year, month).ok_or_else(|| {
            DashboardError::Validation(format!("Month {} is outside 1 to 12", month))
        })?;
        debug!("Computing performance for agent {} over {} to {}", agent_id, start, end);

        // The CRM cannot filter listings by creation date, so narrow them here.
        let listings = if agent_email.is_empty() {
            warn!("Agent {} has no email, skipping listings", agent_id);
            Vec::new()
        } else {
            let filter = ListingFilter {
                agent_email: agent_email.to_string(),
            };
            self.fetcher
                .list_listings(&filter, PERFORMANCE_LISTING_FIELDS)
                .await?
                .into_iter()
                .filter(|listing| created_within(listing, start, end))
                .collect()
        };

        let filter = DealFilter::assigned_between(agent_id, start, end);
        let deals: Vec<Deal> = self
            .fetcher
            .list_deals(&filter, PERFORMANCE_DEAL_FIELDS)
            .await?
            .into_iter()
            .filter(|deal| deal.close_date.map_or(false, |d| d >= start && d <= end))
            .collect();

        Ok(MonthlyPerformance {
            month: month_name(month).to_string(),
            metrics: summarize(&listings, &deals, now, self.stale_after),
        })
    }

    /// January through `current_month`, each month served from the cache when
    /// present. Misses are computed concurrently, up to the configured limit,
    /// and stored as they complete. The result stays in calendar order.
    pub async fn compute_year_to_date(
        &self,
        agent_id: AgentId,
        year: i32,
        current_month: u32,
        agent_email: &str,
        now: DateTime<Utc>,
    ) -> error::Result<PerformanceSeries> {
        let months: Vec<MonthlyPerformance> = stream::iter(1..=current_month)
            .map(|month| async move {
                let key = keys::monthly_performance(agent_id, year, month);
                if let Some(cached) = self.cache.get::<MonthlyPerformance>(&key, now) {
                    debug!("Cache hit for {}", key);
                    return Ok(cached);
                }

                let computed = self.compute_month(agent_id, month, year, agent_email, now).await?;
                let ttl = self.settings.cache_ttl_seconds;
                if let Err(e) = self.cache.set(&key, &computed, ttl, now) {
                    warn!("Failed to cache {}: {}", key, e);
                }
                Ok::<_, DashboardError>(computed)
            })
            .buffered(self.settings.month_fetch_concurrency.max(1))
            .try_collect()
            .await?;

        info!("Built {} months of performance for agent {}", months.len(), agent_id);
        Ok(PerformanceSeries(months))
    }
}

fn created_within(listing: &Listing, start: NaiveDate, end: NaiveDate) -> bool {
    match listing.created_time {
        Some(created) => {
            let day = created.date_naive();
            day >= start && day <= end
        }
        None => false,
    }
}

pub fn is_closed(deal: &Deal) -> bool {
    deal.stage.starts_with("WON") || deal.closed
}

/// A deal with no recorded activity counts as stale.
pub fn is_stale(deal: &Deal, now: DateTime<Utc>, stale_after: Duration) -> bool {
    match deal.last_activity {
        Some(last) => now.signed_duration_since(last) > stale_after,
        None => true,
    }
}

pub fn round2(value: f64) -> f64 {
    // Adding +0.0 turns a negative zero into 0.0 so it never renders as "-0.0".
    (value * 100.0).round() / 100.0 + 0.0
}

fn total(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, value| acc + value)
}

/// Pure metric computation over already-windowed records.
pub fn summarize(
    listings: &[Listing],
    deals: &[Deal],
    now: DateTime<Utc>,
    stale_after: Duration,
) -> MonthMetrics {
    let published: Vec<&Listing> = listings
        .iter()
        .filter(|l| l.status == ListingStatus::Published)
        .collect();
    let closed: Vec<&Deal> = deals.iter().filter(|d| is_closed(d)).collect();
    let count_stage = |stages: &[&str]| {
        deals
            .iter()
            .filter(|d| stages.iter().any(|stage| *stage == d.stage))
            .count()
    };

    MonthMetrics {
        live_ads: listings.iter().filter(|l| l.status == ListingStatus::Live).count(),
        total_worth_of_ads: total(published.iter().map(|l| l.price)),
        published_ads: published.len(),
        draft_ads: listings.iter().filter(|l| l.status == ListingStatus::Draft).count(),
        pf_ads: published.iter().filter(|l| l.channels.property_finder).count(),
        bayut_ads: published.iter().filter(|l| l.channels.bayut).count(),
        dubizzle_ads: published.iter().filter(|l| l.channels.dubizzle).count(),
        website_ads: published.iter().filter(|l| l.channels.website).count(),
        total_ads: listings.len(),
        closed_deals: closed.len(),
        active_deals: count_stage(&ACTIVE_STAGES[..]),
        unassigned_deals: count_stage(&[UNASSIGNED_STAGE]),
        deals_without_updates: deals.iter().filter(|d| is_stale(d, now, stale_after)).count(),
        meetings_arranged: count_stage(&MEETING_STAGES[..]),
        monthly_earnings: round2(total(closed.iter().map(|d| d.opportunity))),
        gross_commission: round2(total(closed.iter().map(|d| d.gross_commission))),
    }
}
