// src/services/dashboard.rs
use chrono::{DateTime, Datelike, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::config::EngineSettings;
use crate::error::{DashboardError, Result};
use crate::models::{Agent, AgentField, AgentId, AgentProfile, DealFilter};
use crate::services::cache::{keys, ResponseCache};
use crate::services::crm::RecordFetcher;
use crate::services::performance::{PerformanceCalculator, PerformanceReport, PerformanceSeries};
use crate::services::ranking::{RankingEngine, RankingResult, RANKING_DEAL_FIELDS};

const PROFILE_FIELDS: &[AgentField] = &[
    AgentField::Id,
    AgentField::Name,
    AgentField::Role,
    AgentField::Photo,
    AgentField::Email,
    AgentField::ContactHandles,
];

/// Entry point for the two dashboard operations.
///
/// Validation and not-found outcomes never reach the cache, and a failed
/// fetch leaves whatever is cached untouched.
pub struct Dashboard {
    fetcher: Arc<dyn RecordFetcher>,
    cache: Arc<ResponseCache>,
    performance: PerformanceCalculator,
    ranking: RankingEngine,
    settings: EngineSettings,
}

impl Dashboard {
    pub fn new(
        fetcher: Arc<dyn RecordFetcher>,
        cache: Arc<ResponseCache>,
        settings: EngineSettings,
    ) -> Self {
        Dashboard {
            performance: PerformanceCalculator::new(
                fetcher.clone(),
                cache.clone(),
                settings.clone(),
            ),
            ranking: RankingEngine::new(fetcher.clone()),
            fetcher,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Profile plus the current month's metrics, or every month of the year so
    /// far when `yearly` is set.
    pub async fn get_performance(
        &self,
        agent_id: AgentId,
        yearly: bool,
        now: DateTime<Utc>,
    ) -> Result<PerformanceReport> {
        let today = now.date_naive();
        let (year, month) = (today.year(), today.month());

        if yearly {
            let agent = self.load_agent(agent_id).await?;
            let email = agent.email.as_deref().unwrap_or("");
            let performance = self
                .performance
                .compute_year_to_date(agent_id, year, month, email, now)
                .await?;
            return Ok(PerformanceReport {
                profile: AgentProfile::from(&agent),
                performance,
            });
        }

        let key = keys::current_performance(agent_id, year, month);
        if let Some(report) = self.cache.get::<PerformanceReport>(&key, now) {
            debug!("Cache hit for {}", key);
            return Ok(report);
        }

        let agent = self.load_agent(agent_id).await?;
        let current = self
            .performance
            .compute_month(agent_id, month, year, agent.email.as_deref().unwrap_or(""), now)
            .await?;
        let report = PerformanceReport {
            profile: AgentProfile::from(&agent),
            performance: PerformanceSeries(vec![current]),
        };
        self.store(&key, &report, now);
        Ok(report)
    }

    /// Month, quarter and year ranks of `agent_id` over the three analysis years.
    pub async fn get_ranking(
        &self,
        agent_id: AgentId,
        now: DateTime<Utc>,
    ) -> Result<RankingResult> {
        let key = keys::ranking(agent_id);
        if let Some(ranking) = self.cache.get::<RankingResult>(&key, now) {
            debug!("Cache hit for {}", key);
            return Ok(ranking);
        }

        let deals = self
            .fetcher
            .list_deals(&DealFilter::closed_with_opportunity(), RANKING_DEAL_FIELDS)
            .await?;
        if !deals.iter().any(|deal| deal.assigned_agent_id == agent_id) {
            info!("No qualifying deals for agent {}", agent_id);
            return Err(DashboardError::NotFound(format!(
                "No deals found for agent ID: {}",
                agent_id
            )));
        }

        let ranking = self.ranking.rank_for(agent_id, &deals, now.date_naive()).await?;
        self.store(&key, &ranking, now);
        Ok(ranking)
    }

    async fn load_agent(&self, agent_id: AgentId) -> Result<Agent> {
        self.fetcher
            .get_agent(agent_id, PROFILE_FIELDS)
            .await?
            .ok_or_else(|| DashboardError::NotFound("User not found".to_string()))
    }

    fn store<T: Serialize>(&self, key: &str, value: &T, now: DateTime<Utc>) {
        if let Err(e) = self.cache.set(key, value, self.settings.cache_ttl_seconds, now) {
            warn!("Failed to cache {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Deal, ListingStatus};
    use crate::services::performance::MonthlyPerformance;
    use crate::testkit::{agent, closed_deal, date, listing, MemoryFetcher};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::Ordering;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 8, 0, 0).unwrap()
    }

    fn dashboard(fetcher: Arc<MemoryFetcher>) -> Dashboard {
        dashboard_with(fetcher, EngineSettings::default())
    }

    fn dashboard_with(fetcher: Arc<MemoryFetcher>, settings: EngineSettings) -> Dashboard {
        Dashboard::new(fetcher, Arc::new(ResponseCache::new()), settings)
    }

    fn seeded() -> Arc<MemoryFetcher> {
        let deals: Vec<Deal> = vec![
            closed_deal(1, 1, date(2026, 3, 2), 2000.0),
            closed_deal(2, 2, date(2026, 3, 3), 4000.0),
            closed_deal(3, 1, date(2026, 1, 20), 1000.0),
        ];
        let listings = vec![
            listing(1, "a@x.com", ListingStatus::Live, "2026-03-01T09:00:00Z", 0.0),
            listing(2, "a@x.com", ListingStatus::Published, "2026-03-04T10:00:00Z", 1234.57),
            listing(3, "a@x.com", ListingStatus::Published, "2026-03-05T10:00:00Z", 2469.14),
        ];
        let agents = vec![
            agent(1, "Ann Agent", "a@x.com"),
            agent(2, "Bob Broker", "b@x.com"),
            agent(3, "Cy", "c@x.com"),
        ];
        Arc::new(MemoryFetcher::new(deals, listings, agents))
    }

    #[tokio::test]
    async fn current_month_is_served_from_cache_within_ttl() {
        let fetcher = seeded();
        let dashboard = dashboard(fetcher.clone());

        let first = dashboard.get_performance(1, false, now()).await.unwrap();
        let calls = fetcher.total_calls();
        let second = dashboard
            .get_performance(1, false, now() + Duration::seconds(299))
            .await
            .unwrap();

        assert_eq!(fetcher.total_calls(), calls);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.profile.employee, "Ann Agent");
        assert_eq!(first.performance.0.len(), 1);
        assert_eq!(first.performance.0[0].month, "March");
        assert_eq!(first.performance.0[0].metrics.live_ads, 1);
        assert_eq!(first.performance.0[0].metrics.published_ads, 2);
        assert_eq!(first.performance.0[0].metrics.total_worth_of_ads, 1234.57 + 2469.14);
        assert_eq!(first.performance.0[0].metrics.monthly_earnings, 2000.0);

        dashboard
            .get_performance(1, false, now() + Duration::seconds(301))
            .await
            .unwrap();
        assert!(fetcher.total_calls() > calls);
    }

    #[tokio::test]
    async fn yearly_lists_months_up_to_current() {
        let dashboard = dashboard(seeded());
        let report = dashboard.get_performance(1, true, now()).await.unwrap();

        let months: Vec<&str> = report.performance.0.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, ["January", "February", "March"]);
        assert_eq!(report.performance.0[0].metrics.closed_deals, 1);
        assert_eq!(report.performance.0[1].metrics.closed_deals, 0);
    }

    #[tokio::test]
    async fn unknown_agent_is_not_found_and_not_cached() {
        let fetcher = seeded();
        let dashboard = dashboard(fetcher.clone());

        let result = dashboard.get_performance(99, false, now()).await;
        assert!(matches!(result, Err(DashboardError::NotFound(_))));
        assert!(dashboard.cache().is_empty());

        let result = dashboard.get_performance(99, true, now()).await;
        assert!(matches!(result, Err(DashboardError::NotFound(_))));
        assert!(dashboard.cache().is_empty());
    }

    #[tokio::test]
    async fn agent_without_deals_gets_zeroed_metrics() {
        let dashboard = dashboard(seeded());
        let report = dashboard.get_performance(3, false, now()).await.unwrap();
        let metrics = &report.performance.0[0].metrics;

        assert_eq!(metrics.total_ads, 0);
        assert_eq!(metrics.closed_deals, 0);
        assert_eq!(metrics.monthly_earnings, 0.0);
        assert_eq!(metrics.gross_commission, 0.0);
    }

    #[tokio::test]
    async fn ranking_requires_a_qualifying_deal() {
        let fetcher = seeded();
        let dashboard = dashboard(fetcher.clone());

        let result = dashboard.get_ranking(3, now()).await;
        assert!(matches!(result, Err(DashboardError::NotFound(_))));
        assert!(dashboard.cache().is_empty());

        let calls = fetcher.deal_calls.load(Ordering::SeqCst);
        let _ = dashboard.get_ranking(3, now()).await;
        assert_eq!(fetcher.deal_calls.load(Ordering::SeqCst), calls + 1);
    }

    #[tokio::test]
    async fn ranking_is_cached_per_agent() {
        let fetcher = seeded();
        let dashboard = dashboard(fetcher.clone());

        let ranking = dashboard.get_ranking(1, now()).await.unwrap();
        assert_eq!(ranking[&2026].months[2].rank, 2);
        assert_eq!(ranking[&2026].months[0].rank, 1);
        assert_eq!(ranking[&2026].year.rank, 2);
        assert_eq!(ranking[&2026].year.gross_commission, 90.0);

        let calls = fetcher.total_calls();
        let again = dashboard.get_ranking(1, now()).await.unwrap();
        assert_eq!(again, ranking);
        assert_eq!(fetcher.total_calls(), calls);
    }

    #[tokio::test]
    async fn upstream_failure_propagates_and_keeps_cache() {
        let fetcher = seeded();
        let dashboard = dashboard(fetcher.clone());
        dashboard.get_ranking(1, now()).await.unwrap();

        fetcher.set_failing(true);
        let cached = dashboard.get_ranking(1, now()).await;
        assert!(cached.is_ok());

        let fresh = dashboard.get_ranking(2, now()).await;
        assert!(matches!(fresh, Err(DashboardError::Upstream(_))));
        assert!(dashboard.cache().get::<RankingResult>(&keys::ranking(1), now()).is_some());
        assert!(dashboard.cache().get::<RankingResult>(&keys::ranking(2), now()).is_none());
    }

    #[tokio::test]
    async fn ranking_cache_hit_is_byte_identical() {
        let fetcher = Arc::new(MemoryFetcher::new(
            vec![
                closed_deal(1, 1, date(2026, 3, 2), 1234.57),
                closed_deal(2, 1, date(2026, 3, 9), 2469.14),
                closed_deal(3, 2, date(2026, 3, 5), 100.0),
            ],
            vec![],
            vec![agent(1, "Ann Agent", "a@x.com"), agent(2, "Bob Broker", "b@x.com")],
        ));
        let dashboard = dashboard(fetcher.clone());

        let first = dashboard.get_ranking(1, now()).await.unwrap();
        let calls = fetcher.total_calls();
        let second = dashboard
            .get_ranking(1, now() + Duration::seconds(299))
            .await
            .unwrap();

        assert_eq!(fetcher.total_calls(), calls);
        assert_eq!(first[&2026].months[2].rank, 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn failed_month_leaves_earlier_months_cached() {
        let fetcher = seeded();
        let settings = EngineSettings {
            month_fetch_concurrency: 1,
            ..Default::default()
        };
        let dashboard = dashboard_with(fetcher.clone(), settings);
        fetcher.fail_deals_after(1);

        let result = dashboard.get_performance(1, true, now()).await;

        assert!(matches!(result, Err(DashboardError::Upstream(_))));
        let cached = |month| {
            dashboard
                .cache()
                .get::<MonthlyPerformance>(&keys::monthly_performance(1, 2026, month), now())
        };
        let january = cached(1).expect("January stays cached");
        assert_eq!(january.metrics.closed_deals, 1);
        assert!(cached(2).is_none());
        assert!(cached(3).is_none());
    }
}
