// src/services/ranking.rs
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::FetchError;
use crate::models::{AgentField, AgentId, Deal, DealField};
use crate::services::calendar::{analysis_years, bucket_of, month_abbrev, quarter_label};
use crate::services::crm::RecordFetcher;

/// Flat commission rate applied to a deal's opportunity for ranking purposes.
pub const COMMISSION_RATE: f64 = 0.03;

pub const RANKING_DEAL_FIELDS: &[DealField] = &[
    DealField::Id,
    DealField::CloseDate,
    DealField::Opportunity,
    DealField::AssignedAgent,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRank {
    pub month: String,
    pub rank: usize,
    pub gross_commission: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterRank {
    pub quarter: String,
    pub rank: usize,
    pub gross_commission: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRank {
    pub rank: usize,
    pub gross_commission: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRanking {
    pub months: Vec<MonthRank>,
    pub quarters: Vec<QuarterRank>,
    pub year: YearRank,
}

/// Rankings for each analysis year, oldest first.
pub type RankingResult = BTreeMap<i32, YearRanking>;

/// Commission accumulated by one agent over one year.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct YearTotals {
    pub months: [f64; 12],
    pub quarters: [f64; 4],
    pub year: f64,
}

impl YearTotals {
    pub fn accumulate<'a>(year: i32, deals: impl IntoIterator<Item = &'a Deal>) -> Self {
        let mut totals = YearTotals::default();
        for deal in deals {
            let Some(close_date) = deal.close_date else {
                continue;
            };
            let bucket = bucket_of(close_date);
            if bucket.year != year {
                continue;
            }
            let commission = deal.opportunity * COMMISSION_RATE;
            totals.months[bucket.month] += commission;
            totals.quarters[bucket.quarter] += commission;
            totals.year += commission;
        }
        totals
    }
}

/// 1-based position of `target` among agents with positive commission, sorted
/// by commission descending. Equal commissions keep their input order. Returns
/// 0 when the target has no position.
pub fn rank_in_bucket(scores: &[(AgentId, f64)], target: AgentId) -> usize {
    let mut ranked: Vec<&(AgentId, f64)> = scores.iter().filter(|(_, c)| *c > 0.0).collect();
    // `sort_by` is stable, which is what keeps ties in fetch order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .iter()
        .position(|(id, _)| *id == target)
        .map_or(0, |index| index + 1)
}

fn rank_by(
    peer_totals: &[(AgentId, YearTotals)],
    target: AgentId,
    pick: impl Fn(&YearTotals) -> f64,
) -> usize {
    let scores: Vec<(AgentId, f64)> = peer_totals
        .iter()
        .map(|(agent, totals)| (*agent, pick(totals)))
        .collect();
    rank_in_bucket(&scores, target)
}

/// Ranks `target` against `agents` in every bucket of every analysis year.
///
/// `agents` is the peer set in fetch order; a target missing from it still
/// gets its own commission figures, with rank 0 throughout.
pub fn rank_agents(
    target: AgentId,
    deals: &[Deal],
    agents: &[AgentId],
    today: NaiveDate,
) -> RankingResult {
    let mut by_agent: HashMap<AgentId, Vec<&Deal>> = HashMap::new();
    for deal in deals {
        by_agent.entry(deal.assigned_agent_id).or_default().push(deal);
    }
    let no_deals: Vec<&Deal> = Vec::new();
    let deals_of = |agent: AgentId| by_agent.get(&agent).unwrap_or(&no_deals);

    let mut result = RankingResult::new();
    for year in analysis_years(today) {
        // Every agent's totals must be known before any bucket can be ranked.
        let peer_totals: Vec<(AgentId, YearTotals)> = agents
            .iter()
            .map(|&agent| (agent, YearTotals::accumulate(year, deals_of(agent).iter().copied())))
            .collect();
        let own = YearTotals::accumulate(year, deals_of(target).iter().copied());

        let months = (0..12)
            .map(|m| MonthRank {
                month: month_abbrev(m).to_string(),
                rank: rank_by(&peer_totals, target, |t| t.months[m]),
                gross_commission: own.months[m],
            })
            .collect();
        let quarters = (0..4)
            .map(|q| QuarterRank {
                quarter: quarter_label(q).to_string(),
                rank: rank_by(&peer_totals, target, |t| t.quarters[q]),
                gross_commission: own.quarters[q],
            })
            .collect();
        let year_rank = YearRank {
            rank: rank_by(&peer_totals, target, |t| t.year),
            gross_commission: own.year,
        };

        debug!("Agent {} ranked {} for {}", target, year_rank.rank, year);
        result.insert(
            year,
            YearRanking {
                months,
                quarters,
                year: year_rank,
            },
        );
    }
    result
}

pub struct RankingEngine {
    fetcher: Arc<dyn RecordFetcher>,
}

impl RankingEngine {
    pub fn new(fetcher: Arc<dyn RecordFetcher>) -> Self {
        RankingEngine { fetcher }
    }

    /// Ranks `target` against every active agent using the given system-wide deal set.
    pub async fn rank_for(
        &self,
        target: AgentId,
        deals: &[Deal],
        today: NaiveDate,
    ) -> Result<RankingResult, FetchError> {
        let agents: Vec<AgentId> = self
            .fetcher
            .list_active_agents(&[AgentField::Id])
            .await?
            .into_iter()
            .map(|agent| agent.id)
            .collect();
        info!(
            "Ranking agent {} against {} active agents over {} deals",
            target,
            agents.len(),
            deals.len()
        );
        Ok(rank_agents(target, deals, &agents, today))
    }
}
