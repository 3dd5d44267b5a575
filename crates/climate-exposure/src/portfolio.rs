//! Portfolio KPIs for the dashboard tiles and charts

use crate::aggregator::{aggregate, sort_by_exposure, AggregatedDestination, RecordFilter};
use crate::config::EngineConfig;
use crate::EnrichedRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Travelers exposed to one risk cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseShare {
    pub cause: String,
    pub travelers: u64,
}

/// Short row for ranked destination lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationRank {
    pub destination: String,
    pub cause: String,
    pub travelers: u64,
    pub score: f64,
    pub exposure: f64,
}

impl From<&AggregatedDestination> for DestinationRank {
    fn from(a: &AggregatedDestination) -> Self {
        Self {
            destination: a.destination.clone(),
            cause: a.cause.clone(),
            travelers: a.total_travelers,
            score: a.mean_adjusted_score,
            exposure: a.total_exposure,
        }
    }
}

/// Headline figures of an aggregated portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub destinations: usize,
    pub total_travelers: u64,
    pub total_exposure: f64,
    /// Travelers headed to destinations above the high-risk threshold
    pub high_risk_travelers: u64,
    /// Cash at risk: exposure above the high-risk threshold
    pub high_risk_exposure: f64,
    /// Share of travelers at risk, None for an empty portfolio
    pub exposure_share_pct: Option<f64>,
    /// Share of input rows that resolved, None for empty input
    pub coverage_pct: Option<f64>,
    /// Distinct destination texts that did not resolve
    pub unresolved: Vec<String>,
    pub top_exposed: Vec<DestinationRank>,
    pub alert_zones: Vec<DestinationRank>,
    pub cause_breakdown: Vec<CauseShare>,
}

impl PortfolioSummary {
    /// Compute all KPIs
    ///
    /// `records` is the whole upload, used for coverage and unresolved
    /// names; `portfolio` is the aggregate on display, possibly filtered.
    pub fn compute(
        records: &[EnrichedRecord],
        portfolio: &[AggregatedDestination],
        config: &EngineConfig,
    ) -> Self {
        let total_travelers: u64 = portfolio.iter().map(|a| a.total_travelers).sum();
        let total_exposure: f64 = portfolio.iter().map(|a| a.total_exposure).sum();

        let high_risk: Vec<&AggregatedDestination> = portfolio
            .iter()
            .filter(|a| a.mean_adjusted_score > config.high_risk_threshold)
            .collect();
        let high_risk_travelers: u64 = high_risk.iter().map(|a| a.total_travelers).sum();
        let high_risk_exposure: f64 = high_risk.iter().map(|a| a.total_exposure).sum();

        let resolved_rows = records.iter().filter(|r| r.is_resolved()).count();
        let unresolved: Vec<String> = records
            .iter()
            .filter(|r| !r.is_resolved())
            .map(|r| r.trip.destination.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            destinations: portfolio.len(),
            total_travelers,
            total_exposure,
            high_risk_travelers,
            high_risk_exposure,
            exposure_share_pct: percentage(high_risk_travelers as f64, total_travelers as f64),
            coverage_pct: percentage(resolved_rows as f64, records.len() as f64),
            unresolved,
            top_exposed: ranked_above(
                portfolio,
                config.top_exposed_threshold,
                config.top_exposed_limit,
            ),
            alert_zones: ranked_above(portfolio, config.alert_threshold, config.alert_limit),
            cause_breakdown: cause_breakdown(portfolio),
        }
    }
}

/// Filtered destinations with the KPIs of one dashboard view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioView {
    pub summary: PortfolioSummary,
    /// Highest exposure first
    pub destinations: Vec<AggregatedDestination>,
}

impl PortfolioView {
    /// Aggregate the rows passing `filter`
    ///
    /// Coverage and unresolved names still describe every row in `records`.
    pub fn build(records: &[EnrichedRecord], filter: &RecordFilter, config: &EngineConfig) -> Self {
        let mut destinations = aggregate(&filter.apply(records));
        sort_by_exposure(&mut destinations);
        let summary = PortfolioSummary::compute(records, &destinations, config);
        Self {
            summary,
            destinations,
        }
    }
}

/// part / total × 100, None when total is zero
pub fn percentage(part: f64, total: f64) -> Option<f64> {
    if total > 0.0 {
        Some(part * 100.0 / total)
    } else {
        None
    }
}

/// Destinations scoring above `threshold`, most travelers first
pub fn ranked_above(
    portfolio: &[AggregatedDestination],
    threshold: f64,
    limit: usize,
) -> Vec<DestinationRank> {
    let mut above: Vec<&AggregatedDestination> = portfolio
        .iter()
        .filter(|a| a.mean_adjusted_score > threshold)
        .collect();
    above.sort_by(|a, b| {
        b.total_travelers
            .cmp(&a.total_travelers)
            .then_with(|| a.destination.cmp(&b.destination))
    });
    above.into_iter().take(limit).map(DestinationRank::from).collect()
}

/// Travelers per cause, largest first
pub fn cause_breakdown(portfolio: &[AggregatedDestination]) -> Vec<CauseShare> {
    let mut by_cause: HashMap<&str, u64> = HashMap::new();
    for a in portfolio {
        *by_cause.entry(a.cause.as_str()).or_default() += a.total_travelers;
    }

    let mut shares: Vec<CauseShare> = by_cause
        .into_iter()
        .map(|(cause, travelers)| CauseShare {
            cause: cause.to_string(),
            travelers,
        })
        .collect();
    shares.sort_by(|a, b| b.travelers.cmp(&a.travelers).then_with(|| a.cause.cmp(&b.cause)));
    shares
}
