//! Substitute recommendation with regional fallback
//!
//! For a destination scoring above the critical threshold, find the safest
//! alternative already in the portfolio: first within the same macro-region,
//! then anywhere. A candidate must score strictly below the safe threshold.

use crate::aggregator::AggregatedDestination;
use crate::knowledge::KnowledgeBase;
use crate::resolver::{normalize, resolve_with};
use crate::{ExposureError, Result, CRITICAL_THRESHOLD, SAFE_THRESHOLD, SCORE_MAX, SCORE_MIN};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Thresholds for the substitute search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Chosen destination must score above this
    pub critical_threshold: f64,
    /// Substitutes must score below this
    pub safe_threshold: f64,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            critical_threshold: CRITICAL_THRESHOLD,
            safe_threshold: SAFE_THRESHOLD,
        }
    }
}

impl RecommenderConfig {
    pub fn new(critical_threshold: f64, safe_threshold: f64) -> Self {
        Self {
            critical_threshold,
            safe_threshold,
        }
    }

    /// Both thresholds in 0-100 and safe not above critical
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (SCORE_MIN..=SCORE_MAX).contains(&v);
        if !in_range(self.safe_threshold)
            || !in_range(self.critical_threshold)
            || self.safe_threshold > self.critical_threshold
        {
            return Err(ExposureError::InvalidThresholds {
                safe: self.safe_threshold,
                critical: self.critical_threshold,
            });
        }
        Ok(())
    }
}

/// Which search phase produced the substitute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    Regional,
    Global,
}

/// Destination as shown in the action plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationSummary {
    pub destination: String,
    pub score: f64,
    pub cause: String,
    pub region: String,
}

impl From<&AggregatedDestination> for DestinationSummary {
    fn from(a: &AggregatedDestination) -> Self {
        Self {
            destination: a.destination.clone(),
            score: a.mean_adjusted_score,
            cause: a.cause.clone(),
            region: a.region.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub chosen: DestinationSummary,
    pub substitute: DestinationSummary,
    pub phase: SearchPhase,
    /// Risk points saved: chosen score minus substitute score
    pub score_delta: f64,
    /// Great-circle distance between the two destinations
    pub distance_km: f64,
}

/// Locate the chosen destination in the portfolio
///
/// Exact text first, then folded text, then the key `chosen` resolves to
/// in `kb`.
pub fn find_destination<'a>(
    kb: &KnowledgeBase,
    portfolio: &'a [AggregatedDestination],
    chosen: &str,
) -> Option<&'a AggregatedDestination> {
    if let Some(exact) = portfolio.iter().find(|a| a.destination == chosen) {
        return Some(exact);
    }

    let folded = normalize(chosen);
    if let Some(entry) = portfolio.iter().find(|a| normalize(&a.destination) == folded) {
        return Some(entry);
    }

    let profile = resolve_with(kb, chosen);
    if !profile.is_resolved() {
        return None;
    }
    portfolio.iter().find(|a| a.key == profile.key)
}

/// Lowest-scoring safe entry, ties broken by destination text
fn safest<'a, I>(candidates: I, safe_threshold: f64) -> Option<&'a AggregatedDestination>
where
    I: Iterator<Item = &'a AggregatedDestination>,
{
    candidates
        .filter(|a| a.mean_adjusted_score < safe_threshold)
        .min_by(|a, b| {
            a.mean_adjusted_score
                .total_cmp(&b.mean_adjusted_score)
                .then_with(|| a.destination.cmp(&b.destination))
        })
}

/// Recommend a substitute for a critical destination
///
/// Returns `Ok(None)` when no entry in the portfolio is safe. The chosen
/// destination, and any other entry resolving to the same place, is never
/// returned.
pub fn recommend(
    kb: &KnowledgeBase,
    portfolio: &[AggregatedDestination],
    chosen: &str,
    config: &RecommenderConfig,
) -> Result<Option<Recommendation>> {
    config.validate()?;

    let target = find_destination(kb, portfolio, chosen)
        .ok_or_else(|| ExposureError::DestinationNotInPortfolio(chosen.to_string()))?;

    if target.mean_adjusted_score <= config.critical_threshold {
        return Err(ExposureError::NotCritical {
            destination: target.destination.clone(),
            score: target.mean_adjusted_score,
            threshold: config.critical_threshold,
        });
    }

    let others = move || {
        portfolio
            .iter()
            .filter(move |a| a.destination != target.destination && a.key != target.key)
    };

    let regional = safest(
        others().filter(|a| a.region == target.region),
        config.safe_threshold,
    );
    let (substitute, phase) = match regional {
        Some(found) => (found, SearchPhase::Regional),
        None => {
            debug!(
                "No safe substitute in {} for {}, searching globally",
                target.region, target.destination
            );
            match safest(others(), config.safe_threshold) {
                Some(found) => (found, SearchPhase::Global),
                None => {
                    info!(
                        "No safe alternative below {:.1} for {}",
                        config.safe_threshold, target.destination
                    );
                    return Ok(None);
                }
            }
        }
    };

    let recommendation = Recommendation {
        chosen: DestinationSummary::from(target),
        substitute: DestinationSummary::from(substitute),
        phase,
        score_delta: target.mean_adjusted_score - substitute.mean_adjusted_score,
        distance_km: target.coordinates.distance_km(&substitute.coordinates),
    };

    info!(
        "Recommend {} -> {} ({:?}, -{:.1} points, {:.0} km)",
        recommendation.chosen.destination,
        recommendation.substitute.destination,
        recommendation.phase,
        recommendation.score_delta,
        recommendation.distance_km
    );

    Ok(Some(recommendation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{AFRIQUE, ASIE, EUROPE_POLAIRE};
    use crate::Coordinates;

    fn kb() -> &'static KnowledgeBase {
        KnowledgeBase::global()
    }

    fn make_entry(
        name: &str,
        score: f64,
        region: &str,
        lat: f64,
        lon: f64,
    ) -> AggregatedDestination {
        AggregatedDestination {
            destination: name.to_string(),
            key: normalize(name),
            coordinates: Coordinates::new(lat, lon),
            cause: "test".to_string(),
            region: region.to_string(),
            total_travelers: 10,
            mean_adjusted_score: score,
            total_exposure: 10_000.0,
            trips: 1,
        }
    }

    fn make_portfolio() -> Vec<AggregatedDestination> {
        vec![
            make_entry("egypte", 95.0, AFRIQUE, 26.82, 30.80),
            make_entry("afrique du sud", 70.0, AFRIQUE, -30.55, 22.93),
            make_entry("norvege", 15.0, EUROPE_POLAIRE, 60.47, 8.46),
        ]
    }

    #[test]
    fn test_regional_preferred_over_lower_global() {
        let config = RecommenderConfig::new(75.0, 75.0);
        let rec = recommend(kb(), &make_portfolio(), "egypte", &config).unwrap().unwrap();

        assert_eq!(rec.substitute.destination, "afrique du sud");
        assert_eq!(rec.phase, SearchPhase::Regional);
        assert_eq!(rec.score_delta, 25.0);
        assert!(rec.distance_km > 6000.0 && rec.distance_km < 7000.0, "{}", rec.distance_km);
    }

    #[test]
    fn test_global_fallback() {
        // Default safe threshold 50: afrique du sud no longer qualifies
        let rec = recommend(kb(), &make_portfolio(), "egypte", &RecommenderConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(rec.substitute.destination, "norvege");
        assert_eq!(rec.phase, SearchPhase::Global);
        assert_eq!(rec.score_delta, 80.0);
    }

    #[test]
    fn test_no_safe_alternative() {
        let portfolio = vec![
            make_entry("egypte", 95.0, AFRIQUE, 26.82, 30.80),
            make_entry("maldives", 98.0, ASIE, 3.20, 73.22),
        ];
        let rec = recommend(kb(), &portfolio, "egypte", &RecommenderConfig::default()).unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn test_chosen_never_returned() {
        // The only sub-threshold entry in the region is the chosen one's twin
        let portfolio = vec![
            make_entry("egypte", 95.0, AFRIQUE, 26.82, 30.80),
            make_entry("Egypte", 20.0, AFRIQUE, 26.82, 30.80),
        ];
        let config = RecommenderConfig::new(75.0, 75.0);
        let rec = recommend(kb(), &portfolio, "egypte", &config).unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn test_ties_broken_by_name() {
        let portfolio = vec![
            make_entry("egypte", 95.0, AFRIQUE, 26.82, 30.80),
            make_entry("senegal", 30.0, AFRIQUE, 14.50, -14.45),
            make_entry("botswana", 30.0, AFRIQUE, -22.33, 24.68),
        ];
        for _ in 0..3 {
            let rec = recommend(kb(), &portfolio, "egypte", &RecommenderConfig::default())
                .unwrap()
                .unwrap();
            assert_eq!(rec.substitute.destination, "botswana");
        }
    }

    #[test]
    fn test_preconditions() {
        let portfolio = make_portfolio();
        let config = RecommenderConfig::default();

        assert!(matches!(
            recommend(kb(), &portfolio, "atlantis", &config),
            Err(ExposureError::DestinationNotInPortfolio(_))
        ));
        assert!(matches!(
            recommend(kb(), &portfolio, "afrique du sud", &config),
            Err(ExposureError::NotCritical { .. })
        ));
    }

    #[test]
    fn test_find_destination_by_alias() {
        let portfolio = make_portfolio();
        assert_eq!(find_destination(kb(), &portfolio, "Égypte").unwrap().destination, "egypte");
        assert_eq!(find_destination(kb(), &portfolio, "Egypt").unwrap().destination, "egypte");
        assert_eq!(find_destination(kb(), &portfolio, "Norway").unwrap().destination, "norvege");
        assert!(find_destination(kb(), &portfolio, "Mordor").is_none());
    }

    #[test]
    fn test_find_destination_uses_given_knowledge_base() {
        let mut custom = KnowledgeBase::new();
        custom.add_destination("egypte", 26.82, 30.80, 95.0, "Chaleur", AFRIQUE);
        custom.add_alias("pays des pharaons", "egypte");

        let portfolio = make_portfolio();
        assert!(find_destination(kb(), &portfolio, "Pays des Pharaons").is_none());
        assert_eq!(
            find_destination(&custom, &portfolio, "Pays des Pharaons")
                .unwrap()
                .destination,
            "egypte"
        );

        let rec = recommend(&custom, &portfolio, "pays des pharaons", &RecommenderConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(rec.substitute.destination, "norvege");
    }

    #[test]
    fn test_threshold_validation() {
        assert!(RecommenderConfig::default().validate().is_ok());
        assert!(RecommenderConfig::new(75.0, 75.0).validate().is_ok());
        assert!(RecommenderConfig::new(40.0, 60.0).validate().is_err());
        assert!(RecommenderConfig::new(120.0, 50.0).validate().is_err());
        assert!(RecommenderConfig::new(75.0, -1.0).validate().is_err());
    }
}
