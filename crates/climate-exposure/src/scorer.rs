//! Seasonal and scenario scoring
//!
//! Additive heuristic on top of the knowledge-base baseline:
//! adjusted = clamp(base + season + scenario, 0, 100)
//!
//! Only heat-class causes (heat, drought, fire, water stress or scarcity,
//! aridity) are seasonal: +15 during the local hot season, −10 the rest of
//! the year.

use crate::knowledge::{KnowledgeBase, RiskProfile};
use crate::resolver::{normalize, resolve_with};
use crate::{
    EnrichedRecord, ExposureError, Hemisphere, Month, Result, TripRecord, DEFAULT_AVERAGE_SPEND,
    SCORE_MAX, SCORE_MIN,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Added to heat-class causes in the local hot season
pub const HOT_SEASON_BONUS: f64 = 15.0;

/// Subtracted from heat-class causes outside the hot season
pub const OFF_SEASON_PENALTY: f64 = 10.0;

/// Cause fragments (ASCII-folded) that mark a heat-class risk
const HEAT_CLASS_KEYWORDS: &[&str] = &[
    "heat",
    "chaleur",
    "canicule",
    "drought",
    "secheresse",
    "fire",
    "incendie",
    "feux",
    "water stress",
    "hydric",
    "hydrique",
    "aridity",
    "aridite",
    "water scarcity",
    "penurie eau",
    "penurie d eau",
    "assechement",
];

/// Climate trajectory applied uniformly to every score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Current trajectory
    #[default]
    Current,
    /// Pessimistic trajectory
    Pessimistic,
}

impl Scenario {
    /// Severity offset added to every score
    pub fn offset(&self) -> f64 {
        match self {
            Scenario::Current => 0.0,
            Scenario::Pessimistic => 20.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Current => "current",
            Scenario::Pessimistic => "pessimistic",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = ExposureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "current" => Ok(Scenario::Current),
            "pessimistic" => Ok(Scenario::Pessimistic),
            other => Err(ExposureError::UnknownScenario(other.to_string())),
        }
    }
}

/// Per-request scoring parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub month: Month,
    pub scenario: Scenario,
    /// Spend per traveler for rows without their own spend
    pub average_spend: f64,
}

impl ScoringParams {
    pub fn new(month: Month, scenario: Scenario) -> Self {
        Self {
            month,
            scenario,
            average_spend: DEFAULT_AVERAGE_SPEND,
        }
    }

    pub fn with_average_spend(mut self, average_spend: f64) -> Self {
        self.average_spend = average_spend;
        self
    }
}

/// Whether a cause is sensitive to seasonal temperature
pub fn is_heat_class(cause: &str) -> bool {
    let folded = normalize(cause);
    HEAT_CLASS_KEYWORDS.iter().any(|kw| folded.contains(kw))
}

/// Seasonal term of the score (+15, −10 or 0)
pub fn seasonal_adjustment(cause: &str, hemisphere: Hemisphere, month: Month) -> f64 {
    if !is_heat_class(cause) {
        return 0.0;
    }
    if hemisphere.is_hot_month(month) {
        HOT_SEASON_BONUS
    } else {
        -OFF_SEASON_PENALTY
    }
}

/// Adjusted score, clipped to 0-100
pub fn score(
    base_score: f64,
    cause: &str,
    hemisphere: Hemisphere,
    month: Month,
    scenario_bonus: f64,
) -> f64 {
    let raw = base_score + seasonal_adjustment(cause, hemisphere, month) + scenario_bonus;
    raw.clamp(SCORE_MIN, SCORE_MAX)
}

/// Adjusted score of a profile under the given parameters
pub fn score_profile(profile: &RiskProfile, params: &ScoringParams) -> f64 {
    score(
        profile.base_score,
        &profile.cause,
        profile.hemisphere,
        params.month,
        params.scenario.offset(),
    )
}

/// Resolve, score and price one trip
pub fn enrich_record(
    trip: TripRecord,
    kb: &KnowledgeBase,
    params: &ScoringParams,
) -> EnrichedRecord {
    let profile = resolve_with(kb, &trip.destination).clone();
    let adjusted_score = score_profile(&profile, params);
    let spend = trip.spend.unwrap_or(params.average_spend);
    let financial_exposure = trip.travelers as f64 * spend;

    debug!(
        "Enriched {:?}: key={} base={:.0} adjusted={:.1} exposure={:.2}",
        trip.destination, profile.key, profile.base_score, adjusted_score, financial_exposure
    );

    EnrichedRecord {
        trip,
        profile,
        adjusted_score,
        financial_exposure,
    }
}

/// Enrich every trip; unresolved rows are kept and flagged
pub fn enrich(
    trips: Vec<TripRecord>,
    kb: &KnowledgeBase,
    params: &ScoringParams,
) -> Vec<EnrichedRecord> {
    let enriched: Vec<EnrichedRecord> = trips
        .into_iter()
        .map(|t| enrich_record(t, kb, params))
        .collect();

    let resolved = enriched.iter().filter(|r| r.is_resolved()).count();
    info!(
        "Enriched {} trips for month {} / {} scenario ({} resolved, {} unresolved)",
        enriched.len(),
        params.month,
        params.scenario,
        resolved,
        enriched.len() - resolved
    );

    enriched
}
