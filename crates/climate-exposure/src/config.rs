//! Engine configuration
//!
//! Layered: defaults, then an optional JSON file, then `CLIMATE_*`
//! environment variables. CLI flags are applied last by the binary.

use crate::recommender::RecommenderConfig;
use crate::scorer::{Scenario, ScoringParams};
use crate::{
    ExposureError, Month, Result, ALERT_THRESHOLD, CRITICAL_THRESHOLD, DEFAULT_AVERAGE_SPEND,
    HIGH_RISK_THRESHOLD, SAFE_THRESHOLD, SCORE_MAX, SCORE_MIN, TOP_EXPOSED_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const ENV_MONTH: &str = "CLIMATE_MONTH";
pub const ENV_SCENARIO: &str = "CLIMATE_SCENARIO";
pub const ENV_AVG_SPEND: &str = "CLIMATE_AVG_SPEND";
pub const ENV_SAFE_THRESHOLD: &str = "CLIMATE_SAFE_THRESHOLD";
pub const ENV_CRITICAL_THRESHOLD: &str = "CLIMATE_CRITICAL_THRESHOLD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scoring month; current month when unset
    pub month: Option<Month>,
    pub scenario: Scenario,
    pub average_spend: f64,
    pub critical_threshold: f64,
    pub safe_threshold: f64,
    /// KPI "travelers at risk" threshold
    pub high_risk_threshold: f64,
    pub alert_threshold: f64,
    pub alert_limit: usize,
    pub top_exposed_threshold: f64,
    pub top_exposed_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            month: None,
            scenario: Scenario::Current,
            average_spend: DEFAULT_AVERAGE_SPEND,
            critical_threshold: CRITICAL_THRESHOLD,
            safe_threshold: SAFE_THRESHOLD,
            high_risk_threshold: HIGH_RISK_THRESHOLD,
            alert_threshold: ALERT_THRESHOLD,
            alert_limit: 8,
            top_exposed_threshold: TOP_EXPOSED_THRESHOLD,
            top_exposed_limit: 10,
        }
    }
}

fn parse_env_f64(name: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| ExposureError::InvalidConfig(format!("{name} is not a number: {value}")))
}

impl EngineConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `CLIMATE_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MONTH) {
            self.month = Some(v.parse()?);
        }
        if let Some(v) = lookup(ENV_SCENARIO) {
            self.scenario = v.parse()?;
        }
        if let Some(v) = lookup(ENV_AVG_SPEND) {
            self.average_spend = parse_env_f64(ENV_AVG_SPEND, &v)?;
        }
        if let Some(v) = lookup(ENV_SAFE_THRESHOLD) {
            self.safe_threshold = parse_env_f64(ENV_SAFE_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_CRITICAL_THRESHOLD) {
            self.critical_threshold = parse_env_f64(ENV_CRITICAL_THRESHOLD, &v)?;
        }
        debug!("Config after overrides: {:?}", self);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.average_spend.is_finite() || self.average_spend < 0.0 {
            return Err(ExposureError::InvalidConfig(format!(
                "average spend must be non-negative, got {}",
                self.average_spend
            )));
        }

        for (name, value) in [
            ("high_risk_threshold", self.high_risk_threshold),
            ("alert_threshold", self.alert_threshold),
            ("top_exposed_threshold", self.top_exposed_threshold),
        ] {
            if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                return Err(ExposureError::InvalidConfig(format!(
                    "{name} must be within 0-100, got {value}"
                )));
            }
        }

        self.recommender_config().validate()
    }

    /// Configured month, else the current one
    pub fn month_or_current(&self) -> Month {
        self.month.unwrap_or_else(Month::current)
    }

    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams::new(self.month_or_current(), self.scenario)
            .with_average_spend(self.average_spend)
    }

    pub fn recommender_config(&self) -> RecommenderConfig {
        RecommenderConfig::new(self.critical_threshold, self.safe_threshold)
    }
}
