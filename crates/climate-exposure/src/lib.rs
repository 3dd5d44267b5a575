//! Climate Exposure Engine
//!
//! Resolves free-text trip destinations to physical-climate vulnerability
//! profiles, adjusts them for season and climate scenario, aggregates
//! traveler and financial exposure per destination, and recommends
//! lower-risk substitutes.
//!
//! # Pipeline
//!
//! ```text
//! trips ─▶ resolve ─▶ score(month, scenario) ─▶ aggregate ─▶ recommend
//! ```
//!
//! # Scoring Model
//!
//! ```text
//! adjusted = clamp(base + season(cause, hemisphere, month) + scenario, 0, 100)
//! ```
//!
//! | Term     | Value | Condition |
//! |----------|-------|-----------|
//! | season   | +15   | heat-class cause, local hot season |
//! | season   | −10   | heat-class cause, outside hot season |
//! | season   | 0     | any other cause |
//! | scenario | 0     | current trajectory |
//! | scenario | +20   | pessimistic trajectory |

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod aggregator;
pub mod config;
pub mod export;
pub mod knowledge;
pub mod loader;
pub mod portfolio;
pub mod recommender;
pub mod resolver;
pub mod scorer;
pub mod segment;

pub use aggregator::AggregatedDestination;
pub use config::EngineConfig;
pub use knowledge::{KnowledgeBase, RiskProfile};
pub use recommender::{Recommendation, RecommenderConfig, SearchPhase};
pub use scorer::{Scenario, ScoringParams};

/// Lowest possible vulnerability score
pub const SCORE_MIN: f64 = 0.0;

/// Highest possible vulnerability score
pub const SCORE_MAX: f64 = 100.0;

/// Base score reported for destinations missing from the knowledge base
pub const UNKNOWN_BASE_SCORE: f64 = 50.0;

/// A destination above this score may be substituted
pub const CRITICAL_THRESHOLD: f64 = 75.0;

/// Substitutes must score strictly below this
pub const SAFE_THRESHOLD: f64 = 50.0;

/// Travelers above this score count toward the "at risk" KPI
pub const HIGH_RISK_THRESHOLD: f64 = 80.0;

/// Alert-zone listing threshold
pub const ALERT_THRESHOLD: f64 = 75.0;

/// "Most exposed" chart threshold
pub const TOP_EXPOSED_THRESHOLD: f64 = 70.0;

/// Scenario-wide spend per traveler when rows carry none
pub const DEFAULT_AVERAGE_SPEND: f64 = 1_000.0;

#[derive(Error, Debug)]
pub enum ExposureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Month must be between 1 and 12, got {0}")]
    InvalidMonth(i64),
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("Destination not in portfolio: {0}")]
    DestinationNotInPortfolio(String),
    #[error(
        "Destination {destination} scores {score:.1}, not above critical threshold {threshold:.1}"
    )]
    NotCritical {
        destination: String,
        score: f64,
        threshold: f64,
    },
    #[error("Invalid thresholds: safe {safe:.1}, critical {critical:.1}")]
    InvalidThresholds { safe: f64, critical: f64 },
    #[error("Invalid feature matrix: {0}")]
    InvalidFeatures(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ExposureError>;

/// Hemisphere of a destination, which decides its local hot season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    /// Assign hemisphere from latitude (equator counts as North)
    pub fn from_latitude(lat: f64) -> Self {
        if lat < 0.0 {
            Hemisphere::South
        } else {
            Hemisphere::North
        }
    }

    /// Months of the local hot season
    pub fn hot_season(&self) -> [u8; 3] {
        match self {
            Hemisphere::North => [6, 7, 8],
            Hemisphere::South => [12, 1, 2],
        }
    }

    pub fn is_hot_month(&self, month: Month) -> bool {
        self.hot_season().contains(&month.get())
    }
}

/// Calendar month, always in 1..=12
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Month(u8);

impl Month {
    pub fn new(month: u8) -> Result<Self> {
        if (1..=12).contains(&month) {
            Ok(Self(month))
        } else {
            Err(ExposureError::InvalidMonth(month as i64))
        }
    }

    /// Month of the current UTC date
    pub fn current() -> Self {
        Self(chrono::Utc::now().month() as u8)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Month> {
        (1..=12).map(Month)
    }
}

impl TryFrom<u8> for Month {
    type Error = ExposureError;

    fn try_from(value: u8) -> Result<Self> {
        Month::new(value)
    }
}

impl From<Month> for u8 {
    fn from(month: Month) -> u8 {
        month.0
    }
}

impl FromStr for Month {
    type Err = ExposureError;

    fn from_str(s: &str) -> Result<Self> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| ExposureError::InvalidConfig(format!("month is not a number: {s}")))?;
        u8::try_from(value)
            .map_err(|_| ExposureError::InvalidMonth(value))
            .and_then(Month::new)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// One trip or booking row as supplied by the source data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Raw free-text destination
    pub destination: String,
    /// Number of travelers on the booking
    pub travelers: u32,
    /// Per-traveler spend, overrides the scenario-wide average
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
}

impl TripRecord {
    pub fn new(destination: impl Into<String>, travelers: u32) -> Self {
        Self {
            destination: destination.into(),
            travelers,
            spend: None,
        }
    }

    pub fn with_spend(mut self, spend: f64) -> Self {
        self.spend = Some(spend);
        self
    }
}

/// Trip joined with its resolved profile and scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub trip: TripRecord,
    pub profile: RiskProfile,
    /// Season- and scenario-adjusted score (0-100)
    pub adjusted_score: f64,
    /// travelers × spend
    pub financial_exposure: f64,
}

impl EnrichedRecord {
    /// Whether the destination resolved to a mappable profile
    pub fn is_resolved(&self) -> bool {
        self.profile.is_resolved()
    }
}

/// Haversine distance between two points in km
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const R: f64 = 6371.0; // Earth radius in km

    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let dlat = (lat2 - lat1) * PI / 180.0;
    let dlon = (lon2 - lon1) * PI / 180.0;

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    R * c
}
