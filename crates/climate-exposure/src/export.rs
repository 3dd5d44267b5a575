//! GeoJSON export for the map front-end

use crate::aggregator::AggregatedDestination;
use crate::scorer::{Scenario, ScoringParams};
use crate::Month;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub generated_at: String,
    pub month: Month,
    pub scenario: Scenario,
    pub destinations: usize,
    pub total_travelers: u64,
}

impl ExportMetadata {
    pub fn new(portfolio: &[AggregatedDestination], params: &ScoringParams) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            month: params.month,
            scenario: params.scenario,
            destinations: portfolio.len(),
            total_travelers: portfolio.iter().map(|a| a.total_travelers).sum(),
        }
    }
}

/// One Point feature per aggregated destination
pub fn to_geojson(
    portfolio: &[AggregatedDestination],
    params: &ScoringParams,
) -> serde_json::Value {
    let features: Vec<serde_json::Value> = portfolio
        .iter()
        .map(|a| {
            serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [a.coordinates.longitude, a.coordinates.latitude]
                },
                "properties": {
                    "destination": a.destination,
                    "key": a.key,
                    "cause": a.cause,
                    "region": a.region,
                    "travelers": a.total_travelers,
                    "score": a.mean_adjusted_score,
                    "exposure": a.total_exposure
                }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
        "metadata": ExportMetadata::new(portfolio, params)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::knowledge::KnowledgeBase;
    use crate::scorer::enrich;
    use crate::TripRecord;

    #[test]
    fn test_geojson_feature_collection() {
        let params = ScoringParams::new(Month::new(7).unwrap(), Scenario::Pessimistic);
        let records = enrich(
            vec![
                TripRecord::new("Maroc", 3),
                TripRecord::new("Islande", 2),
                TripRecord::new("Atlantis", 9),
            ],
            KnowledgeBase::global(),
            &params,
        );
        let geojson = to_geojson(&aggregate(&records), &params);

        assert_eq!(geojson["type"], "FeatureCollection");
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);

        // Islande sorts before Maroc; coordinates are [lon, lat]
        let islande = &features[0];
        assert_eq!(islande["geometry"]["coordinates"][0], -19.02);
        assert_eq!(islande["geometry"]["coordinates"][1], 64.96);
        assert_eq!(islande["properties"]["travelers"], 2);
        assert_eq!(features[1]["properties"]["score"], 100.0);

        assert_eq!(geojson["metadata"]["month"], 7);
        assert_eq!(geojson["metadata"]["scenario"], "pessimistic");
        assert_eq!(geojson["metadata"]["total_travelers"], 5);
    }

    #[test]
    fn test_geojson_empty() {
        let params = ScoringParams::new(Month::new(1).unwrap(), Scenario::Current);
        let geojson = to_geojson(&[], &params);
        assert!(geojson["features"].as_array().unwrap().is_empty());
        assert_eq!(geojson["metadata"]["destinations"], 0);
    }
}
