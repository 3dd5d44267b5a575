//! Per-destination exposure aggregation
//!
//! Collapses enriched trip rows into one entry per destination text so the
//! map renders one point per place instead of one per booking.
//!
//! | Column                | Reducer |
//! |-----------------------|---------|
//! | total_travelers       | sum     |
//! | mean_adjusted_score   | mean    |
//! | total_exposure        | sum     |
//!
//! Rows whose destination did not resolve (no coordinates) are excluded.

use crate::knowledge::KnowledgeBase;
use crate::{Coordinates, EnrichedRecord, ExposureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Exposure of the portfolio to one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedDestination {
    /// Destination text as supplied by the source data
    pub destination: String,
    /// Canonical knowledge-base key it resolved to
    pub key: String,
    pub coordinates: Coordinates,
    pub cause: String,
    pub region: String,
    pub total_travelers: u64,
    /// Mean of the per-row adjusted scores (0-100)
    pub mean_adjusted_score: f64,
    pub total_exposure: f64,
    /// Number of trip rows merged into this entry
    pub trips: usize,
}

struct Accumulator<'a> {
    first: &'a EnrichedRecord,
    travelers: u64,
    score_sum: f64,
    exposure: f64,
    rows: usize,
}

/// Group resolved rows by destination text
///
/// Output is ordered by destination text; callers re-sort as needed.
pub fn aggregate(records: &[EnrichedRecord]) -> Vec<AggregatedDestination> {
    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    let mut excluded = 0usize;

    for record in records {
        if !record.is_resolved() {
            excluded += 1;
            continue;
        }

        let acc = groups
            .entry(record.trip.destination.as_str())
            .or_insert_with(|| Accumulator {
                first: record,
                travelers: 0,
                score_sum: 0.0,
                exposure: 0.0,
                rows: 0,
            });
        acc.travelers += u64::from(record.trip.travelers);
        acc.score_sum += record.adjusted_score;
        acc.exposure += record.financial_exposure;
        acc.rows += 1;
    }

    let aggregated: Vec<AggregatedDestination> = groups
        .into_iter()
        .filter_map(|(destination, acc)| {
            let profile = &acc.first.profile;
            let coordinates = profile.coordinates?;
            Some(AggregatedDestination {
                destination: destination.to_string(),
                key: profile.key.clone(),
                coordinates,
                cause: profile.cause.clone(),
                region: profile.region.clone(),
                total_travelers: acc.travelers,
                mean_adjusted_score: acc.score_sum / acc.rows as f64,
                total_exposure: acc.exposure,
                trips: acc.rows,
            })
        })
        .collect();

    info!(
        "Aggregated {} rows into {} destinations ({} unresolved rows excluded)",
        records.len() - excluded,
        aggregated.len(),
        excluded
    );

    aggregated
}

/// Keep rows from one region
pub fn filter_by_region(records: Vec<EnrichedRecord>, region: &str) -> Vec<EnrichedRecord> {
    records
        .into_iter()
        .filter(|r| r.profile.region == region)
        .collect()
}

/// Keep rows whose adjusted score is at least `min_score`
pub fn filter_by_min_score(records: Vec<EnrichedRecord>, min_score: f64) -> Vec<EnrichedRecord> {
    records
        .into_iter()
        .filter(|r| r.adjusted_score >= min_score)
        .collect()
}

/// Region and score filters of a dashboard view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub region: Option<String>,
    pub min_score: Option<f64>,
}

impl RecordFilter {
    /// Fail on a region label the knowledge base does not use
    pub fn validate(&self, kb: &KnowledgeBase) -> Result<()> {
        let Some(region) = &self.region else {
            return Ok(());
        };
        let known = kb.regions();
        if known.contains(&region.as_str()) {
            Ok(())
        } else {
            Err(ExposureError::InvalidConfig(format!(
                "unknown region {region:?}, expected one of: {}",
                known.join(", ")
            )))
        }
    }

    /// Rows passing every set filter
    pub fn apply(&self, records: &[EnrichedRecord]) -> Vec<EnrichedRecord> {
        let mut kept = records.to_vec();
        if let Some(region) = &self.region {
            kept = filter_by_region(kept, region);
        }
        if let Some(min) = self.min_score {
            kept = filter_by_min_score(kept, min);
        }
        kept
    }
}

/// Distinct regions among resolved rows, sorted
pub fn regions(records: &[EnrichedRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.is_resolved())
        .map(|r| r.profile.region.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sort by total exposure, highest first
pub fn sort_by_exposure(portfolio: &mut [AggregatedDestination]) {
    portfolio.sort_by(|a, b| {
        b.total_exposure
            .total_cmp(&a.total_exposure)
            .then_with(|| a.destination.cmp(&b.destination))
    });
}

/// Sort by mean adjusted score, highest first
pub fn sort_by_score(portfolio: &mut [AggregatedDestination]) {
    portfolio.sort_by(|a, b| {
        b.mean_adjusted_score
            .total_cmp(&a.mean_adjusted_score)
            .then_with(|| a.destination.cmp(&b.destination))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;
    use crate::scorer::{enrich, Scenario, ScoringParams};
    use crate::{Month, TripRecord};
    use proptest::prelude::*;

    fn params(spend: f64) -> ScoringParams {
        ScoringParams::new(Month::new(7).unwrap(), Scenario::Current).with_average_spend(spend)
    }

    fn enrich_trips(trips: Vec<TripRecord>, spend: f64) -> Vec<EnrichedRecord> {
        enrich(trips, KnowledgeBase::global(), &params(spend))
    }

    #[test]
    fn test_antarctique_travelers_summed() {
        let records = enrich_trips(
            vec![TripRecord::new("Antarctique", 10), TripRecord::new("Antarctique", 5)],
            1000.0,
        );
        let agg = aggregate(&records);

        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].destination, "Antarctique");
        assert_eq!(agg[0].total_travelers, 15);
        assert_eq!(agg[0].trips, 2);
        assert_eq!(agg[0].total_exposure, 15_000.0);
        assert_eq!(agg[0].key, "antarctique");
    }

    #[test]
    fn test_mean_score_across_rows() {
        let mut records = enrich_trips(
            vec![TripRecord::new("Maroc", 1), TripRecord::new("Maroc", 3)],
            100.0,
        );
        // Rows scored under different parameters still average
        records[1].adjusted_score = 80.0;

        let agg = aggregate(&records);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].mean_adjusted_score, 90.0);
        assert_eq!(agg[0].total_travelers, 4);
    }

    #[test]
    fn test_unresolved_rows_excluded() {
        let records = enrich_trips(
            vec![
                TripRecord::new("Atlantis", 100),
                TripRecord::new("Islande", 2),
            ],
            500.0,
        );
        let agg = aggregate(&records);

        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].destination, "Islande");
        assert_eq!(agg[0].total_travelers, 2);
    }

    #[test]
    fn test_groups_by_destination_text() {
        let records = enrich_trips(
            vec![TripRecord::new("USA", 1), TripRecord::new("Etats-Unis", 2)],
            500.0,
        );
        let agg = aggregate(&records);

        // Same profile, different text: two entries
        assert_eq!(agg.len(), 2);
        assert!(agg.iter().all(|a| a.key == "etats unis"));
    }

    #[test]
    fn test_empty_portfolio() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_filters() {
        let records = enrich_trips(
            vec![
                TripRecord::new("Maroc", 1),
                TripRecord::new("Norvège", 1),
                TripRecord::new("Japon", 1),
                TripRecord::new("Atlantis", 1),
            ],
            500.0,
        );

        assert_eq!(regions(&records), vec!["Afrique", "Asie", "Europe/Polaire"]);

        let africa = filter_by_region(records.clone(), "Afrique");
        assert_eq!(africa.len(), 1);
        assert_eq!(africa[0].trip.destination, "Maroc");

        let risky = filter_by_min_score(records, 50.0);
        let names: Vec<_> = risky.iter().map(|r| r.trip.destination.as_str()).collect();
        assert_eq!(names, vec!["Maroc", "Atlantis"]);
    }

    #[test]
    fn test_record_filter() {
        let records = enrich_trips(
            vec![
                TripRecord::new("Maroc", 1),
                TripRecord::new("Afrique du Sud", 1),
                TripRecord::new("Norvège", 1),
                TripRecord::new("Atlantis", 1),
            ],
            500.0,
        );

        // July: maroc 100, afrique du sud 60
        assert_eq!(RecordFilter::default().apply(&records).len(), 4);

        let filter = RecordFilter {
            region: Some("Afrique".to_string()),
            min_score: Some(96.0),
        };
        let kept = filter.apply(&records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].trip.destination, "Maroc");
    }

    #[test]
    fn test_record_filter_region_validated() {
        let kb = KnowledgeBase::global();
        let afrique = RecordFilter {
            region: Some("Afrique".to_string()),
            ..Default::default()
        };
        assert!(afrique.validate(kb).is_ok());
        assert!(RecordFilter::default().validate(kb).is_ok());

        let typo = RecordFilter {
            region: Some("Africa".to_string()),
            ..Default::default()
        };
        match typo.validate(kb) {
            Err(ExposureError::InvalidConfig(msg)) => assert!(msg.contains("Europe/Polaire")),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_sorting() {
        let records = enrich_trips(
            vec![
                TripRecord::new("Norvège", 10),
                TripRecord::new("Egypte", 2),
                TripRecord::new("France", 5),
            ],
            100.0,
        );
        let mut agg = aggregate(&records);

        sort_by_exposure(&mut agg);
        assert_eq!(agg[0].destination, "Norvège");

        sort_by_score(&mut agg);
        assert_eq!(agg[0].destination, "Egypte");
    }

    fn destination_strategy() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["Maroc", "Islande", "Japon", "Pérou", "Atlantis", "Mordor"])
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        // Fuzz: travelers are conserved over resolved rows
        #[test]
        fn fuzz_travelers_conserved(
            rows in prop::collection::vec((destination_strategy(), 0u32..500), 0..40),
        ) {
            let trips: Vec<TripRecord> =
                rows.iter().map(|(d, n)| TripRecord::new(*d, *n)).collect();
            let records = enrich_trips(trips, 750.0);

            let expected: u64 = records
                .iter()
                .filter(|r| r.is_resolved())
                .map(|r| u64::from(r.trip.travelers))
                .sum();
            let agg = aggregate(&records);
            let total: u64 = agg.iter().map(|a| a.total_travelers).sum();

            prop_assert_eq!(total, expected);
            for a in &agg {
                prop_assert!((0.0..=100.0).contains(&a.mean_adjusted_score));
            }
        }

        // Fuzz: exposure scales linearly with average spend
        #[test]
        fn fuzz_exposure_linear(
            rows in prop::collection::vec((destination_strategy(), 0u32..500), 1..20),
            spend in 1.0f64..5000.0,
            factor in 1u32..10,
        ) {
            let trips: Vec<TripRecord> =
                rows.iter().map(|(d, n)| TripRecord::new(*d, *n)).collect();
            let base = aggregate(&enrich_trips(trips.clone(), spend));
            let scaled = aggregate(&enrich_trips(trips, spend * factor as f64));

            prop_assert_eq!(base.len(), scaled.len());
            for (b, s) in base.iter().zip(scaled.iter()) {
                let expected = b.total_exposure * factor as f64;
                prop_assert!((s.total_exposure - expected).abs() <= 1e-6 * expected.max(1.0));
            }
        }
    }
}
