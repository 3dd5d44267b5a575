//! Three-way portfolio segmentation
//!
//! Destinations are clustered over a small feature vector, then clusters are
//! ranked by the mean of one feature and labelled best / neutral / worst.
//! Cluster indices from the [`Clusterer`] carry no meaning; only the ranking
//! decides the labels.

use crate::aggregator::AggregatedDestination;
use crate::{ExposureError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Number of segments produced
pub const SEGMENT_COUNT: usize = 3;

/// Feature order used by [`segment_destinations`]
pub const DESTINATION_FEATURES: [&str; 3] = ["score", "travelers", "exposure"];

/// Clustering capability: assign each row to one of at most `k` groups
pub trait Clusterer {
    fn cluster(&self, features: &[Vec<f64>], k: usize) -> Result<Vec<usize>>;
}

/// Deterministic k-means
///
/// Features are z-scored, seeded farthest-first from the point farthest from
/// the mean, then refined with Lloyd iterations until assignments settle.
/// Ties always go to the lowest index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeans {
    pub max_iterations: usize,
}

impl Default for KMeans {
    fn default() -> Self {
        Self { max_iterations: 100 }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }
    best_idx
}

/// Reject empty-width, ragged or non-finite matrices; returns the width
fn check_matrix(features: &[Vec<f64>]) -> Result<usize> {
    let dim = features.first().map(Vec::len).unwrap_or(0);
    if dim == 0 {
        return Err(ExposureError::InvalidFeatures("rows have no features".into()));
    }
    for (i, row) in features.iter().enumerate() {
        if row.len() != dim {
            return Err(ExposureError::InvalidFeatures(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                dim
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ExposureError::InvalidFeatures(format!("row {} is not finite", i)));
        }
    }
    Ok(dim)
}

/// Scale each column to zero mean and unit variance (constant columns to 0)
fn standardize(features: &[Vec<f64>], dim: usize) -> Vec<Vec<f64>> {
    let n = features.len() as f64;
    let mut means = vec![0.0; dim];
    let mut stds = vec![0.0; dim];

    for j in 0..dim {
        means[j] = features.iter().map(|r| r[j]).sum::<f64>() / n;
        let var = features.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
        stds[j] = var.sqrt();
    }

    features
        .iter()
        .map(|row| {
            (0..dim)
                .map(|j| if stds[j] > 0.0 { (row[j] - means[j]) / stds[j] } else { 0.0 })
                .collect()
        })
        .collect()
}

/// Farthest-first seeding; stops early when only duplicates remain
fn seed_centroids(points: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let origin = vec![0.0; points[0].len()];
    let mut first = 0;
    for (i, p) in points.iter().enumerate() {
        if squared_distance(p, &origin) > squared_distance(&points[first], &origin) {
            first = i;
        }
    }

    let mut centroids = vec![points[first].clone()];
    while centroids.len() < k {
        let mut best_idx = 0;
        let mut best_dist = 0.0;
        for (i, p) in points.iter().enumerate() {
            let d = centroids
                .iter()
                .map(|c| squared_distance(p, c))
                .fold(f64::MAX, f64::min);
            if d > best_dist {
                best_dist = d;
                best_idx = i;
            }
        }
        if best_dist == 0.0 {
            break;
        }
        centroids.push(points[best_idx].clone());
    }
    centroids
}

impl Clusterer for KMeans {
    fn cluster(&self, features: &[Vec<f64>], k: usize) -> Result<Vec<usize>> {
        if k == 0 {
            return Err(ExposureError::InvalidFeatures("k must be at least 1".into()));
        }
        if features.is_empty() {
            return Ok(Vec::new());
        }
        let dim = check_matrix(features)?;

        let points = standardize(features, dim);
        let mut centroids = seed_centroids(&points, k.min(points.len()));
        let mut labels: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();

        for iteration in 0..self.max_iterations {
            // Update: empty clusters keep their previous centroid
            for (c, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<&Vec<f64>> = points
                    .iter()
                    .zip(&labels)
                    .filter(|(_, l)| **l == c)
                    .map(|(p, _)| p)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                for j in 0..dim {
                    centroid[j] = members.iter().map(|p| p[j]).sum::<f64>() / members.len() as f64;
                }
            }

            let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
            if next == labels {
                debug!("k-means converged after {} iterations", iteration + 1);
                break;
            }
            labels = next;
        }

        Ok(labels)
    }
}

/// Ordinal segment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentLabel {
    Best,
    Neutral,
    Worst,
}

impl SegmentLabel {
    /// Labels for `n` ranked clusters, best first
    pub fn for_ranked(n: usize) -> &'static [SegmentLabel] {
        match n {
            0 => &[],
            1 => &[SegmentLabel::Neutral],
            2 => &[SegmentLabel::Best, SegmentLabel::Worst],
            _ => &[SegmentLabel::Best, SegmentLabel::Neutral, SegmentLabel::Worst],
        }
    }
}

/// Direction of the ranking feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankOrder {
    LowerIsBetter,
    HigherIsBetter,
}

/// One entity to segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInput {
    pub id: String,
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub label: SegmentLabel,
    pub members: Vec<String>,
    /// Mean of each raw (unscaled) feature over the members
    pub feature_means: Vec<f64>,
}

/// Cluster entities into at most three segments ranked by one feature
pub fn segment(
    inputs: &[SegmentInput],
    clusterer: &dyn Clusterer,
    rank_feature: usize,
    order: RankOrder,
) -> Result<Vec<Segment>> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let features: Vec<Vec<f64>> = inputs.iter().map(|i| i.features.clone()).collect();
    let dim = check_matrix(&features)?;
    if rank_feature >= dim {
        return Err(ExposureError::InvalidFeatures(format!(
            "rank feature {} out of {} features",
            rank_feature, dim
        )));
    }

    let labels = clusterer.cluster(&features, SEGMENT_COUNT)?;
    if labels.len() != inputs.len() {
        return Err(ExposureError::InvalidFeatures(format!(
            "clusterer returned {} labels for {} rows",
            labels.len(),
            inputs.len()
        )));
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, label) in labels.iter().enumerate() {
        groups.entry(*label).or_default().push(row);
    }
    if groups.len() > SEGMENT_COUNT {
        return Err(ExposureError::InvalidFeatures(format!(
            "clusterer returned {} clusters, expected at most {}",
            groups.len(),
            SEGMENT_COUNT
        )));
    }

    let mut ranked: Vec<(Vec<usize>, Vec<f64>)> = groups
        .into_values()
        .map(|rows| {
            let means = (0..dim)
                .map(|j| rows.iter().map(|r| features[*r][j]).sum::<f64>() / rows.len() as f64)
                .collect();
            (rows, means)
        })
        .collect();

    ranked.sort_by(|(rows_a, means_a), (rows_b, means_b)| {
        let by_mean = means_a[rank_feature].total_cmp(&means_b[rank_feature]);
        let by_mean = match order {
            RankOrder::LowerIsBetter => by_mean,
            RankOrder::HigherIsBetter => by_mean.reverse(),
        };
        by_mean.then_with(|| inputs[rows_a[0]].id.cmp(&inputs[rows_b[0]].id))
    });

    let ordinal = SegmentLabel::for_ranked(ranked.len());
    let segments: Vec<Segment> = ranked
        .into_iter()
        .zip(ordinal)
        .map(|((rows, feature_means), label)| Segment {
            label: *label,
            members: rows.iter().map(|r| inputs[*r].id.clone()).collect(),
            feature_means,
        })
        .collect();

    info!("Segmented {} entities into {} segments", inputs.len(), segments.len());
    Ok(segments)
}

/// Segment aggregated destinations by (score, travelers, exposure), lowest score best
pub fn segment_destinations(
    portfolio: &[AggregatedDestination],
    clusterer: &dyn Clusterer,
) -> Result<Vec<Segment>> {
    let inputs: Vec<SegmentInput> = portfolio
        .iter()
        .map(|a| SegmentInput {
            id: a.destination.clone(),
            features: vec![a.mean_adjusted_score, a.total_travelers as f64, a.total_exposure],
        })
        .collect();

    segment(&inputs, clusterer, 0, RankOrder::LowerIsBetter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinates;
    use proptest::prelude::*;

    fn make_input(id: &str, features: &[f64]) -> SegmentInput {
        SegmentInput {
            id: id.to_string(),
            features: features.to_vec(),
        }
    }

    fn make_entry(name: &str, score: f64, travelers: u64) -> AggregatedDestination {
        AggregatedDestination {
            destination: name.to_string(),
            key: name.to_lowercase(),
            coordinates: Coordinates::new(0.0, 0.0),
            cause: "test".to_string(),
            region: "test".to_string(),
            total_travelers: travelers,
            mean_adjusted_score: score,
            total_exposure: travelers as f64 * 1000.0,
            trips: 1,
        }
    }

    /// Fixed labels, for checking that ranking ignores cluster indices
    struct FixedLabels(Vec<usize>);

    impl Clusterer for FixedLabels {
        fn cluster(&self, _features: &[Vec<f64>], _k: usize) -> Result<Vec<usize>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_kmeans_separates_groups() {
        let features = vec![
            vec![1.0],
            vec![2.0],
            vec![50.0],
            vec![51.0],
            vec![99.0],
            vec![100.0],
        ];
        let labels = KMeans::default().cluster(&features, 3).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[2]);
        assert_ne!(labels[2], labels[4]);
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_kmeans_deterministic() {
        let features: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![(i * 37 % 101) as f64, (i * 13 % 7) as f64])
            .collect();
        let a = KMeans::default().cluster(&features, 3).unwrap();
        let b = KMeans::default().cluster(&features, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kmeans_small_inputs() {
        let kmeans = KMeans::default();
        assert!(kmeans.cluster(&[], 3).unwrap().is_empty());

        let two = kmeans.cluster(&[vec![0.0], vec![10.0]], 3).unwrap();
        assert_ne!(two[0], two[1]);

        let same = kmeans.cluster(&vec![vec![5.0, 5.0]; 4], 3).unwrap();
        assert!(same.iter().all(|l| *l == same[0]));
    }

    #[test]
    fn test_kmeans_rejects_bad_matrix() {
        let kmeans = KMeans::default();
        assert!(kmeans.cluster(&[vec![1.0]], 0).is_err());
        assert!(kmeans.cluster(&[vec![1.0, 2.0], vec![1.0]], 3).is_err());
        assert!(kmeans.cluster(&[vec![f64::NAN]], 3).is_err());
        assert!(kmeans.cluster(&[vec![]], 3).is_err());
    }

    #[test]
    fn test_segment_labels_follow_ranking() {
        let inputs = vec![
            make_input("a", &[90.0]),
            make_input("b", &[10.0]),
            make_input("c", &[50.0]),
        ];

        // Cluster index order deliberately differs from score order
        let lower = RankOrder::LowerIsBetter;
        let segments = segment(&inputs, &FixedLabels(vec![0, 2, 1]), 0, lower).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].label, SegmentLabel::Best);
        assert_eq!(segments[0].members, vec!["b"]);
        assert_eq!(segments[1].label, SegmentLabel::Neutral);
        assert_eq!(segments[1].members, vec!["c"]);
        assert_eq!(segments[2].label, SegmentLabel::Worst);
        assert_eq!(segments[2].members, vec!["a"]);

        let relabelled = segment(&inputs, &FixedLabels(vec![2, 1, 0]), 0, lower).unwrap();
        assert_eq!(segments, relabelled);

        let higher = RankOrder::HigherIsBetter;
        let reversed = segment(&inputs, &FixedLabels(vec![0, 2, 1]), 0, higher).unwrap();
        assert_eq!(reversed[0].members, vec!["a"]);
        assert_eq!(reversed[0].label, SegmentLabel::Best);
    }

    #[test]
    fn test_segment_two_clusters() {
        let inputs = vec![make_input("x", &[1.0]), make_input("y", &[2.0])];
        let segments =
            segment(&inputs, &FixedLabels(vec![7, 3]), 0, RankOrder::LowerIsBetter).unwrap();
        let labels: Vec<_> = segments.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![SegmentLabel::Best, SegmentLabel::Worst]);
    }

    #[test]
    fn test_segment_rejects_bad_clusterer() {
        let inputs = vec![
            make_input("a", &[1.0]),
            make_input("b", &[2.0]),
            make_input("c", &[3.0]),
            make_input("d", &[4.0]),
        ];
        let lower = RankOrder::LowerIsBetter;
        assert!(segment(&inputs, &FixedLabels(vec![0, 1, 2, 3]), 0, lower).is_err());
        assert!(segment(&inputs, &FixedLabels(vec![0]), 0, lower).is_err());
        assert!(segment(&inputs, &KMeans::default(), 5, lower).is_err());
    }

    #[test]
    fn test_segment_destinations() {
        let portfolio = vec![
            make_entry("Norvège", 15.0, 20),
            make_entry("Islande", 25.0, 18),
            make_entry("Japon", 40.0, 100),
            make_entry("France", 55.0, 110),
            make_entry("Egypte", 100.0, 40),
            make_entry("Maldives", 98.0, 35),
        ];
        let segments = segment_destinations(&portfolio, &KMeans::default()).unwrap();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].label, SegmentLabel::Best);
        assert_eq!(segments[2].label, SegmentLabel::Worst);
        assert!(segments[2].members.contains(&"Egypte".to_string()));
        assert!(segments[0].feature_means[0] < segments[2].feature_means[0]);

        let members: usize = segments.iter().map(|s| s.members.len()).sum();
        assert_eq!(members, portfolio.len());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        // Fuzz: one label per row, never more than k clusters
        #[test]
        fn fuzz_kmeans_labels(
            rows in prop::collection::vec(prop::collection::vec(-1000.0f64..1000.0, 3), 1..40),
            k in 1usize..5,
        ) {
            let labels = KMeans::default().cluster(&rows, k).unwrap();
            prop_assert_eq!(labels.len(), rows.len());
            prop_assert!(labels.iter().all(|l| *l < k));
        }
    }
}
