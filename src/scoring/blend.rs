use serde::{Deserialize, Serialize};

use crate::scoring::{CategoryId, CategoryScoreTuple, CategoryWeights, ProvinceScores, Sector};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryContribution {
    pub category_id: CategoryId,
    pub raw_score: Option<f64>,
    pub weight: f64,
    pub weighted_score: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSubScores {
    pub current_status: f64,
    pub trend: f64,
    pub potential: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlendOutcome {
    pub blended_score: f64,
    pub data_available: bool,
    pub per_category: Vec<CategoryContribution>,
    pub composite: CompositeSubScores,
}

// missing observations count in neither numerator nor denominator
#[derive(Debug, Default, Clone, Copy)]
struct WeightedMean {
    weighted_sum: f64,
    total_weight: f64,
}

impl WeightedMean {
    fn push(&mut self, value: Option<f64>, weight: f64) {
        if let Some(value) = value {
            self.weighted_sum += value * weight;
            self.total_weight += weight;
        }
    }

    fn value(&self) -> Option<f64> {
        if self.total_weight > 0.0 {
            Some((self.weighted_sum / self.total_weight).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

pub fn blend(scores: &ProvinceScores, weights: &CategoryWeights, sector: Sector) -> BlendOutcome {
    let mut primary = WeightedMean::default();
    let mut current_status = WeightedMean::default();
    let mut trend = WeightedMean::default();
    let mut per_category = Vec::with_capacity(weights.len());

    for (category_id, weight) in weights.iter() {
        let tuple = scores
            .get(&category_id)
            .copied()
            .unwrap_or_else(CategoryScoreTuple::default);
        let raw_score = tuple.primary(sector);

        primary.push(raw_score, weight);
        current_status.push(tuple.current_status, weight);
        trend.push(tuple.trend, weight);

        per_category.push(CategoryContribution {
            category_id,
            raw_score,
            weight,
            weighted_score: raw_score.map(|s| s * weight).unwrap_or(0.0),
        });
    }

    let blended = primary.value();
    BlendOutcome {
        blended_score: blended.unwrap_or(0.0),
        data_available: blended.is_some(),
        per_category,
        composite: CompositeSubScores {
            current_status: current_status.value().unwrap_or(0.0),
            trend: trend.value().unwrap_or(0.0),
            potential: blended.unwrap_or(0.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::weights::normalize_weights;
    use std::collections::HashMap;

    fn tuple(priority: Option<f64>, attractiveness: Option<f64>) -> CategoryScoreTuple {
        CategoryScoreTuple {
            current_status: None,
            trend: None,
            attractiveness,
            priority,
        }
    }

    fn equal_weights(ids: &[CategoryId]) -> CategoryWeights {
        normalize_weights(ids, &HashMap::new()).unwrap()
    }

    #[test]
    fn equal_weights_average_primary_scores() {
        let mut scores = ProvinceScores::new();
        scores.insert(1, tuple(Some(0.8), None));
        scores.insert(2, tuple(Some(0.4), None));
        let outcome = blend(&scores, &equal_weights(&[1, 2]), Sector::Public);
        assert!((outcome.blended_score - 0.6).abs() < 1e-12);
        assert!(outcome.data_available);
        assert_eq!(outcome.per_category.len(), 2);
        assert!((outcome.per_category[0].weighted_score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn sector_selects_primary_field() {
        let mut scores = ProvinceScores::new();
        scores.insert(1, tuple(Some(0.2), Some(0.9)));
        let weights = equal_weights(&[1]);
        assert_eq!(blend(&scores, &weights, Sector::Public).blended_score, 0.2);
        assert_eq!(blend(&scores, &weights, Sector::Private).blended_score, 0.9);
    }

    #[test]
    fn missing_category_is_excluded_not_zeroed() {
        let mut scores = ProvinceScores::new();
        scores.insert(1, tuple(Some(0.37), None));
        scores.insert(2, tuple(None, Some(0.99)));
        for proposal in [0.25, 0.5, 0.75] {
            let weights =
                normalize_weights(&[1, 2], &HashMap::from([(1, proposal)])).unwrap();
            let outcome = blend(&scores, &weights, Sector::Public);
            assert!((outcome.blended_score - 0.37).abs() < 1e-12);
            assert_eq!(outcome.per_category[1].raw_score, None);
            assert_eq!(outcome.per_category[1].weighted_score, 0.0);
        }
    }

    #[test]
    fn stored_zero_counts_as_data() {
        let mut scores = ProvinceScores::new();
        scores.insert(1, tuple(Some(0.0), None));
        let outcome = blend(&scores, &equal_weights(&[1]), Sector::Public);
        assert_eq!(outcome.blended_score, 0.0);
        assert!(outcome.data_available);
    }

    #[test]
    fn province_without_data_reports_unavailable() {
        let outcome = blend(&ProvinceScores::new(), &equal_weights(&[1, 2]), Sector::Private);
        assert_eq!(outcome.blended_score, 0.0);
        assert!(!outcome.data_available);
        assert_eq!(outcome.composite, CompositeSubScores::default());
    }

    #[test]
    fn composite_scores_use_their_own_availability() {
        let mut scores = ProvinceScores::new();
        scores.insert(
            1,
            CategoryScoreTuple {
                current_status: Some(0.6),
                trend: None,
                attractiveness: Some(0.3),
                priority: Some(0.5),
            },
        );
        scores.insert(
            2,
            CategoryScoreTuple {
                current_status: Some(0.2),
                trend: Some(0.7),
                attractiveness: Some(0.1),
                priority: None,
            },
        );
        let weights = normalize_weights(&[1, 2], &HashMap::from([(1, 0.75)])).unwrap();
        let outcome = blend(&scores, &weights, Sector::Public);
        assert!((outcome.composite.current_status - (0.6 * 0.75 + 0.2 * 0.25)).abs() < 1e-12);
        assert!((outcome.composite.trend - 0.7).abs() < 1e-12);
        assert!((outcome.composite.potential - 0.5).abs() < 1e-12);
        assert_eq!(outcome.composite.potential, outcome.blended_score);
    }

    #[test]
    fn blending_is_deterministic() {
        let mut scores = ProvinceScores::new();
        scores.insert(3, tuple(Some(0.123456789), Some(0.5)));
        scores.insert(8, tuple(Some(0.987654321), Some(0.25)));
        scores.insert(5, tuple(Some(0.333333333), None));
        let weights =
            normalize_weights(&[3, 8, 5], &HashMap::from([(3, 0.41), (8, 0.27)])).unwrap();
        let first = blend(&scores, &weights, Sector::Public);
        let second = blend(&scores, &weights, Sector::Public);
        assert_eq!(first.blended_score.to_bits(), second.blended_score.to_bits());
        assert_eq!(first, second);
    }
}
