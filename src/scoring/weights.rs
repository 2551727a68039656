use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AggregationError;
use crate::scoring::{CategoryId, CategoryWeights};

pub const MIN_WEIGHT: f64 = 0.25;
pub const MAX_CATEGORIES: usize = 3;
pub const SUM_TOLERANCE: f64 = 1e-4;
const RESIDUAL_EPSILON: f64 = 1e-6;
const BOUND_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    #[default]
    Normalize,
    Strict,
}

impl FromStr for WeightPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normalize" => Ok(Self::Normalize),
            "strict" => Ok(Self::Strict),
            other => Err(anyhow::anyhow!("unknown weight policy: {other}")),
        }
    }
}

pub fn max_weight(active: usize) -> f64 {
    match active {
        0 | 1 => 1.0,
        2 => 0.75,
        _ => 0.50,
    }
}

pub fn min_weight(active: usize) -> f64 {
    if active <= 1 {
        1.0
    } else {
        MIN_WEIGHT
    }
}

pub fn validate_selection(ids: &[CategoryId]) -> Result<(), AggregationError> {
    if ids.is_empty() {
        return Err(AggregationError::InvalidCategorySelection(
            "at least one category is required".to_string(),
        ));
    }
    if ids.len() > MAX_CATEGORIES {
        return Err(AggregationError::InvalidCategorySelection(format!(
            "at most {MAX_CATEGORIES} categories can be blended, got {}",
            ids.len()
        )));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(AggregationError::duplicate_category(*id));
        }
    }
    Ok(())
}

/// Missing or non-finite proposals fall back to the equal split.
pub fn normalize_weights(
    ids: &[CategoryId],
    proposed: &HashMap<CategoryId, f64>,
) -> Result<CategoryWeights, AggregationError> {
    validate_selection(ids)?;
    let Some((&balancer_id, leading)) = ids.split_last() else {
        return Err(AggregationError::InvalidCategorySelection(
            "at least one category is required".to_string(),
        ));
    };
    if leading.is_empty() {
        return Ok(CategoryWeights::from_entries(vec![(balancer_id, 1.0)]));
    }

    let active = ids.len();
    let max_per = max_weight(active);
    let equal = 1.0 / active as f64;

    let mut values: Vec<f64> = leading
        .iter()
        .map(|id| {
            proposed
                .get(id)
                .copied()
                .filter(|w| w.is_finite())
                .unwrap_or(equal)
                .clamp(MIN_WEIGHT, max_per)
        })
        .collect();

    let mut balancer = 1.0 - values.iter().sum::<f64>();
    if balancer < MIN_WEIGHT {
        let mut remaining = MIN_WEIGHT - balancer;
        for value in values.iter_mut() {
            if remaining <= 0.0 {
                break;
            }
            let reducible = (*value - MIN_WEIGHT).min(remaining);
            if reducible > 0.0 {
                *value -= reducible;
                remaining -= reducible;
            }
        }
        balancer = 1.0 - values.iter().sum::<f64>();
    } else if balancer > max_per {
        let mut remaining = balancer - max_per;
        for value in values.iter_mut() {
            if remaining <= 0.0 {
                break;
            }
            let increasable = (max_per - *value).min(remaining);
            if increasable > 0.0 {
                *value += increasable;
                remaining -= increasable;
            }
        }
        balancer = 1.0 - values.iter().sum::<f64>();
    }
    balancer = balancer.clamp(MIN_WEIGHT, max_per);

    let residual = 1.0 - (values.iter().sum::<f64>() + balancer);
    if residual.abs() > RESIDUAL_EPSILON {
        balancer = (balancer + residual).clamp(MIN_WEIGHT, max_per);
    }

    let mut entries: Vec<(CategoryId, f64)> = leading.iter().copied().zip(values).collect();
    entries.push((balancer_id, balancer));
    let weights = CategoryWeights::from_entries(entries);
    check_weights(&weights)?;
    debug!(?ids, weights = ?weights.to_map(), "normalized category weights");
    Ok(weights)
}

pub fn check_weights(weights: &CategoryWeights) -> Result<(), AggregationError> {
    validate_selection(&weights.ids())?;
    let active = weights.len();
    let min = min_weight(active);
    let max = max_weight(active);
    let sum = weights.sum();
    let in_bounds = weights.iter().all(|(_, w)| {
        w.is_finite() && w >= min - BOUND_EPSILON && w <= max + BOUND_EPSILON
    });
    if !in_bounds || (sum - 1.0).abs() > SUM_TOLERANCE {
        return Err(AggregationError::WeightBoundsUnsatisfiable { min, max, sum });
    }
    Ok(())
}

pub fn strict_weights(
    ids: &[CategoryId],
    proposed: &HashMap<CategoryId, f64>,
) -> Result<CategoryWeights, AggregationError> {
    validate_selection(ids)?;
    if proposed.is_empty() {
        return normalize_weights(ids, proposed);
    }
    let active = ids.len();
    let mut entries = Vec::with_capacity(active);
    for id in ids {
        let Some(weight) = proposed.get(id).copied() else {
            return Err(AggregationError::WeightBoundsUnsatisfiable {
                min: min_weight(active),
                max: max_weight(active),
                sum: proposed.values().sum(),
            });
        };
        entries.push((*id, weight));
    }
    let weights = CategoryWeights::from_entries(entries);
    check_weights(&weights)?;
    Ok(weights)
}

pub fn resolve_weights(
    policy: WeightPolicy,
    ids: &[CategoryId],
    proposed: Option<&HashMap<CategoryId, f64>>,
) -> Result<CategoryWeights, AggregationError> {
    let empty = HashMap::new();
    let proposed = proposed.unwrap_or(&empty);
    match policy {
        WeightPolicy::Normalize => normalize_weights(ids, proposed),
        WeightPolicy::Strict => strict_weights(ids, proposed),
    }
}

/// Applies a single-category edit. The edited category keeps its new value
/// whenever the bounds allow it; the last other category balances and the
/// remaining one absorbs any correction first.
pub fn rebalance_after_edit(
    ids: &[CategoryId],
    current: &HashMap<CategoryId, f64>,
    edited: CategoryId,
    value: f64,
) -> Result<CategoryWeights, AggregationError> {
    validate_selection(ids)?;
    if !ids.contains(&edited) {
        return Err(AggregationError::InvalidCategorySelection(format!(
            "category {edited} is not part of the selection"
        )));
    }

    let others: Vec<CategoryId> = ids.iter().copied().filter(|id| *id != edited).collect();
    let Some((&balancer, untouched)) = others.split_last() else {
        return normalize_weights(ids, current);
    };
    let mut order: Vec<CategoryId> = untouched.to_vec();
    order.push(edited);
    order.push(balancer);

    let mut proposed = current.clone();
    proposed.insert(edited, value);
    let balanced = normalize_weights(&order, &proposed)?;

    let entries = ids
        .iter()
        .map(|id| (*id, balanced.get(*id).unwrap_or_default()))
        .collect();
    Ok(CategoryWeights::from_entries(entries))
}

// Blank or unparsable entries count as not proposed.
pub fn parse_weight_list(ids: &[CategoryId], raw: &str) -> HashMap<CategoryId, f64> {
    ids.iter()
        .zip(raw.split(','))
        .filter_map(|(id, piece)| {
            piece
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite())
                .map(|w| (*id, w))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightSummary {
    pub weights: CategoryWeights,
    pub min_weight: f64,
    pub max_weight: f64,
    pub balancer: Option<CategoryId>,
    pub total: f64,
}

impl WeightSummary {
    pub fn new(weights: CategoryWeights) -> Self {
        let active = weights.len();
        Self {
            min_weight: min_weight(active),
            max_weight: max_weight(active),
            balancer: weights.balancer(),
            total: weights.sum(),
            weights,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn selection() -> impl Strategy<Value = Vec<CategoryId>> {
        prop::sample::subsequence(vec![1u32, 2, 3, 4, 5], 1..=3).prop_shuffle()
    }

    fn proposals() -> impl Strategy<Value = Vec<Option<f64>>> {
        prop::collection::vec(prop::option::of(-1.0f64..2.0), 3)
    }

    proptest! {
        #[test]
        fn normalized_weights_sum_to_one(ids in selection(), raw in proposals()) {
            let proposed: HashMap<CategoryId, f64> = ids
                .iter()
                .zip(raw)
                .filter_map(|(id, w)| w.map(|w| (*id, w)))
                .collect();
            let weights = normalize_weights(&ids, &proposed).unwrap();
            prop_assert!((weights.sum() - 1.0).abs() <= SUM_TOLERANCE);
        }

        #[test]
        fn normalized_weights_stay_in_bounds(ids in selection(), raw in proposals()) {
            let proposed: HashMap<CategoryId, f64> = ids
                .iter()
                .zip(raw)
                .filter_map(|(id, w)| w.map(|w| (*id, w)))
                .collect();
            let weights = normalize_weights(&ids, &proposed).unwrap();
            if ids.len() == 1 {
                prop_assert_eq!(weights.get(ids[0]), Some(1.0));
            } else {
                let max = max_weight(ids.len());
                for (_, w) in weights.iter() {
                    prop_assert!(w >= MIN_WEIGHT - 1e-9 && w <= max + 1e-9);
                }
            }
        }

        #[test]
        fn edits_preserve_invariants(
            ids in selection(),
            pick in 0usize..3,
            value in -1.0f64..2.0,
        ) {
            let edited = ids[pick % ids.len()];
            let current = normalize_weights(&ids, &HashMap::new()).unwrap().to_map();
            let weights = rebalance_after_edit(&ids, &current, edited, value).unwrap();
            prop_assert!((weights.sum() - 1.0).abs() <= SUM_TOLERANCE);
            prop_assert_eq!(weights.ids(), ids);
        }
    }
}
