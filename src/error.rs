use thiserror::Error;

use crate::scoring::{CategoryId, ProvinceId};

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("invalid category selection: {0}")]
    InvalidCategorySelection(String),
    #[error("weights cannot satisfy bounds [{min:.2}, {max:.2}] while summing to 1 (sum {sum:.4})")]
    WeightBoundsUnsatisfiable { min: f64, max: f64, sum: f64 },
    #[error("province not found: {0}")]
    ProvinceNotFound(ProvinceId),
    #[error("no province named `{0}`")]
    UnknownProvinceName(String),
    #[error("invalid province search: {0}")]
    InvalidSearchQuery(String),
    #[error("score data fetch failed: {0:#}")]
    UpstreamFetchFailure(#[source] anyhow::Error),
}

impl AggregationError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCategorySelection(_)
                | Self::WeightBoundsUnsatisfiable { .. }
                | Self::InvalidSearchQuery(_)
        )
    }

    pub(crate) fn duplicate_category(id: CategoryId) -> Self {
        Self::InvalidCategorySelection(format!("category {id} selected more than once"))
    }
}
