use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info};

use crate::error::AggregationError;
use crate::scoring::blend::{blend, CategoryContribution, CompositeSubScores};
use crate::scoring::ranking::{rank_of, rank_provinces, RankedProvince, ScoredProvince};
use crate::scoring::weights::{resolve_weights, WeightPolicy};
use crate::scoring::{CategoryId, CategoryWeights, ProvinceId, Sector};
use crate::source::{ScoreMatrix, ScoreSource};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequest {
    pub category_ids: Vec<CategoryId>,
    #[serde(default)]
    pub weights: Option<HashMap<CategoryId, f64>>,
    #[serde(default)]
    pub sector: Option<Sector>,
    #[serde(default)]
    pub province_id: Option<ProvinceId>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub province_id: ProvinceId,
    pub province_name: String,
    pub blended_score: f64,
    pub rank: usize,
    pub data_available: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingReport {
    pub sector: Sector,
    pub weights: CategoryWeights,
    pub total_provinces: usize,
    pub provinces: Vec<RankingEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceAggregateScore {
    pub province_id: ProvinceId,
    pub province_name: String,
    pub blended_score: f64,
    pub data_available: bool,
    pub rank: usize,
    pub total_provinces: usize,
    #[serde(serialize_with = "contributions_by_category")]
    pub per_category: Vec<CategoryContribution>,
    pub composite: CompositeSubScores,
    pub sector: Sector,
    pub weights: CategoryWeights,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AggregationOutcome {
    Province(Box<ProvinceAggregateScore>),
    Ranking(RankingReport),
}

#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn ScoreSource>,
    policy: WeightPolicy,
    default_sector: Sector,
}

struct Prepared {
    weights: CategoryWeights,
    sector: Sector,
}

struct Computed {
    matrix: ScoreMatrix,
    ranking: Vec<RankedProvince>,
}

impl Aggregator {
    pub fn new(source: Arc<dyn ScoreSource>, policy: WeightPolicy, default_sector: Sector) -> Self {
        Self {
            source,
            policy,
            default_sector,
        }
    }

    pub fn source(&self) -> &Arc<dyn ScoreSource> {
        &self.source
    }

    pub fn default_sector(&self) -> Sector {
        self.default_sector
    }

    pub async fn run(&self, request: &AggregationRequest) -> Result<AggregationOutcome, AggregationError> {
        match request.province_id {
            Some(province_id) => self
                .province(request, province_id)
                .await
                .map(|score| AggregationOutcome::Province(Box::new(score))),
            None => self.ranking(request).await.map(AggregationOutcome::Ranking),
        }
    }

    pub async fn ranking(&self, request: &AggregationRequest) -> Result<RankingReport, AggregationError> {
        let prepared = self.prepare(request)?;
        let computed = self.compute(&prepared).await?;

        let provinces = computed
            .ranking
            .iter()
            .map(|entry| RankingEntry {
                province_id: entry.province_id,
                province_name: province_name(&computed.matrix, entry.province_id),
                blended_score: entry.blended_score,
                rank: entry.rank,
                data_available: entry.data_available,
            })
            .collect::<Vec<_>>();

        info!(
            source = self.source.name(),
            provinces = provinces.len(),
            categories = prepared.weights.len(),
            sector = prepared.sector.as_slug(),
            "computed province ranking"
        );
        Ok(RankingReport {
            sector: prepared.sector,
            weights: prepared.weights,
            total_provinces: provinces.len(),
            provinces,
        })
    }

    pub async fn province(
        &self,
        request: &AggregationRequest,
        province_id: ProvinceId,
    ) -> Result<ProvinceAggregateScore, AggregationError> {
        let prepared = self.prepare(request)?;
        let computed = self.compute(&prepared).await?;

        let province = computed
            .matrix
            .province(province_id)
            .ok_or(AggregationError::ProvinceNotFound(province_id))?;
        let rank =
            rank_of(&computed.ranking, province_id).ok_or(AggregationError::ProvinceNotFound(province_id))?;
        let empty = Default::default();
        let scores = computed.matrix.scores_for(province_id).unwrap_or(&empty);
        let outcome = blend(scores, &prepared.weights, prepared.sector);

        info!(
            source = self.source.name(),
            province = province_id,
            rank,
            total = computed.ranking.len(),
            data_available = outcome.data_available,
            "computed province score"
        );
        Ok(ProvinceAggregateScore {
            province_id,
            province_name: province.name.clone(),
            blended_score: outcome.blended_score,
            data_available: outcome.data_available,
            rank,
            total_provinces: computed.ranking.len(),
            per_category: outcome.per_category,
            composite: outcome.composite,
            sector: prepared.sector,
            weights: prepared.weights,
        })
    }

    fn prepare(&self, request: &AggregationRequest) -> Result<Prepared, AggregationError> {
        let weights = resolve_weights(self.policy, &request.category_ids, request.weights.as_ref())?;
        Ok(Prepared {
            weights,
            sector: request.sector.unwrap_or(self.default_sector),
        })
    }

    async fn compute(&self, prepared: &Prepared) -> Result<Computed, AggregationError> {
        let category_ids = prepared.weights.ids();
        let matrix = self
            .source
            .fetch_scores(&category_ids)
            .await
            .map_err(AggregationError::UpstreamFetchFailure)?;
        debug!(
            source = self.source.name(),
            provinces = matrix.provinces.len(),
            with_data = matrix.scores.len(),
            "fetched score matrix"
        );

        let empty = Default::default();
        let scored = matrix
            .provinces
            .iter()
            .map(|province| {
                let scores = matrix.scores_for(province.id).unwrap_or(&empty);
                let outcome = blend(scores, &prepared.weights, prepared.sector);
                ScoredProvince {
                    province_id: province.id,
                    blended_score: outcome.blended_score,
                    data_available: outcome.data_available,
                }
            })
            .collect();
        let ranking = rank_provinces(scored);
        Ok(Computed { matrix, ranking })
    }
}

fn province_name(matrix: &ScoreMatrix, id: ProvinceId) -> String {
    matrix
        .province(id)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContributionView {
    raw_score: Option<f64>,
    weight: f64,
    weighted_score: f64,
}

fn contributions_by_category<S: Serializer>(
    contributions: &[CategoryContribution],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(contributions.len()))?;
    for entry in contributions {
        map.serialize_entry(
            &entry.category_id.to_string(),
            &ContributionView {
                raw_score: entry.raw_score,
                weight: entry.weight,
                weighted_score: entry.weighted_score,
            },
        )?;
    }
    map.end()
}
