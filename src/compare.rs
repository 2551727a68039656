use serde::Serialize;

use crate::error::AggregationError;
use crate::scoring::{CategoryId, CategoryScoreTuple, ProvinceId, Sector};
use crate::source::{ScoreMatrix, ScoreSource};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScoreField {
    CurrentStatus,
    Trend,
    Attractiveness,
    Priority,
}

impl ScoreField {
    pub const ALL: [ScoreField; 4] = [
        ScoreField::CurrentStatus,
        ScoreField::Trend,
        ScoreField::Attractiveness,
        ScoreField::Priority,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::CurrentStatus => "Current status",
            Self::Trend => "Trend",
            Self::Attractiveness => "Attractiveness",
            Self::Priority => "Priority",
        }
    }

    fn read(&self, tuple: &CategoryScoreTuple) -> Option<f64> {
        match self {
            Self::CurrentStatus => tuple.current_status,
            Self::Trend => tuple.trend,
            Self::Attractiveness => tuple.attractiveness,
            Self::Priority => tuple.priority,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldComparison {
    pub field: ScoreField,
    pub left: Option<f64>,
    pub right: Option<f64>,
    /// `left - right`; absent when either side is.
    pub difference: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparedProvince {
    pub province_id: ProvinceId,
    pub province_name: String,
    pub scores: CategoryScoreTuple,
    pub overall: Option<f64>,
    pub primary: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceComparison {
    pub category_id: CategoryId,
    pub sector: Sector,
    pub left: ComparedProvince,
    pub right: ComparedProvince,
    pub fields: Vec<FieldComparison>,
    pub leader: Option<ProvinceId>,
}

pub async fn compare_provinces(
    source: &dyn ScoreSource,
    left: ProvinceId,
    right: ProvinceId,
    category: CategoryId,
    sector: Sector,
) -> Result<ProvinceComparison, AggregationError> {
    let matrix = source
        .fetch_scores(&[category])
        .await
        .map_err(AggregationError::UpstreamFetchFailure)?;
    compare_in_matrix(&matrix, left, right, category, sector)
}

pub fn compare_in_matrix(
    matrix: &ScoreMatrix,
    left: ProvinceId,
    right: ProvinceId,
    category: CategoryId,
    sector: Sector,
) -> Result<ProvinceComparison, AggregationError> {
    let left = compared_province(matrix, left, category, sector)?;
    let right = compared_province(matrix, right, category, sector)?;

    let fields = ScoreField::ALL
        .iter()
        .map(|field| {
            let l = field.read(&left.scores);
            let r = field.read(&right.scores);
            FieldComparison {
                field: *field,
                left: l,
                right: r,
                difference: l.zip(r).map(|(l, r)| l - r),
            }
        })
        .collect();

    let leader = match (left.primary, right.primary) {
        (Some(l), Some(r)) if l > r => Some(left.province_id),
        (Some(l), Some(r)) if r > l => Some(right.province_id),
        _ => None,
    };

    Ok(ProvinceComparison {
        category_id: category,
        sector,
        left,
        right,
        fields,
        leader,
    })
}

fn compared_province(
    matrix: &ScoreMatrix,
    id: ProvinceId,
    category: CategoryId,
    sector: Sector,
) -> Result<ComparedProvince, AggregationError> {
    let province = matrix
        .province(id)
        .ok_or(AggregationError::ProvinceNotFound(id))?;
    let scores = matrix
        .scores_for(id)
        .and_then(|scores| scores.get(&category))
        .copied()
        .unwrap_or_default();
    Ok(ComparedProvince {
        province_id: id,
        province_name: province.name.clone(),
        overall: overall(&scores),
        primary: scores.primary(sector),
        scores,
    })
}

fn overall(scores: &CategoryScoreTuple) -> Option<f64> {
    let values = ScoreField::ALL
        .iter()
        .map(|field| field.read(scores))
        .collect::<Option<Vec<f64>>>()?;
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
