pub mod http;
pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, SourceKind};
use crate::scoring::{
    Category, CategoryId, CategoryScoreTuple, Province, ProvinceId, ProvinceScores,
};
use crate::source::http::HttpScoreSource;
use crate::source::sqlite::SqliteScoreSource;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub province_id: ProvinceId,
    pub category_id: CategoryId,
    pub year: i32,
    pub current_status_score: Option<f64>,
    pub trend_score: Option<f64>,
    pub attractiveness_score: Option<f64>,
    pub priority_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreMatrix {
    pub provinces: Vec<Province>,
    pub scores: BTreeMap<ProvinceId, ProvinceScores>,
}

impl ScoreMatrix {
    pub fn province(&self, id: ProvinceId) -> Option<&Province> {
        self.provinces.iter().find(|p| p.id == id)
    }

    pub fn scores_for(&self, id: ProvinceId) -> Option<&ProvinceScores> {
        self.scores.get(&id)
    }

    pub fn insert(
        &mut self,
        province: ProvinceId,
        category: CategoryId,
        tuple: CategoryScoreTuple,
    ) {
        if tuple.is_empty() {
            return;
        }
        self.scores.entry(province).or_default().insert(category, tuple);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YearlyScore {
    pub year: i32,
    pub category_id: CategoryId,
    pub scores: CategoryScoreTuple,
}

/// Implementations apply the latest-year policy: only rows from the newest
/// year stored for a category count, averaged per province and field.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    fn name(&self) -> &str;
    async fn provinces(&self) -> Result<Vec<Province>>;
    async fn categories(&self) -> Result<Vec<Category>>;
    async fn fetch_scores(&self, categories: &[CategoryId]) -> Result<ScoreMatrix>;
    async fn search_provinces(&self, query: &str, limit: usize) -> Result<Vec<Province>>;
    async fn province_history(&self, province: ProvinceId) -> Result<Vec<YearlyScore>>;
}

pub fn source_from_config(config: &Config) -> Result<Arc<dyn ScoreSource>> {
    let source: Arc<dyn ScoreSource> = match config.source.kind {
        SourceKind::Sqlite => Arc::new(SqliteScoreSource::new(config.resolved_db_path())),
        SourceKind::Http => Arc::new(HttpScoreSource::new(&config.source.url)?),
    };
    Ok(source)
}

pub fn collapse_latest_year(
    records: &[ScoreRecord],
    categories: &[CategoryId],
) -> BTreeMap<(ProvinceId, CategoryId), CategoryScoreTuple> {
    let mut latest_year: BTreeMap<CategoryId, i32> = BTreeMap::new();
    for record in records {
        if !categories.contains(&record.category_id) {
            continue;
        }
        latest_year
            .entry(record.category_id)
            .and_modify(|year| *year = (*year).max(record.year))
            .or_insert(record.year);
    }

    let mut sums: BTreeMap<(ProvinceId, CategoryId), [FieldMean; 4]> = BTreeMap::new();
    for record in records {
        if latest_year.get(&record.category_id) != Some(&record.year) {
            continue;
        }
        let fields = sums
            .entry((record.province_id, record.category_id))
            .or_default();
        fields[0].push(record.current_status_score);
        fields[1].push(record.trend_score);
        fields[2].push(record.attractiveness_score);
        fields[3].push(record.priority_score);
    }

    sums.into_iter()
        .map(|(key, [cs, tr, at, pr])| {
            let tuple =
                CategoryScoreTuple::from_percent(cs.mean(), tr.mean(), at.mean(), pr.mean());
            (key, tuple)
        })
        .collect()
}

pub fn collapse_by_year(records: &[ScoreRecord], province: ProvinceId) -> Vec<YearlyScore> {
    let mut sums: BTreeMap<(i32, CategoryId), [FieldMean; 4]> = BTreeMap::new();
    for record in records.iter().filter(|r| r.province_id == province) {
        let fields = sums.entry((record.year, record.category_id)).or_default();
        fields[0].push(record.current_status_score);
        fields[1].push(record.trend_score);
        fields[2].push(record.attractiveness_score);
        fields[3].push(record.priority_score);
    }

    sums.into_iter()
        .map(|((year, category_id), [cs, tr, at, pr])| YearlyScore {
            year,
            category_id,
            scores: CategoryScoreTuple::from_percent(cs.mean(), tr.mean(), at.mean(), pr.mean()),
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
struct FieldMean {
    sum: f64,
    count: usize,
}

impl FieldMean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}
