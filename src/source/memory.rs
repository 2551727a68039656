use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::lookup::rank_name_matches;
use crate::scoring::{Category, CategoryId, Province, ProvinceId};
use crate::source::{
    collapse_by_year, collapse_latest_year, ScoreMatrix, ScoreRecord, ScoreSource, YearlyScore,
};
use crate::store::import::read_import_rows;

#[derive(Debug, Clone, Default)]
pub struct InMemoryScoreSource {
    provinces: Vec<Province>,
    categories: Vec<Category>,
    records: Vec<ScoreRecord>,
}

impl InMemoryScoreSource {
    pub fn new(
        mut provinces: Vec<Province>,
        mut categories: Vec<Category>,
        records: Vec<ScoreRecord>,
    ) -> Self {
        provinces.sort_by_key(|p| p.id);
        provinces.dedup_by_key(|p| p.id);
        categories.sort_by_key(|c| c.id);
        categories.dedup_by_key(|c| c.id);
        Self {
            provinces,
            categories,
            records,
        }
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed opening score export: {}", path.display()))?;
        let rows = read_import_rows(file)
            .with_context(|| format!("failed parsing score export: {}", path.display()))?;

        let mut provinces = BTreeMap::new();
        let mut categories = BTreeMap::new();
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            provinces.entry(row.province_id).or_insert_with(|| row.province());
            categories.entry(row.category_id).or_insert_with(|| row.category());
            records.push(row.record());
        }
        Ok(Self::new(
            provinces.into_values().collect(),
            categories.into_values().collect(),
            records,
        ))
    }
}

#[async_trait]
impl ScoreSource for InMemoryScoreSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn provinces(&self) -> Result<Vec<Province>> {
        Ok(self.provinces.clone())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.clone())
    }

    async fn fetch_scores(&self, categories: &[CategoryId]) -> Result<ScoreMatrix> {
        let mut matrix = ScoreMatrix {
            provinces: self.provinces.clone(),
            ..ScoreMatrix::default()
        };
        for ((province, category), tuple) in collapse_latest_year(&self.records, categories) {
            matrix.insert(province, category, tuple);
        }
        Ok(matrix)
    }

    async fn search_provinces(&self, query: &str, limit: usize) -> Result<Vec<Province>> {
        Ok(rank_name_matches(&self.provinces, query, limit))
    }

    async fn province_history(&self, province: ProvinceId) -> Result<Vec<YearlyScore>> {
        Ok(collapse_by_year(&self.records, province))
    }
}
