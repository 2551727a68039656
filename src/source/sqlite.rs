use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::scoring::{Category, CategoryId, Province, ProvinceId};
use crate::source::{ScoreMatrix, ScoreSource, YearlyScore};
use crate::store::ScoreStore;

/// A missing store is an error; only `import` creates one.
#[derive(Debug, Clone)]
pub struct SqliteScoreSource {
    db_path: PathBuf,
}

impl SqliteScoreSource {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ScoreStore) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let store = ScoreStore::open_read_only(&path)?;
            f(&store)
        })
        .await
        .context("score store task failed")?
    }
}

#[async_trait]
impl ScoreSource for SqliteScoreSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn provinces(&self) -> Result<Vec<Province>> {
        self.with_store(|store| store.provinces()).await
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        self.with_store(|store| store.categories()).await
    }

    async fn fetch_scores(&self, categories: &[CategoryId]) -> Result<ScoreMatrix> {
        let categories = categories.to_vec();
        self.with_store(move |store| store.score_matrix(&categories))
            .await
    }

    async fn search_provinces(&self, query: &str, limit: usize) -> Result<Vec<Province>> {
        let query = query.to_string();
        self.with_store(move |store| store.search_provinces(&query, limit))
            .await
    }

    async fn province_history(&self, province: ProvinceId) -> Result<Vec<YearlyScore>> {
        self.with_store(move |store| store.province_history(province))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ScoreRecord;

    #[tokio::test]
    async fn reads_what_the_store_holds() {
        let dir = std::env::temp_dir().join(format!("province-scores-sqlite-{}", std::process::id()));
        let path = dir.join("scores.db");
        {
            let store = ScoreStore::open(&path).unwrap();
            store
                .upsert_province(&Province {
                    id: 1,
                    name: "Adana".to_string(),
                })
                .unwrap();
            store
                .upsert_category(&Category {
                    id: 7,
                    name: "Sanayi".to_string(),
                })
                .unwrap();
            store
                .insert_score(&ScoreRecord {
                    province_id: 1,
                    category_id: 7,
                    year: 2023,
                    current_status_score: Some(30.0),
                    trend_score: None,
                    attractiveness_score: Some(90.0),
                    priority_score: Some(45.0),
                })
                .unwrap();
        }

        let source = SqliteScoreSource::new(path);
        assert_eq!(source.provinces().await.unwrap().len(), 1);
        assert_eq!(source.categories().await.unwrap()[0].name, "Sanayi");
        let matrix = source.fetch_scores(&[7]).await.unwrap();
        let tuple = matrix.scores_for(1).unwrap()[&7];
        assert_eq!(tuple.priority, Some(0.45));
        assert_eq!(tuple.trend, None);
        assert_eq!(source.search_provinces("ada", 10).await.unwrap()[0].id, 1);
        let history = source.province_history(1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].year, 2023);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_store_is_reported_not_created() {
        let dir = std::env::temp_dir().join(format!("province-scores-typo-{}", std::process::id()));
        let path = dir.join("typo.db");
        let source = SqliteScoreSource::new(path.clone());

        let err = source.fetch_scores(&[1, 2]).await.unwrap_err();
        assert!(format!("{err:#}").contains("score store not found"));
        assert!(source.provinces().await.is_err());
        assert!(!path.exists());
        assert!(!dir.exists());
    }
}
