use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::lookup::rank_name_matches;
use crate::scoring::{Category, CategoryId, Province, ProvinceId};
use crate::source::{
    collapse_by_year, collapse_latest_year, ScoreMatrix, ScoreRecord, ScoreSource, YearlyScore,
};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 12;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("province-scores/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
});

/// Remote score service exposing `/provinces`, `/categories`,
/// `/scores?categories=..` and `/scores?province=..` with raw records on the
/// 0-100 scale. Bodies may be bare JSON or wrapped in an `{ok, data}`
/// envelope.
#[derive(Debug, Clone)]
pub struct HttpScoreSource {
    base_url: String,
}

impl HttpScoreSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(anyhow!("source.url must be set when source.kind = \"http\""));
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(anyhow!("source.url must be an http(s) URL, got `{trimmed}`"));
        }
        Ok(Self {
            base_url: trimmed.to_string(),
        })
    }

    pub fn scores_url(&self, categories: &[CategoryId]) -> String {
        let list = categories
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}/scores?categories={list}", self.base_url)
    }

    pub fn history_url(&self, province: ProvinceId) -> String {
        format!("{}/scores?province={province}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let value = fetch_json(url).await?;
        serde_json::from_value(unwrap_envelope(value))
            .with_context(|| format!("unexpected response shape: {url}"))
    }
}

#[async_trait]
impl ScoreSource for HttpScoreSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn provinces(&self) -> Result<Vec<Province>> {
        let mut provinces: Vec<Province> =
            self.get(&format!("{}/provinces", self.base_url)).await?;
        provinces.sort_by_key(|p| p.id);
        Ok(provinces)
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> =
            self.get(&format!("{}/categories", self.base_url)).await?;
        categories.sort_by_key(|c| c.id);
        Ok(categories)
    }

    async fn fetch_scores(&self, categories: &[CategoryId]) -> Result<ScoreMatrix> {
        // one scores request for all categories, alongside the catalog
        let url = self.scores_url(categories);
        let (records, provinces) =
            tokio::try_join!(self.get::<Vec<ScoreRecord>>(&url), self.provinces())?;
        let mut matrix = ScoreMatrix {
            provinces,
            ..ScoreMatrix::default()
        };
        for ((province, category), tuple) in collapse_latest_year(&records, categories) {
            matrix.insert(province, category, tuple);
        }
        Ok(matrix)
    }

    async fn search_provinces(&self, query: &str, limit: usize) -> Result<Vec<Province>> {
        let provinces = self.provinces().await?;
        Ok(rank_name_matches(&provinces, query, limit))
    }

    async fn province_history(&self, province: ProvinceId) -> Result<Vec<YearlyScore>> {
        let records: Vec<ScoreRecord> = self.get(&self.history_url(province)).await?;
        Ok(collapse_by_year(&records, province))
    }
}

pub async fn fetch_json(url: &str) -> Result<Value> {
    let response = HTTP_CLIENT
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    if !status.is_success() {
        let preview: String = body.chars().take(180).collect();
        return Err(anyhow!("GET {url} returned {status}: {preview}"));
    }
    serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.contains_key("ok") && object.contains_key("data") => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    async fn remote_provinces(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "ok": true,
            "data": [{"id": 34, "name": "İstanbul"}, {"id": 6, "name": "Ankara"}]
        }))
    }

    async fn remote_scores(
        State(hits): State<Arc<AtomicUsize>>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        let row = |province: u32, category: u32, year: i32, priority: f64| {
            json!({
                "province_id": province,
                "category_id": category,
                "year": year,
                "current_status_score": null,
                "trend_score": null,
                "attractiveness_score": 50.0,
                "priority_score": priority
            })
        };
        if params.contains_key("province") {
            Json(json!([row(34, 1, 2021, 30.0), row(34, 1, 2023, 70.0)]))
        } else {
            Json(json!([
                row(34, 1, 2023, 70.0),
                row(34, 2, 2023, 90.0),
                row(34, 3, 2023, 10.0)
            ]))
        }
    }

    async fn spawn_remote(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route("/provinces", get(remote_provinces))
            .route("/scores", get(remote_scores))
            .with_state(hits);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    #[test]
    fn rejects_missing_or_non_http_urls() {
        assert!(HttpScoreSource::new("").is_err());
        assert!(HttpScoreSource::new("ftp://scores").is_err());
        assert!(HttpScoreSource::new("https://scores.local/api/").is_ok());
    }

    #[test]
    fn builds_batched_scores_url() {
        let source = HttpScoreSource::new("https://scores.local/api/").unwrap();
        assert_eq!(
            source.scores_url(&[3, 1, 7]),
            "https://scores.local/api/scores?categories=3,1,7"
        );
    }

    #[test]
    fn envelope_is_optional() {
        let wrapped = json!({"ok": true, "data": [{"id": 1, "name": "Adana"}]});
        let bare = json!([{"id": 1, "name": "Adana"}]);
        assert_eq!(unwrap_envelope(wrapped), bare);
        assert_eq!(unwrap_envelope(bare.clone()), bare);
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let source = HttpScoreSource::new("http://127.0.0.1:9").unwrap();
        assert!(source.fetch_scores(&[1]).await.is_err());
    }

    #[tokio::test]
    async fn scores_take_one_request_for_all_categories() {
        let hits = Arc::new(AtomicUsize::new(0));
        let source = HttpScoreSource::new(&spawn_remote(hits.clone()).await).unwrap();

        let matrix = source.fetch_scores(&[1, 2, 3]).await.unwrap();
        // scores plus the province catalog, independent of the category count
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        let ids: Vec<u32> = matrix.provinces.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![6, 34]);
        assert_eq!(matrix.scores_for(34).map(|s| s.len()), Some(3));
        assert!(matrix.scores_for(6).is_none());
    }

    #[tokio::test]
    async fn remote_history_and_search() {
        let hits = Arc::new(AtomicUsize::new(0));
        let source = HttpScoreSource::new(&spawn_remote(hits).await).unwrap();

        let history = source.province_history(34).await.unwrap();
        let years: Vec<i32> = history.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2021, 2023]);
        assert_eq!(history[1].scores.priority, Some(0.7));

        let found = source.search_provinces("istanbul", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 34);
    }
}
