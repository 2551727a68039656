use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::aggregator::{AggregationOutcome, AggregationRequest, Aggregator};
use crate::compare::{compare_provinces, ProvinceComparison};
use crate::config::Config;
use crate::error::AggregationError;
use crate::lookup::{province_history, search_provinces, ProvinceHistory};
use crate::scoring::weights::{normalize_weights, rebalance_after_edit, WeightSummary};
use crate::scoring::{Category, CategoryId, Province, ProvinceId, Sector};
use crate::source::{source_from_config, ScoreSource};

#[derive(Clone)]
pub struct ApiState {
    config: Config,
    aggregator: Aggregator,
}

impl ApiState {
    pub fn new(config: Config, source: Arc<dyn ScoreSource>) -> Self {
        let aggregator = Aggregator::new(
            source,
            config.scoring.weight_policy,
            config.scoring.default_sector,
        );
        Self { config, aggregator }
    }

    fn source(&self) -> &dyn ScoreSource {
        self.aggregator.source().as_ref()
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn bad_gateway(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: error.to_string(),
        }
    }
}

impl From<AggregationError> for ApiError {
    fn from(error: AggregationError) -> Self {
        let status = match &error {
            AggregationError::InvalidCategorySelection(_)
            | AggregationError::WeightBoundsUnsatisfiable { .. }
            | AggregationError::InvalidSearchQuery(_) => StatusCode::BAD_REQUEST,
            AggregationError::ProvinceNotFound(_) | AggregationError::UnknownProvinceName(_) => {
                StatusCode::NOT_FOUND
            }
            AggregationError::UpstreamFetchFailure(_) => StatusCode::BAD_GATEWAY,
        };
        if status == StatusCode::BAD_GATEWAY {
            warn!("upstream score fetch failed: {error}");
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeRequest {
    category_ids: Vec<CategoryId>,
    #[serde(default)]
    weights: Option<HashMap<CategoryId, f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdjustRequest {
    category_ids: Vec<CategoryId>,
    #[serde(default)]
    weights: Option<HashMap<CategoryId, f64>>,
    category_id: CategoryId,
    weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest {
    left_province_id: ProvinceId,
    right_province_id: ProvinceId,
    category_id: CategoryId,
    #[serde(default)]
    sector: Option<Sector>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchParams {
    #[serde(default, alias = "name")]
    q: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct HistoryParams {
    #[serde(default)]
    category: Option<CategoryId>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/provinces", get(provinces))
        .route("/v1/provinces/search", get(search))
        .route("/v1/provinces/:key/history", get(history))
        .route("/v1/categories", get(categories))
        .route("/v1/weights/normalize", post(normalize))
        .route("/v1/weights/adjust", post(adjust))
        .route("/v1/scores", post(scores))
        .route("/v1/compare", post(compare))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let source = source_from_config(&config)?;
    info!(source = source.name(), "using score source");
    let app = router(ApiState::new(config, source));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn provinces(State(state): State<ApiState>) -> ApiResult<Vec<Province>> {
    let provinces = state
        .source()
        .provinces()
        .await
        .map_err(ApiError::bad_gateway)?;
    Ok(ok(provinces))
}

async fn search(
    State(state): State<ApiState>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Vec<Province>> {
    let Query(params) = params?;
    let found = search_provinces(state.source(), params.q.as_deref().unwrap_or_default()).await?;
    Ok(ok(found))
}

async fn history(
    State(state): State<ApiState>,
    Path(key): Path<String>,
    params: std::result::Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<ProvinceHistory> {
    let Query(params) = params?;
    let history = province_history(state.source(), &key, params.category).await?;
    Ok(ok(history))
}

async fn categories(State(state): State<ApiState>) -> ApiResult<Vec<Category>> {
    let categories = state
        .source()
        .categories()
        .await
        .map_err(ApiError::bad_gateway)?;
    Ok(ok(categories))
}

async fn normalize(
    payload: std::result::Result<Json<NormalizeRequest>, JsonRejection>,
) -> ApiResult<WeightSummary> {
    let Json(request) = payload?;
    let proposed = request.weights.unwrap_or_default();
    let weights = normalize_weights(&request.category_ids, &proposed)?;
    Ok(ok(WeightSummary::new(weights)))
}

async fn adjust(
    payload: std::result::Result<Json<AdjustRequest>, JsonRejection>,
) -> ApiResult<WeightSummary> {
    let Json(request) = payload?;
    if !request.weight.is_finite() {
        return Err(ApiError::bad_request("weight must be a finite number"));
    }
    let current = normalize_weights(
        &request.category_ids,
        &request.weights.unwrap_or_default(),
    )?;
    let weights = rebalance_after_edit(
        &request.category_ids,
        &current.to_map(),
        request.category_id,
        request.weight,
    )?;
    Ok(ok(WeightSummary::new(weights)))
}

async fn scores(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<AggregationRequest>, JsonRejection>,
) -> ApiResult<AggregationOutcome> {
    let Json(request) = payload?;
    let outcome = state.aggregator.run(&request).await?;
    Ok(ok(outcome))
}

async fn compare(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<CompareRequest>, JsonRejection>,
) -> ApiResult<ProvinceComparison> {
    let Json(request) = payload?;
    let sector = request
        .sector
        .unwrap_or(state.aggregator.default_sector());
    let comparison = compare_provinces(
        state.source(),
        request.left_province_id,
        request.right_province_id,
        request.category_id,
        sector,
    )
    .await?;
    Ok(ok(comparison))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_errors_map_to_statuses() {
        let cases = [
            (
                AggregationError::InvalidCategorySelection("none".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AggregationError::WeightBoundsUnsatisfiable {
                    min: 0.25,
                    max: 0.5,
                    sum: 1.2,
                },
                StatusCode::BAD_REQUEST,
            ),
            (AggregationError::ProvinceNotFound(82), StatusCode::NOT_FOUND),
            (
                AggregationError::UnknownProvinceName("Atlantis".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                AggregationError::InvalidSearchQuery("too short".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AggregationError::UpstreamFetchFailure(anyhow::anyhow!("timeout")),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[test]
    fn adjust_request_uses_camel_case() {
        let parsed: AdjustRequest = serde_json::from_str(
            r#"{"categoryIds":[1,2,3],"categoryId":2,"weight":0.5}"#,
        )
        .unwrap();
        assert_eq!(parsed.category_id, 2);
        assert!(parsed.weights.is_none());
    }
}
