// HTTP API: thin JSON endpoints over the pipeline and the store.
//
// Every failure collapses to `500 {"error": message}`; success is always 200.

use crate::analyzer::indicators::mean;
use crate::model::{DailyBar, SignalEvent, StoreError, UpsertOutcome};
use crate::pipeline::{BackfillReport, Pipeline};
use crate::storage::SqliteStore;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub pipeline: Pipeline,
    pub store: SqliteStore,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fetch_stock_data", get(fetch_stock_data))
        .route("/analyze_data", post(analyze_data))
        .route("/analysis_results", post(analysis_results))
        .route("/run_analysis", post(run_analysis))
        .route("/backfill", post(backfill))
        .route("/stocks", get(list_stocks))
        .route("/stock", post(upsert_stock))
        .route("/stock/:symbol", get(stock_range).delete(delete_stock_bar))
        .route("/stock/:symbol/summary", get(stock_summary))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("HTTP API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0 })),
        )
            .into_response()
    }
}

impl<E: std::error::Error> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.to_string())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Runs a blocking store call off the async runtime.
async fn blocking<T, F>(store: &SqliteStore, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&SqliteStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = store.clone();
    Ok(tokio::task::spawn_blocking(move || f(&store)).await??)
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct SymbolQuery {
    #[serde(default)]
    symbol: String,
}

async fn fetch_stock_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SymbolQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(query) = query?;
    let payload = state.pipeline.source().fetch_raw(&query.symbol).await?;
    Ok(Json(payload))
}

async fn analyze_data(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    let Json(body) = body?;
    let average = average_of_object(&body).map_err(ApiError)?;
    Ok(Json(json!({ "average": average })))
}

/// Mean of the values of a flat JSON object of numbers.
fn average_of_object(body: &Value) -> Result<f64, String> {
    let object = body
        .as_object()
        .ok_or_else(|| "expected a JSON object of numbers".to_string())?;

    let values = object
        .iter()
        .map(|(key, v)| {
            v.as_f64()
                .ok_or_else(|| format!("value for {key:?} is not a number"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    mean(&values).ok_or_else(|| "division by zero".to_string())
}

#[derive(Debug, Deserialize)]
struct AnalysisLookup {
    analysis_id: Option<i64>,
}

async fn analysis_results(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalysisLookup>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = body?;
    let id = body
        .analysis_id
        .ok_or_else(|| ApiError("analysis_id is required".into()))?;

    let result = blocking(&state.store, move |store| store.analysis_result(id)).await?;

    match result {
        Some(text) => Ok(Json(json!({ "analysis_result": text }))),
        None => Err(ApiError(format!("analysis {id} not found"))),
    }
}

#[derive(Debug, Serialize)]
struct RunAnalysisResponse {
    symbol: String,
    analysis_id: Option<i64>,
    report: String,
    signals: Vec<SignalEvent>,
}

async fn run_analysis(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SymbolQuery>, QueryRejection>,
) -> ApiResult<RunAnalysisResponse> {
    let Query(query) = query?;
    let outcome = state.pipeline.run(&query.symbol).await?;
    Ok(Json(RunAnalysisResponse {
        signals: outcome.series.signals().collect(),
        symbol: outcome.symbol,
        analysis_id: outcome.analysis_id,
        report: outcome.report,
    }))
}

#[derive(Debug, Deserialize)]
struct BackfillQuery {
    #[serde(default)]
    symbol: String,
    start: NaiveDate,
    end: NaiveDate,
}

async fn backfill(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BackfillQuery>, QueryRejection>,
) -> ApiResult<BackfillReport> {
    let Query(query) = query?;
    let report = state
        .pipeline
        .backfill(&query.symbol, query.start, query.end)
        .await?;
    Ok(Json(report))
}

// ── Stock resource ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

async fn list_stocks(State(state): State<Arc<AppState>>) -> ApiResult<Value> {
    let symbols = blocking(&state.store, |store| store.symbols()).await?;
    Ok(Json(json!({ "symbols": symbols })))
}

/// Stored bars for one symbol; an open-ended range covers all dates.
async fn stock_range(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Vec<DailyBar>> {
    let Path(symbol) = path?;
    let Query(range) = query?;
    // stored dates compare as text, so the open bounds stay four-digit years
    let start = range
        .start
        .or_else(|| NaiveDate::from_ymd_opt(1, 1, 1))
        .ok_or_else(|| ApiError("invalid start date".into()))?;
    let end = range
        .end
        .or_else(|| NaiveDate::from_ymd_opt(9999, 12, 31))
        .ok_or_else(|| ApiError("invalid end date".into()))?;

    let bars = blocking(&state.store, move |store| store.query_range(&symbol, start, end)).await?;
    Ok(Json(bars))
}

async fn stock_summary(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Value> {
    let Path(symbol) = path?;
    let lookup = symbol.clone();
    let summary = blocking(&state.store, move |store| store.summary(&lookup)).await?;
    Ok(Json(json!({ "symbol": symbol, "summary": summary })))
}

async fn upsert_stock(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DailyBar>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(bar) = body?;
    if bar.symbol.trim().is_empty() {
        return Err(ApiError("symbol must not be empty".into()));
    }
    let outcome: UpsertOutcome = blocking(&state.store, move |store| store.upsert(&bar)).await?;
    Ok(Json(json!({ "status": outcome })))
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: NaiveDate,
}

async fn delete_stock_bar(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> ApiResult<Value> {
    let Path(symbol) = path?;
    let Query(DateQuery { date }) = query?;
    let deleted = blocking(&state.store, move |store| store.delete(&symbol, date)).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
