//! HTTP API for the document library.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Faceted search, preview, and match explanations |
//! | `GET`  | `/search/counts` | Facet counts for a filter selection |
//! | `GET`  | `/items` | List documents by id with ordering and paging |
//! | `GET`  | `/items/{id}` | One document with its linked entities |
//! | `GET`  | `/health` | Health check (version and store generation) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid filter key: colour" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `timeout` (408),
//! `internal` (500).
//!
//! Every search runs under the `[search].timeout_ms` deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use doclib_core::error::{SearchError, SearchResult};
use doclib_core::filter::FilterSpec;
use doclib_core::ordering::OrderBy;
use doclib_core::service::{ItemsRequest, SearchRequest, SearchService};
use doclib_core::store::DocumentStore;

use crate::config::Config;
use crate::search::open_service;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    service: Arc<SearchService<SqliteStore>>,
}

impl AppState {
    fn deadline(&self) -> Duration {
        self.config.search.timeout()
    }
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = open_service(config).await?;
    let state = AppState {
        config: Arc::new(config.clone()),
        service: Arc::new(service),
    };
    let bind_addr = config.server.bind.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/search", post(handle_search))
        .route("/search/counts", get(handle_counts))
        .route("/items", get(handle_list_items))
        .route("/items/{id}", get(handle_get_item))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("doclib server listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "server starting");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::DocumentNotFound(_) => not_found(err.to_string()),
            e if e.is_validation() => bad_request(err.to_string()),
            _ => {
                warn!(error = %err, "request failed");
                internal_error(err.to_string())
            }
        }
    }
}

/// Run `fut` under the configured deadline.
async fn with_deadline<T>(
    state: &AppState,
    fut: impl Future<Output = SearchResult<T>>,
) -> Result<T, AppError> {
    let deadline = state.deadline();
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(timeout_error(format!(
            "request exceeded {} ms",
            deadline.as_millis()
        ))),
    }
}

// ============ POST /search ============

/// Handler for `POST /search`.
///
/// The body is a [`SearchRequest`]; a missing `pagesize` falls back to
/// `[search].default_page_size`.
async fn handle_search(
    State(state): State<AppState>,
    Json(mut body): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let Some(fields) = body.as_object_mut() else {
        return Err(bad_request("request body must be a JSON object"));
    };
    fields
        .entry("pagesize")
        .or_insert_with(|| state.config.search.default_page_size.into());
    let request: SearchRequest =
        serde_json::from_value(body).map_err(|e| bad_request(e.to_string()))?;

    let response = with_deadline(&state, state.service.search(&request)).await?;
    Ok(Json(response.as_ref()).into_response())
}

// ============ GET /search/counts ============

#[derive(Debug, Deserialize)]
struct CountsQuery {
    /// JSON object of filter key to values.
    filters: Option<String>,
    search_text: Option<String>,
    /// Comma-separated values to drop; `null` drops unspecified values.
    exclude: Option<String>,
}

async fn handle_counts(
    State(state): State<AppState>,
    Query(query): Query<CountsQuery>,
) -> Result<Response, AppError> {
    let filters: FilterSpec = match query.filters.as_deref() {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|e| bad_request(format!("invalid filters: {}", e)))?,
        _ => FilterSpec::new(),
    };
    let exclude: Vec<String> = query
        .exclude
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let counts = with_deadline(
        &state,
        state
            .service
            .preview_counts(&filters, query.search_text.as_deref(), &exclude),
    )
    .await?;
    Ok(Json(counts).into_response())
}

// ============ GET /items ============

#[derive(Debug, Deserialize)]
struct ItemsQuery {
    /// Comma-separated document ids.
    ids: Option<String>,
    order_by: Option<String>,
    is_desc: Option<bool>,
    page: Option<i64>,
    pagesize: Option<i64>,
}

/// Comma-separated ids; an empty list means no restriction.
fn parse_ids(raw: &str) -> Result<Option<Vec<i64>>, AppError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| bad_request(format!("invalid id: {}", s)))
        })
        .collect::<Result<Vec<i64>, AppError>>()?;
    Ok(Some(ids).filter(|ids| !ids.is_empty()))
}

async fn handle_list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> Result<Response, AppError> {
    let order_by = query
        .order_by
        .as_deref()
        .map(str::parse::<OrderBy>)
        .transpose()
        .map_err(AppError::from)?;
    let request = ItemsRequest {
        ids: query.ids.as_deref().map(parse_ids).transpose()?.flatten(),
        order_by,
        is_desc: query.is_desc.unwrap_or(false),
        page: query.page.unwrap_or(1),
        page_size: query
            .pagesize
            .unwrap_or(state.config.search.default_page_size),
    };

    let results = with_deadline(&state, state.service.list_items(&request)).await?;
    Ok(Json(results).into_response())
}

// ============ GET /items/{id} ============

async fn handle_get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let doc = with_deadline(&state, state.service.get_item(id)).await?;
    Ok(Json(doc).into_response())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// Current store generation, absent if the store is unreachable.
    generation: Option<u64>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let generation = state.service.store().generation().await.ok();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        generation,
    })
}
