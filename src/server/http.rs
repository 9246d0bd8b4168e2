use crate::app::dto::*;
use crate::app::engine::{EngineError, EngineResult, LineageEngine};
use crate::domain::error::StoreError;
use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[derive(Clone)]
pub struct HttpState {
    pub engine: LineageEngine,
    /// `None` disables the per-request timeout.
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize)]
struct LineageQuery {
    max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
struct ApiErrorBody {
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ApiErrorBody { error: msg.into() })).into_response()
}

fn engine_error(err: EngineError) -> Response {
    let status = match &err {
        EngineError::InvalidRequest(_) | EngineError::Store(StoreError::InvalidFact(_)) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::Store(StoreError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, err.to_string())
}

/// Run a blocking engine call off the async runtime, bounded by the request timeout.
async fn run_engine<T, F>(state: &HttpState, call: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(LineageEngine) -> EngineResult<T> + Send + 'static,
{
    let engine = state.engine.clone();
    let task = spawn_blocking(move || call(engine));

    let joined = match state.request_timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                return api_error(
                    StatusCode::GATEWAY_TIMEOUT,
                    format!("request exceeded {}ms", limit.as_millis()),
                );
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(res)) => Json(res).into_response(),
        Ok(Err(e)) => engine_error(e),
        Err(e) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task join error: {e}"),
        ),
    }
}

fn routes() -> Router<Arc<HttpState>> {
    Router::new()
        .route("/health", get(health))
        .route("/nodes", get(search))
        .route("/lineage/facts", post(ingest))
        .route("/lineage/{root_id}", get(lineage))
}

pub fn build_router(engine: LineageEngine, request_timeout: Option<Duration>) -> Router {
    let state = Arc::new(HttpState {
        engine,
        request_timeout,
    });

    // Same API both at the root and under /api.
    Router::new()
        .merge(routes())
        .nest("/api", routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(
    engine: LineageEngine,
    addr: SocketAddr,
    request_timeout: Option<Duration>,
) -> Result<()> {
    let app = build_router(engine, request_timeout);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "lineage HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<HttpState>>) -> Response {
    run_engine(&state, |engine| engine.health()).await
}

async fn lineage(
    State(state): State<Arc<HttpState>>,
    Path(root_id): Path<String>,
    query: Result<Query<LineageQuery>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(query) => query,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let node_id = match root_id.parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => {
            return api_error(
                StatusCode::BAD_REQUEST,
                format!("node id must be a positive integer, got '{root_id}'"),
            );
        }
    };
    let req = LineageRequest {
        node_id,
        max_depth: q.max_depth,
    };
    run_engine(&state, move |engine| engine.resolve(req)).await
}

async fn search(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<SearchRequest>, QueryRejection>,
) -> Response {
    let Query(q) = match query {
        Ok(query) => query,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    run_engine(&state, move |engine| engine.search(q)).await
}

async fn ingest(State(state): State<Arc<HttpState>>, Json(req): Json<IngestRequest>) -> Response {
    run_engine(&state, move |engine| engine.ingest(req)).await
}
