//! JSON API and the single-page web UI.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{Result, RiskqlError};
use crate::runtime::{QueryOutcome, Runtime, Status};

const INDEX_HTML: &str = include_str!("../assets/index.html");

pub type AppState = Arc<Runtime>;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default = "default_generator_type")]
    pub generator_type: String,
}

fn default_generator_type() -> String {
    "auto".to_string()
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub tables: BTreeMap<String, Vec<String>>,
}

/// Failure that aborts a request; rendered as HTTP 500 with a `detail` body.
pub struct ApiError(RiskqlError);

impl From<RiskqlError> for ApiError {
    fn from(err: RiskqlError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        let body = serde_json::json!({ "detail": self.0.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

pub fn router(runtime: Arc<Runtime>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/query", post(query))
        .route("/schema", get(schema))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(runtime)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(runtime: Arc<Runtime>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local: SocketAddr = listener.local_addr()?;
    tracing::info!(addr = %local, "riskql listening");
    axum::serve(listener, router(runtime)).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn query(
    State(runtime): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> std::result::Result<Json<QueryOutcome>, ApiError> {
    let outcome = runtime
        .ask(&request.question, Some(&request.generator_type))
        .await?;
    Ok(Json(outcome))
}

async fn schema(
    State(runtime): State<AppState>,
) -> std::result::Result<Json<SchemaResponse>, ApiError> {
    let tables = runtime.schema_tables().await?;
    Ok(Json(SchemaResponse { tables }))
}

async fn status(State(runtime): State<AppState>) -> Json<Status> {
    Json(runtime.status())
}
