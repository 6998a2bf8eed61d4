use std::{any::Any, time::Instant};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;

use crate::service::{ExpenseService, ServiceError};
use expensedb_core::{Expense, ExpenseCommand};

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid expense body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::InvalidId { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Service(ServiceError::Storage(_) | ServiceError::Join(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { message: self.to_string() })).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    service: ExpenseService,
    metrics: Option<PrometheusHandle>,
}

/// Builds the HTTP surface. `/metrics` answers 404 unless a recorder handle is supplied.
pub fn router(service: ExpenseService, metrics: Option<PrometheusHandle>) -> Router {
    let app = Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/:id", get(get_expense).put(update_expense))
        .route("/healthCheck", get(health_check))
        .route("/metrics", get(render_metrics))
        .with_state(AppState { service, metrics });
    with_middleware(app)
}

/// Request logging/metrics and panic recovery. A handler panic becomes a 500
/// with the usual error body.
pub fn with_middleware(app: Router) -> Router {
    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(track_requests))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            message: format!("internal server error: {}", detail),
        }),
    )
        .into_response()
}

async fn list_expenses(State(state): State<AppState>) -> Result<Json<Vec<Expense>>, ApiError> {
    Ok(Json(state.service.list().await?))
}

async fn get_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Expense>, ApiError> {
    Ok(Json(state.service.get(&id).await?))
}

async fn create_expense(
    State(state): State<AppState>,
    payload: Result<Json<ExpenseCommand>, JsonRejection>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let Json(command) = payload?;
    let expense = state.service.create(command).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ExpenseCommand>, JsonRejection>,
) -> Result<Json<Expense>, ApiError> {
    let Json(command) = payload?;
    Ok(Json(state.service.update(&id, command).await?))
}

async fn health_check() -> Json<&'static str> {
    Json("OK")
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                message: "metrics recorder not installed".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn track_requests<B>(req: Request<B>, next: Next<B>) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    tracing::info!(
        method = %method,
        path = %path,
        status,
        latency_ms = elapsed.as_millis() as u64,
        "request handled"
    );
    metrics::increment_counter!(
        "http_requests_total",
        "method" => method.clone(),
        "status" => status.to_string()
    );
    metrics::histogram!(
        "http_request_duration_seconds",
        elapsed.as_secs_f64(),
        "method" => method
    );

    response
}
