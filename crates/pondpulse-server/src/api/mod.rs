mod export;
mod jobs;
mod reports;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use pondpulse_agg::SensorSource;
use pondpulse_store::AggregationStore;
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

/// Shared handler state, generic over the document store and the live
/// sensor source so route tests can run against the in-memory store.
#[derive(Clone)]
pub struct AppState<S, G> {
    pub store: S,
    pub sensors: G,
    pub export_row_limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    store: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_store_error(
    request_id: String,
    error: &pondpulse_store::StoreError,
) -> ApiError {
    tracing::error!(error = %error, "store query failed");
    ApiError::new(request_id, "internal_error", "store query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router<S, G>(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState<S, G>>
where
    S: AggregationStore + Clone + 'static,
    G: SensorSource + Clone + 'static,
{
    Router::new()
        .route(
            "/api/v1/owners/{owner}/reports/{granularity}",
            get(reports::list_reports),
        )
        .route(
            "/api/v1/owners/{owner}/reports/{granularity}/export",
            get(export::export_reports),
        )
        .route("/api/v1/jobs/sample", post(jobs::trigger_sample))
        .route("/api/v1/jobs/rollup/{level}", post(jobs::trigger_rollup))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app<S, G>(
    state: AppState<S, G>,
    auth: AuthState,
    rate_limit: RateLimitState,
) -> Router
where
    S: AggregationStore + Clone + 'static,
    G: SensorSource + Clone + 'static,
{
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health<S, G>(
    State(state): State<AppState<S, G>>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse
where
    S: AggregationStore + Clone + 'static,
    G: SensorSource + Clone + 'static,
{
    let meta = ResponseMeta::new(req_id.0);

    // The owner registry read doubles as the backing-store probe.
    match state.store.list_owners().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    store: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        store: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
