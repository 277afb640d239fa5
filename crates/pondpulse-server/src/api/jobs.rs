use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use pondpulse_agg::{jobs, AggError, RunSummary, SensorSource};
use pondpulse_core::timekeys;
use pondpulse_store::AggregationStore;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RollupQuery {
    pub period: Option<String>,
}

pub(super) async fn trigger_sample<S, G>(
    State(state): State<AppState<S, G>>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RunSummary>>, ApiError>
where
    S: AggregationStore + Clone + 'static,
    G: SensorSource + Clone + 'static,
{
    let summary = jobs::sample_all(&state.store, &state.sensors)
        .await
        .map_err(|e| map_agg_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn trigger_rollup<S, G>(
    State(state): State<AppState<S, G>>,
    Extension(req_id): Extension<RequestId>,
    Path(level): Path<String>,
    Query(query): Query<RollupQuery>,
) -> Result<Json<ApiResponse<RunSummary>>, ApiError>
where
    S: AggregationStore + Clone + 'static,
    G: SensorSource + Clone + 'static,
{
    let period = query.period.as_deref();
    let result = match level.as_str() {
        "day" => {
            let date = match period {
                Some(key) => Some(timekeys::parse_day_key(key).map_err(|e| {
                    ApiError::new(req_id.0.clone(), "validation_error", e.to_string())
                })?),
                None => None,
            };
            jobs::rollup_day_all(&state.store, date).await
        }
        "week" => jobs::rollup_week_all(&state.store, period).await,
        "month" => jobs::rollup_month_all(&state.store, period).await,
        _ => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "rollup level must be one of: day, week, month",
            ));
        }
    };

    let summary = result.map_err(|e| map_agg_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn map_agg_error(request_id: String, error: &AggError) -> ApiError {
    match error {
        AggError::TimeKey(e) => ApiError::new(request_id, "validation_error", e.to_string()),
        AggError::Store(e) => map_store_error(request_id, e),
        AggError::Source(e) => {
            tracing::error!(error = %e, "sensor source failed");
            ApiError::new(request_id, "internal_error", "sensor source failed")
        }
    }
}
