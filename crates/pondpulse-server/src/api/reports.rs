use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use pondpulse_agg::SensorSource;
use pondpulse_core::Collection;
use pondpulse_store::AggregationStore;
use serde::Deserialize;
use serde_json::Value;

use crate::middleware::RequestId;

use super::{map_store_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

/// Report granularities exposed by the listing and export routes. Hour
/// records are an internal level and are not served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub(super) fn parse(raw: &str) -> Option<Self> {
        match raw {
            "daily" => Some(Granularity::Daily),
            "weekly" => Some(Granularity::Weekly),
            "monthly" => Some(Granularity::Monthly),
            _ => None,
        }
    }

    pub(super) fn collection(self) -> Collection {
        match self {
            Granularity::Daily => Collection::DailyReports,
            Granularity::Weekly => Collection::WeeklyReports,
            Granularity::Monthly => Collection::MonthlyReports,
        }
    }

    /// The document field holding the period key at this granularity.
    pub(super) fn period_field(self) -> &'static str {
        match self {
            Granularity::Daily => "date",
            Granularity::Weekly => "week",
            Granularity::Monthly => "month",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ReportsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}

/// Loads an owner's reports at a granularity, ordered by period key
/// ascending and optionally bounded by `from`/`to` (inclusive, lexicographic
/// on the period key, which matches chronological order for every key form).
pub(super) async fn fetch_reports<S: AggregationStore>(
    store: &S,
    owner: &str,
    granularity: Granularity,
    from: Option<&str>,
    to: Option<&str>,
    limit: usize,
) -> Result<Vec<Value>, pondpulse_store::StoreError> {
    let field = granularity.period_field();
    let mut docs: Vec<(String, Value)> = store
        .list_documents(owner, granularity.collection())
        .await?
        .into_iter()
        .filter_map(|doc| {
            let key = doc.get(field)?.as_str()?.to_string();
            Some((key, doc))
        })
        .filter(|(key, _)| {
            from.is_none_or(|from| key.as_str() >= from) && to.is_none_or(|to| key.as_str() <= to)
        })
        .collect();
    docs.sort_by(|(a, _), (b, _)| a.cmp(b));
    docs.truncate(limit);
    Ok(docs.into_iter().map(|(_, doc)| doc).collect())
}

pub(super) async fn list_reports<S, G>(
    State(state): State<AppState<S, G>>,
    Extension(req_id): Extension<RequestId>,
    Path((owner, granularity)): Path<(String, String)>,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError>
where
    S: AggregationStore + Clone + 'static,
    G: SensorSource + Clone + 'static,
{
    let Some(granularity) = Granularity::parse(&granularity) else {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "granularity must be one of: daily, weekly, monthly",
        ));
    };

    let data = fetch_reports(
        &state.store,
        &owner,
        granularity,
        query.from.as_deref(),
        query.to.as_deref(),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{body_json, seed_daily, test_app};
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use pondpulse_store::MemoryStore;
    use tower::ServiceExt;

    #[tokio::test]
    async fn daily_reports_come_back_ordered_and_bounded() {
        let store = MemoryStore::new();
        for (key, temp) in [
            ("2025-01-17", 27.0),
            ("2025-01-15", 25.0),
            ("2025-01-16", 26.0),
            ("2025-01-20", 30.0),
        ] {
            seed_daily(&store, "farm-1", key, temp).await;
        }

        let app = test_app(store);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/owners/farm-1/reports/daily?from=2025-01-15&to=2025-01-17")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().expect("data array");
        let keys: Vec<&str> = data.iter().filter_map(|d| d["date"].as_str()).collect();
        assert_eq!(keys, ["2025-01-15", "2025-01-16", "2025-01-17"]);
    }

    #[tokio::test]
    async fn limit_caps_the_result_set() {
        let store = MemoryStore::new();
        for day in 1..=5 {
            seed_daily(&store, "farm-1", &format!("2025-01-{day:02}"), 25.0).await;
        }

        let app = test_app(store);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/owners/farm-1/reports/daily?limit=2")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        let json = body_json(response).await;
        assert_eq!(json["data"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn unknown_granularity_is_a_validation_error() {
        let app = test_app(MemoryStore::new());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/owners/farm-1/reports/hourly")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn unknown_owner_returns_an_empty_list() {
        let app = test_app(MemoryStore::new());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/owners/nobody/reports/weekly")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
    }
}
