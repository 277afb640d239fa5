use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use pondpulse_agg::SensorSource;
use pondpulse_core::quality;
use pondpulse_store::AggregationStore;
use serde::Deserialize;
use serde_json::Value;

use crate::middleware::RequestId;

use super::reports::{fetch_reports, Granularity};
use super::{map_store_error, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ExportQuery {
    pub format: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

pub(super) async fn export_reports<S, G>(
    State(state): State<AppState<S, G>>,
    Extension(req_id): Extension<RequestId>,
    Path((owner, granularity)): Path<(String, String)>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError>
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
    match query.format.as_deref() {
        None | Some("csv") => {}
        // PDF and Word artifacts come from the external render service.
        Some(other) => {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                format!("unsupported export format {other:?}; only csv is produced here"),
            ));
        }
    }

    let docs = fetch_reports(
        &state.store,
        &owner,
        granularity,
        query.from.as_deref(),
        query.to.as_deref(),
        state.export_row_limit,
    )
    .await
    .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let csv = render_csv(granularity, &docs);
    let filename = format!("{owner}-{}-reports.csv", granularity_name(granularity));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

fn granularity_name(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Daily => "daily",
        Granularity::Weekly => "weekly",
        Granularity::Monthly => "monthly",
    }
}

fn coverage_field(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Daily => "coverageHours",
        Granularity::Weekly | Granularity::Monthly => "coverageDays",
    }
}

/// Renders report documents as CSV, one row per period, with the
/// water-quality classification derived from the period's averages and its
/// recorded mortality count (0 when the document has none).
pub(super) fn render_csv(granularity: Granularity, docs: &[Value]) -> String {
    let mut out = String::from("period,avgTemperature,avgPh,totalFeedKg,coverage,quality,qualityScore\n");
    for doc in docs {
        let period = doc
            .get(granularity.period_field())
            .and_then(Value::as_str)
            .unwrap_or_default();
        let temp = doc.get("avgTemperature").and_then(Value::as_f64);
        let ph = doc.get("avgPh").and_then(Value::as_f64);
        let feed = doc.get("totalFeedKg").and_then(Value::as_f64);
        let coverage = doc
            .get(coverage_field(granularity))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let mortality = doc
            .get("mortality")
            .and_then(Value::as_u64)
            .and_then(|m| u32::try_from(m).ok())
            .unwrap_or(0);

        let grade = quality::classify(temp, ph, mortality);
        let score = grade
            .score()
            .map(|s| s.to_string())
            .unwrap_or_default();

        out.push_str(&format!(
            "{period},{},{},{},{coverage},{},{score}\n",
            number_cell(temp),
            number_cell(ph),
            number_cell(feed),
            grade.label(),
        ));
    }
    out
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::super::tests::{body_json, seed_daily, test_app};
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pondpulse_store::MemoryStore;
    use serde_json::json;
    use tower::ServiceExt;

    #[test]
    fn csv_rows_carry_quality_label_and_score() {
        let docs = vec![
            json!({
                "date": "2025-01-15",
                "avgTemperature": 26.0,
                "avgPh": 7.2,
                "totalFeedKg": 3.5,
                "coverageHours": 20,
            }),
            json!({
                "date": "2025-01-16",
                "avgTemperature": 32.0,
                "avgPh": 9.1,
                "totalFeedKg": null,
                "coverageHours": 4,
                "mortality": 6,
            }),
            json!({
                "date": "2025-01-17",
                "avgTemperature": null,
                "avgPh": 7.0,
                "coverageHours": 1,
            }),
        ];

        let csv = render_csv(Granularity::Daily, &docs);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "period,avgTemperature,avgPh,totalFeedKg,coverage,quality,qualityScore"
        );
        assert_eq!(lines[1], "2025-01-15,26.00,7.20,3.50,20,Good,90");
        assert_eq!(lines[2], "2025-01-16,32.00,9.10,,4,Poor,40");
        assert_eq!(lines[3], "2025-01-17,,7.00,,1,Unknown,");
    }

    #[tokio::test]
    async fn csv_export_sets_download_headers() {
        let store = MemoryStore::new();
        seed_daily(&store, "farm-1", "2025-01-15", 25.0).await;

        let app = test_app(store);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/owners/farm-1/reports/daily/export?format=csv")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("text/csv; charset=utf-8")
        );
        assert!(response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .contains("farm-1-daily-reports.csv"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("2025-01-15,25.00,7.00,2.00,12,Good,90"));
    }

    #[tokio::test]
    async fn pdf_export_is_rejected_as_validation_error() {
        let app = test_app(MemoryStore::new());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/owners/farm-1/reports/daily/export?format=pdf")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "validation_error");
    }
}
