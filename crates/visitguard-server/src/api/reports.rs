use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use visitguard_db::{DbError, VisitFilter, EXPORT_ROW_LIMIT};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

const DEFAULT_TREND_DAYS: u32 = 7;
const MAX_TREND_DAYS: u32 = 90;

#[derive(Debug, Default, Deserialize)]
pub(super) struct VisitsQuery {
    pub date: Option<String>,
    pub salesman_id: Option<String>,
    pub shop_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TrendQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct VisitReportItem {
    pub visit_id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub salesman_id: Uuid,
    pub employee_code: String,
    pub salesman_name: Option<String>,
    pub shop_id: Uuid,
    pub shop_name: String,
    pub shop_address: Option<String>,
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub distance_from_shop: f64,
    pub photo_url: Option<String>,
    pub within_geofence: bool,
    pub flagged: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(super) struct VisitSummaryItem {
    pub total_visits: i64,
    pub visits_today: i64,
    pub active_salesmen: i64,
    pub shops_covered: i64,
    pub out_of_range: i64,
    pub flagged: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendPointItem {
    pub day: NaiveDate,
    pub visit_count: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct AnomalyFlagItem {
    pub flag_id: Uuid,
    pub flag_type: String,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

/// Parse the shared report filters. Empty strings mean "all".
pub(super) fn parse_visit_filter(
    req_id: &str,
    query: &VisitsQuery,
) -> Result<VisitFilter, ApiError> {
    let date = non_empty(query.date.as_deref())
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ApiError::new(req_id, "validation_error", "date must be formatted YYYY-MM-DD")
            })
        })
        .transpose()?;
    let salesman_id = parse_uuid_param(req_id, "salesman_id", query.salesman_id.as_deref())?;
    let shop_id = parse_uuid_param(req_id, "shop_id", query.shop_id.as_deref())?;

    Ok(VisitFilter {
        date,
        salesman_id,
        shop_id,
    })
}

fn parse_uuid_param(req_id: &str, name: &str, raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    non_empty(raw)
        .map(|value| {
            Uuid::parse_str(value).map_err(|_| {
                ApiError::new(req_id, "validation_error", format!("{name} must be a UUID"))
            })
        })
        .transpose()
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

pub(super) fn normalize_trend_days(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS)
}

pub(super) async fn list_visits(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<VisitsQuery>,
) -> Result<Json<ApiResponse<Vec<VisitReportItem>>>, ApiError> {
    let filter = parse_visit_filter(&req_id.0, &query)?;
    let radius = state.validator.policy().geofence_radius_m;

    let rows = visitguard_db::list_visit_report(&state.pool, &filter, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| VisitReportItem {
            visit_id: row.id,
            verified_at: row.verified_at,
            salesman_id: row.salesman_id,
            employee_code: row.employee_code,
            salesman_name: row.salesman_name,
            shop_id: row.shop_id,
            shop_name: row.shop_name,
            shop_address: row.shop_address,
            gps_lat: row.gps_lat,
            gps_lng: row.gps_lng,
            within_geofence: row.distance_from_shop <= radius,
            distance_from_shop: row.distance_from_shop,
            photo_url: row.photo_url,
            flagged: row.flag_count > 0,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn visit_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<VisitsQuery>,
) -> Result<Json<ApiResponse<VisitSummaryItem>>, ApiError> {
    let filter = parse_visit_filter(&req_id.0, &query)?;
    let radius = state.validator.policy().geofence_radius_m;

    let row = visitguard_db::summarize_visits(&state.pool, &filter, radius)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: VisitSummaryItem {
            total_visits: row.total_visits,
            visits_today: row.visits_today,
            active_salesmen: row.active_salesmen,
            shops_covered: row.shops_covered,
            out_of_range: row.out_of_range,
            flagged: row.flagged,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn visit_trend(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<ApiResponse<Vec<TrendPointItem>>>, ApiError> {
    let days = normalize_trend_days(query.days);

    let series = visitguard_db::visit_trend(&state.pool, days)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = series
        .into_iter()
        .map(|point| TrendPointItem {
            day: point.day,
            visit_count: point.visit_count,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn export_visits_csv(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<VisitsQuery>,
) -> Result<Response, ApiError> {
    let filter = parse_visit_filter(&req_id.0, &query)?;
    let radius = state.validator.policy().geofence_radius_m;

    let rows = visitguard_db::list_visit_report(&state.pool, &filter, EXPORT_ROW_LIMIT)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let body = visitguard_db::visits_to_csv(&rows, radius);

    let disposition = format!(
        "attachment; filename=\"visits-{}.csv\"",
        Utc::now().format("%Y-%m-%d")
    );
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

pub(super) async fn list_visit_flags(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<AnomalyFlagItem>>>, ApiError> {
    visitguard_db::get_visit(&state.pool, visit_id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("visit {visit_id} not found"),
            ),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    let rows = visitguard_db::list_anomaly_flags_for_visit(&state.pool, visit_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| AnomalyFlagItem {
            flag_id: row.id,
            flag_type: row.flag_type,
            severity: row.severity,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
