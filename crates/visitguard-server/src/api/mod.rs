mod directory;
mod reports;
mod visits;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use visitguard_core::{VisitPolicy, VisitValidator};
use visitguard_db::PgVisitStore;

use crate::middleware::{
    authenticated_user, request_id, require_bearer_auth, AuthState, RequestId,
    AUTHENTICATED_USER_HEADER,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub validator: VisitValidator<PgVisitStore>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, policy: VisitPolicy) -> Self {
        let validator = VisitValidator::new(PgVisitStore::new(pool.clone()), policy);
        Self { pool, validator }
    }
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
    database: &'static str,
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
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(100).clamp(1, 500)
}

pub(super) fn map_db_error(request_id: String, error: &visitguard_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(AUTHENTICATED_USER_HEADER),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/visits/validate", post(visits::validate_visit))
        .route("/api/v1/visits", get(reports::list_visits))
        .route("/api/v1/visits/summary", get(reports::visit_summary))
        .route("/api/v1/visits/trend", get(reports::visit_trend))
        .route("/api/v1/visits/export.csv", get(reports::export_visits_csv))
        .route(
            "/api/v1/visits/{visit_id}/flags",
            get(reports::list_visit_flags),
        )
        .route("/api/v1/salesmen", get(directory::list_salesmen))
        .route("/api/v1/shops", get(directory::list_shops))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                ))
                .layer(axum::middleware::from_fn(authenticated_user)),
        )
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match visitguard_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
