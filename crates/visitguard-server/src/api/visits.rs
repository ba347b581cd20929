use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use visitguard_core::{
    GeoPoint, Resolution, ValidationOutcome, Visit, VisitMetadata, VisitSubmission,
};

use crate::middleware::AuthenticatedUser;

use super::AppState;

const PARTIAL_REFERENCE_MESSAGE: &str = "salesmanId and shopId must be supplied together";
const MISSING_IDENTITY_MESSAGE: &str = "authenticated user required";

/// Check-in payload posted by the mobile client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ValidateVisitRequest {
    pub qr_data: String,
    pub user_lat: f64,
    pub user_lng: f64,
    pub salesman_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub photo_url: Option<String>,
    pub device_id: Option<String>,
    pub app_version: Option<String>,
}

impl ValidateVisitRequest {
    fn into_submission(self, resolution: Resolution) -> VisitSubmission {
        VisitSubmission {
            qr_data: self.qr_data,
            position: GeoPoint::new(self.user_lat, self.user_lng),
            resolution,
            metadata: VisitMetadata {
                photo_url: self.photo_url,
                device_id: self.device_id,
                app_version: self.app_version,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AcceptedBody {
    success: bool,
    visit: Visit,
    shop_name: String,
    distance: String,
}

#[derive(Debug, Serialize)]
pub(super) struct RejectedBody {
    success: bool,
    errors: Vec<String>,
    distance: String,
}

#[derive(Debug, Serialize)]
pub(super) struct FailureBody {
    success: bool,
    error: String,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(FailureBody {
            success: false,
            error: message.into(),
        }),
    )
        .into_response()
}

/// Explicit ids win when both are present; otherwise fall back to the caller.
fn choose_resolution(
    salesman_id: Option<Uuid>,
    shop_id: Option<Uuid>,
    caller: Option<Uuid>,
) -> Result<Resolution, &'static str> {
    match (salesman_id, shop_id, caller) {
        (Some(salesman_id), Some(shop_id), _) => Ok(Resolution::ByExplicitReference {
            salesman_id,
            shop_id,
        }),
        (Some(_), None, _) | (None, Some(_), _) => Err(PARTIAL_REFERENCE_MESSAGE),
        (None, None, Some(user_id)) => Ok(Resolution::ByAuthenticatedUser { user_id }),
        (None, None, None) => Err(MISSING_IDENTITY_MESSAGE),
    }
}

pub(super) async fn validate_visit(
    State(state): State<AppState>,
    caller: Option<Extension<AuthenticatedUser>>,
    payload: Result<Json<ValidateVisitRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::info!(error = %rejection.body_text(), "malformed visit submission");
            return failure(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let caller = caller.map(|Extension(AuthenticatedUser(user_id))| user_id);
    let resolution = match choose_resolution(request.salesman_id, request.shop_id, caller) {
        Ok(resolution) => resolution,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };

    match state
        .validator
        .validate(request.into_submission(resolution))
        .await
    {
        Ok(ValidationOutcome::Accepted(accepted)) => {
            let distance = accepted.formatted_distance();
            (
                StatusCode::OK,
                Json(AcceptedBody {
                    success: true,
                    visit: accepted.visit,
                    shop_name: accepted.shop_name,
                    distance,
                }),
            )
                .into_response()
        }
        Ok(ValidationOutcome::Rejected(rejected)) => {
            let distance = rejected.formatted_distance();
            (
                StatusCode::BAD_REQUEST,
                Json(RejectedBody {
                    success: false,
                    errors: rejected.errors,
                    distance,
                }),
            )
                .into_response()
        }
        // Not-found lookups stay 500; existing clients key off the code.
        Err(e) => {
            if e.is_not_found() {
                tracing::warn!(code = e.code(), "visit validation lookup failed");
            } else {
                tracing::error!(code = e.code(), error = %e, "visit validation failed");
            }
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
