use axum::{extract::State, Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct SalesmanItem {
    pub salesman_id: Uuid,
    pub employee_code: String,
    pub full_name: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ShopItem {
    pub shop_id: Uuid,
    pub shop_name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

pub(super) async fn list_salesmen(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<SalesmanItem>>>, ApiError> {
    let rows = visitguard_db::list_salesmen(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SalesmanItem {
            salesman_id: row.id,
            employee_code: row.employee_code,
            full_name: row.full_name,
            is_active: row.is_active,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Shop QR tokens are never listed.
pub(super) async fn list_shops(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<ShopItem>>>, ApiError> {
    let rows = visitguard_db::list_shops(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ShopItem {
            shop_id: row.id,
            shop_name: row.shop_name,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
