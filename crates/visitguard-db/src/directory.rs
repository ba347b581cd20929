//! Database operations for the `salesmen` and `shops` tables.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use visitguard_core::{Salesman, Shop};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `salesmen` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesmanRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_code: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SalesmanRow> for Salesman {
    fn from(row: SalesmanRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            employee_code: row.employee_code,
            full_name: row.full_name,
        }
    }
}

/// A row from the `shops` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShopRow {
    pub id: Uuid,
    pub shop_name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub qr_code_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<ShopRow> for Shop {
    fn from(row: ShopRow) -> Self {
        Self {
            id: row.id,
            shop_name: row.shop_name,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            qr_code_hash: row.qr_code_hash,
        }
    }
}

// ---------------------------------------------------------------------------
// Salesmen
// ---------------------------------------------------------------------------

/// Returns the active salesman linked to `user_id`, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_salesman_by_user_id(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<SalesmanRow>, DbError> {
    let row = sqlx::query_as::<_, SalesmanRow>(
        "SELECT id, user_id, employee_code, full_name, is_active, created_at \
         FROM salesmen \
         WHERE user_id = $1 AND is_active = TRUE",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the active salesman with the given id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_salesman(pool: &PgPool, id: Uuid) -> Result<Option<SalesmanRow>, DbError> {
    let row = sqlx::query_as::<_, SalesmanRow>(
        "SELECT id, user_id, employee_code, full_name, is_active, created_at \
         FROM salesmen \
         WHERE id = $1 AND is_active = TRUE",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all salesmen ordered by display name, for report filters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_salesmen(pool: &PgPool) -> Result<Vec<SalesmanRow>, DbError> {
    let rows = sqlx::query_as::<_, SalesmanRow>(
        "SELECT id, user_id, employee_code, full_name, is_active, created_at \
         FROM salesmen \
         ORDER BY COALESCE(full_name, employee_code)",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Shops
// ---------------------------------------------------------------------------

/// Returns the shop with the given id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shop(pool: &PgPool, id: Uuid) -> Result<Option<ShopRow>, DbError> {
    let row = sqlx::query_as::<_, ShopRow>(
        "SELECT id, shop_name, address, latitude, longitude, qr_code_hash, created_at \
         FROM shops \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the shop whose QR token equals `qr_token` exactly, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shop_by_qr_token(
    pool: &PgPool,
    qr_token: &str,
) -> Result<Option<ShopRow>, DbError> {
    let row = sqlx::query_as::<_, ShopRow>(
        "SELECT id, shop_name, address, latitude, longitude, qr_code_hash, created_at \
         FROM shops \
         WHERE qr_code_hash = $1",
    )
    .bind(qr_token)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all shops ordered by name, for report filters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_shops(pool: &PgPool) -> Result<Vec<ShopRow>, DbError> {
    let rows = sqlx::query_as::<_, ShopRow>(
        "SELECT id, shop_name, address, latitude, longitude, qr_code_hash, created_at \
         FROM shops \
         ORDER BY shop_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
