//! Database operations for `visits`, `visit_validations`, and `anomaly_flags`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use visitguard_core::{AnomalyFlag, NewAnomalyFlag, NewVisit, NewVisitValidation, Visit};

use crate::DbError;

const VISIT_COLUMNS: &str = "id, salesman_id, shop_id, verified_at, gps_lat, gps_lng, \
     distance_from_shop, photo_url, device_id, app_version, created_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `visits` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VisitRow {
    pub id: Uuid,
    pub salesman_id: Uuid,
    pub shop_id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub distance_from_shop: f64,
    pub photo_url: Option<String>,
    pub device_id: Option<String>,
    pub app_version: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<VisitRow> for Visit {
    fn from(row: VisitRow) -> Self {
        Self {
            id: row.id,
            salesman_id: row.salesman_id,
            shop_id: row.shop_id,
            verified_at: row.verified_at,
            gps_lat: row.gps_lat,
            gps_lng: row.gps_lng,
            distance_from_shop: row.distance_from_shop,
            photo_url: row.photo_url,
            device_id: row.device_id,
            app_version: row.app_version,
            created_at: row.created_at,
        }
    }
}

/// A row from the `visit_validations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VisitValidationRow {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub gps_valid: bool,
    pub qr_valid: bool,
    pub time_sync_valid: bool,
    /// `NULL` when every lock passed.
    pub validation_errors: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `anomaly_flags` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnomalyFlagRow {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub flag_type: String,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

impl From<AnomalyFlagRow> for AnomalyFlag {
    fn from(row: AnomalyFlagRow) -> Self {
        Self {
            id: row.id,
            visit_id: row.visit_id,
            flag_type: row.flag_type,
            severity: row.severity,
            created_at: row.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a visit and its validation audit row in one transaction.
///
/// The visit is inserted first and read back (`RETURNING`) so the audit row
/// can reference the generated id. If the audit insert fails the visit is
/// rolled back with it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either insert or the commit fails.
pub async fn record_visit(
    pool: &PgPool,
    visit: &NewVisit,
    validation: &NewVisitValidation,
) -> Result<VisitRow, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, VisitRow>(&format!(
        "INSERT INTO visits \
             (salesman_id, shop_id, verified_at, gps_lat, gps_lng, distance_from_shop, \
              photo_url, device_id, app_version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {VISIT_COLUMNS}"
    ))
    .bind(visit.salesman_id)
    .bind(visit.shop_id)
    .bind(visit.verified_at)
    .bind(visit.gps_lat)
    .bind(visit.gps_lng)
    .bind(visit.distance_from_shop)
    .bind(visit.metadata.photo_url.as_deref())
    .bind(visit.metadata.device_id.as_deref())
    .bind(visit.metadata.app_version.as_deref())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO visit_validations \
             (visit_id, gps_valid, qr_valid, time_sync_valid, validation_errors) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(row.id)
    .bind(validation.gps_valid)
    .bind(validation.qr_valid)
    .bind(validation.time_sync_valid)
    .bind(validation.validation_errors.as_deref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(row)
}

/// Inserts an anomaly flag and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_anomaly_flag(
    pool: &PgPool,
    flag: &NewAnomalyFlag,
) -> Result<AnomalyFlagRow, DbError> {
    let row = sqlx::query_as::<_, AnomalyFlagRow>(
        "INSERT INTO anomaly_flags (visit_id, flag_type, severity) \
         VALUES ($1, $2, $3) \
         RETURNING id, visit_id, flag_type, severity, created_at",
    )
    .bind(flag.visit_id)
    .bind(&flag.flag_type)
    .bind(&flag.severity)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns the visit with the given id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such visit exists, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_visit(pool: &PgPool, id: Uuid) -> Result<VisitRow, DbError> {
    sqlx::query_as::<_, VisitRow>(&format!(
        "SELECT {VISIT_COLUMNS} FROM visits WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns up to `limit` visits by the salesman/shop pair verified at or after
/// `since`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_visits_for_pair(
    pool: &PgPool,
    salesman_id: Uuid,
    shop_id: Uuid,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<VisitRow>, DbError> {
    let rows = sqlx::query_as::<_, VisitRow>(&format!(
        "SELECT {VISIT_COLUMNS} \
         FROM visits \
         WHERE salesman_id = $1 AND shop_id = $2 AND verified_at >= $3 \
         ORDER BY verified_at DESC \
         LIMIT $4"
    ))
    .bind(salesman_id)
    .bind(shop_id)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the validation audit row for a visit, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_visit_validation(
    pool: &PgPool,
    visit_id: Uuid,
) -> Result<Option<VisitValidationRow>, DbError> {
    let row = sqlx::query_as::<_, VisitValidationRow>(
        "SELECT id, visit_id, gps_valid, qr_valid, time_sync_valid, validation_errors, created_at \
         FROM visit_validations \
         WHERE visit_id = $1",
    )
    .bind(visit_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every anomaly flag raised for a visit, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_anomaly_flags_for_visit(
    pool: &PgPool,
    visit_id: Uuid,
) -> Result<Vec<AnomalyFlagRow>, DbError> {
    let rows = sqlx::query_as::<_, AnomalyFlagRow>(
        "SELECT id, visit_id, flag_type, severity, created_at \
         FROM anomaly_flags \
         WHERE visit_id = $1 \
         ORDER BY created_at",
    )
    .bind(visit_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
