//! Read-only reporting queries over visits: filtered listings, summary
//! counters, the daily trend series, and CSV export.
//!
//! All day boundaries are UTC.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Optional filters shared by the listing, summary, and export queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitFilter {
    /// Restrict to visits verified on this UTC day.
    pub date: Option<NaiveDate>,
    pub salesman_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
}

impl VisitFilter {
    /// Half-open `[start, end)` bounds for the date filter, if any.
    #[must_use]
    pub fn day_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self.date {
            Some(day) => {
                let start = day.and_time(NaiveTime::MIN).and_utc();
                let end = day
                    .checked_add_days(Days::new(1))
                    .map(|next| next.and_time(NaiveTime::MIN).and_utc());
                (Some(start), end)
            }
            None => (None, None),
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A visit joined with its shop and salesman display fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VisitReportRow {
    pub id: Uuid,
    pub salesman_id: Uuid,
    pub shop_id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub distance_from_shop: f64,
    pub photo_url: Option<String>,
    pub shop_name: String,
    pub shop_address: Option<String>,
    pub employee_code: String,
    pub salesman_name: Option<String>,
    /// Number of anomaly flags raised for this visit.
    pub flag_count: i64,
}

impl VisitReportRow {
    /// Full name when known, otherwise the employee code.
    #[must_use]
    pub fn salesman_display(&self) -> &str {
        self.salesman_name.as_deref().unwrap_or(&self.employee_code)
    }
}

/// Aggregate counters for the dashboard tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct VisitSummaryRow {
    pub total_visits: i64,
    pub visits_today: i64,
    pub active_salesmen: i64,
    pub shops_covered: i64,
    /// Visits recorded farther from the shop than the geofence radius.
    pub out_of_range: i64,
    /// Visits with at least one anomaly flag.
    pub flagged: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct DailyVisitCount {
    pub day: NaiveDate,
    pub visit_count: i64,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns up to `limit` visits matching `filter`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_visit_report(
    pool: &PgPool,
    filter: &VisitFilter,
    limit: i64,
) -> Result<Vec<VisitReportRow>, DbError> {
    let (day_start, day_end) = filter.day_bounds();

    let rows = sqlx::query_as::<_, VisitReportRow>(
        "SELECT v.id, v.salesman_id, v.shop_id, v.verified_at, v.gps_lat, v.gps_lng, \
                v.distance_from_shop, v.photo_url, \
                s.shop_name, s.address AS shop_address, \
                sm.employee_code, sm.full_name AS salesman_name, \
                (SELECT COUNT(*) FROM anomaly_flags af WHERE af.visit_id = v.id) AS flag_count \
         FROM visits v \
         JOIN shops s ON s.id = v.shop_id \
         JOIN salesmen sm ON sm.id = v.salesman_id \
         WHERE ($1::timestamptz IS NULL OR v.verified_at >= $1) \
           AND ($2::timestamptz IS NULL OR v.verified_at < $2) \
           AND ($3::uuid IS NULL OR v.salesman_id = $3) \
           AND ($4::uuid IS NULL OR v.shop_id = $4) \
         ORDER BY v.verified_at DESC \
         LIMIT $5",
    )
    .bind(day_start)
    .bind(day_end)
    .bind(filter.salesman_id)
    .bind(filter.shop_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Computes dashboard counters over every visit matching `filter`.
///
/// `geofence_radius_m` is the threshold for `out_of_range`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn summarize_visits(
    pool: &PgPool,
    filter: &VisitFilter,
    geofence_radius_m: f64,
) -> Result<VisitSummaryRow, DbError> {
    let (day_start, day_end) = filter.day_bounds();
    let today_start = Utc::now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();

    let row = sqlx::query_as::<_, VisitSummaryRow>(
        "WITH filtered AS ( \
             SELECT v.id, v.salesman_id, v.shop_id, v.verified_at, v.distance_from_shop, \
                    EXISTS (SELECT 1 FROM anomaly_flags af WHERE af.visit_id = v.id) AS is_flagged \
             FROM visits v \
             WHERE ($1::timestamptz IS NULL OR v.verified_at >= $1) \
               AND ($2::timestamptz IS NULL OR v.verified_at < $2) \
               AND ($3::uuid IS NULL OR v.salesman_id = $3) \
               AND ($4::uuid IS NULL OR v.shop_id = $4) \
         ) \
         SELECT COUNT(*) AS total_visits, \
                COUNT(*) FILTER (WHERE verified_at >= $5) AS visits_today, \
                COUNT(DISTINCT salesman_id) AS active_salesmen, \
                COUNT(DISTINCT shop_id) AS shops_covered, \
                COUNT(*) FILTER (WHERE distance_from_shop > $6) AS out_of_range, \
                COUNT(*) FILTER (WHERE is_flagged) AS flagged \
         FROM filtered",
    )
    .bind(day_start)
    .bind(day_end)
    .bind(filter.salesman_id)
    .bind(filter.shop_id)
    .bind(today_start)
    .bind(geofence_radius_m)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns per-day visit counts for the `days` UTC days ending today,
/// oldest first, with zero-count days filled in.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn visit_trend(pool: &PgPool, days: u32) -> Result<Vec<DailyVisitCount>, DbError> {
    let today = Utc::now().date_naive();
    let first_day = today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(today);
    let since = first_day.and_time(NaiveTime::MIN).and_utc();

    let counts = sqlx::query_as::<_, DailyVisitCount>(
        "SELECT (verified_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS visit_count \
         FROM visits \
         WHERE verified_at >= $1 \
         GROUP BY day \
         ORDER BY day",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(zero_fill_trend(&counts, today, days))
}

/// Expand sparse per-day counts into a dense `days`-long series ending at
/// `last_day`. Counts outside the range are ignored.
#[must_use]
pub fn zero_fill_trend(
    counts: &[DailyVisitCount],
    last_day: NaiveDate,
    days: u32,
) -> Vec<DailyVisitCount> {
    let by_day: HashMap<NaiveDate, i64> = counts.iter().map(|c| (c.day, c.visit_count)).collect();

    (0..days)
        .rev()
        .filter_map(|offset| last_day.checked_sub_days(Days::new(u64::from(offset))))
        .map(|day| DailyVisitCount {
            day,
            visit_count: by_day.get(&day).copied().unwrap_or(0),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

pub const CSV_HEADER: &str = "Date,Time,Salesman,Shop,Distance(m),GPS Lat,GPS Lng,Status";

/// Upper bound on rows written by a single CSV export.
pub const EXPORT_ROW_LIMIT: i64 = 10_000;

/// Render report rows as CSV, one line per visit after [`CSV_HEADER`].
///
/// `Status` is `Valid` when the recorded distance is within the radius,
/// otherwise `Anomaly`.
#[must_use]
pub fn visits_to_csv(rows: &[VisitReportRow], geofence_radius_m: f64) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for row in rows {
        let status = if row.distance_from_shop <= geofence_radius_m {
            "Valid"
        } else {
            "Anomaly"
        };
        writeln!(
            out,
            "{},{},{},{},{:.1},{},{},{}",
            row.verified_at.format("%Y-%m-%d"),
            row.verified_at.format("%H:%M:%S"),
            csv_field(row.salesman_display()),
            csv_field(&row.shop_name),
            row.distance_from_shop,
            row.gps_lat,
            row.gps_lng,
            status,
        )
        .ok();
    }

    out
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
