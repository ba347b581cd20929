//! Live integration tests for visitguard-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/visitguard-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use visitguard_core::{
    GeoPoint, NewVisit, NewVisitValidation, Resolution, ValidateError, ValidationOutcome,
    VisitMetadata, VisitPolicy, VisitSubmission, VisitValidator,
};
use visitguard_db::{
    get_salesman, get_salesman_by_user_id, get_shop_by_qr_token, get_visit, get_visit_validation,
    list_anomaly_flags_for_visit, list_recent_visits_for_pair, list_visit_report, record_visit,
    summarize_visits, visit_trend, DbError, PgVisitStore, VisitFilter,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Seeded {
    user_id: Uuid,
    salesman_id: Uuid,
    shop_id: Uuid,
}

const SHOP_QR: &str = "qr-live-01";

async fn insert_salesman(pool: &sqlx::PgPool, code: &str, is_active: bool) -> (Uuid, Uuid) {
    let user_id = Uuid::new_v4();
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO salesmen (user_id, employee_code, full_name, is_active) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(user_id)
    .bind(code)
    .bind(format!("Salesman {code}"))
    .bind(is_active)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_salesman failed for '{code}': {e}"));
    (user_id, id)
}

async fn insert_shop(pool: &sqlx::PgPool, name: &str, qr: &str) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO shops (shop_name, address, latitude, longitude, qr_code_hash) \
         VALUES ($1, 'Main Road', 0.0, 0.0, $2) RETURNING id",
    )
    .bind(name)
    .bind(qr)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_shop failed for '{name}': {e}"))
}

async fn seed(pool: &sqlx::PgPool) -> Seeded {
    let (user_id, salesman_id) = insert_salesman(pool, "EMP-100", true).await;
    let shop_id = insert_shop(pool, "Equator Mart", SHOP_QR).await;
    Seeded {
        user_id,
        salesman_id,
        shop_id,
    }
}

fn new_visit(s: &Seeded, verified_at: DateTime<Utc>, distance: f64) -> NewVisit {
    NewVisit {
        salesman_id: s.salesman_id,
        shop_id: s.shop_id,
        verified_at,
        gps_lat: 0.0,
        gps_lng: 0.0002,
        distance_from_shop: distance,
        metadata: VisitMetadata {
            photo_url: Some("https://cdn.example.com/v.jpg".to_string()),
            device_id: Some("device-9".to_string()),
            app_version: Some("1.0.3".to_string()),
        },
    }
}

fn passing_validation() -> NewVisitValidation {
    NewVisitValidation {
        gps_valid: true,
        qr_valid: true,
        time_sync_valid: true,
        validation_errors: None,
    }
}

fn submission(s: &Seeded, qr: &str, lng: f64) -> VisitSubmission {
    VisitSubmission {
        qr_data: qr.to_string(),
        position: GeoPoint::new(0.0, lng),
        resolution: Resolution::ByAuthenticatedUser { user_id: s.user_id },
        metadata: VisitMetadata::default(),
    }
}

async fn count_rows(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count {table} failed: {e}"))
}

// ---------------------------------------------------------------------------
// Section 1: Directory lookups
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn salesman_lookup_by_user_skips_inactive(pool: sqlx::PgPool) {
    let (active_user, active_id) = insert_salesman(&pool, "EMP-1", true).await;
    let (inactive_user, inactive_id) = insert_salesman(&pool, "EMP-2", false).await;

    let found = get_salesman_by_user_id(&pool, active_user)
        .await
        .expect("lookup failed")
        .expect("active salesman should be found");
    assert_eq!(found.id, active_id);

    assert!(get_salesman_by_user_id(&pool, inactive_user)
        .await
        .expect("lookup failed")
        .is_none());
    assert!(get_salesman(&pool, inactive_id)
        .await
        .expect("lookup failed")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn shop_lookup_by_qr_is_exact(pool: sqlx::PgPool) {
    let shop_id = insert_shop(&pool, "Equator Mart", "QR-Case-Sensitive").await;

    let found = get_shop_by_qr_token(&pool, "QR-Case-Sensitive")
        .await
        .expect("lookup failed")
        .expect("shop should be found");
    assert_eq!(found.id, shop_id);

    assert!(get_shop_by_qr_token(&pool, "qr-case-sensitive")
        .await
        .expect("lookup failed")
        .is_none());
    assert!(get_shop_by_qr_token(&pool, "QR-Case-Sensitive ")
        .await
        .expect("lookup failed")
        .is_none());
}

// ---------------------------------------------------------------------------
// Section 2: Visit writes and reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn record_visit_writes_visit_and_validation(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let verified_at = Utc::now();

    let row = record_visit(&pool, &new_visit(&s, verified_at, 22.24), &passing_validation())
        .await
        .expect("record_visit failed");

    assert_eq!(row.salesman_id, s.salesman_id);
    assert_eq!(row.shop_id, s.shop_id);
    assert_eq!(row.device_id.as_deref(), Some("device-9"));
    assert!((row.distance_from_shop - 22.24).abs() < 1e-9);

    let validation = get_visit_validation(&pool, row.id)
        .await
        .expect("get_visit_validation failed")
        .expect("validation row should exist");
    assert!(validation.gps_valid && validation.qr_valid && validation.time_sync_valid);
    assert!(validation.validation_errors.is_none());

    let fetched = get_visit(&pool, row.id).await.expect("get_visit failed");
    assert_eq!(fetched.id, row.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn record_visit_stores_error_array(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let validation = NewVisitValidation {
        gps_valid: false,
        qr_valid: true,
        time_sync_valid: true,
        validation_errors: Some(vec!["GPS out of range: 73.00m".to_string()]),
    };

    let row = record_visit(&pool, &new_visit(&s, Utc::now(), 73.0), &validation)
        .await
        .expect("record_visit failed");

    let stored = get_visit_validation(&pool, row.id)
        .await
        .expect("get_visit_validation failed")
        .expect("validation row should exist");
    assert!(!stored.gps_valid);
    assert_eq!(
        stored.validation_errors,
        Some(vec!["GPS out of range: 73.00m".to_string()])
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn record_visit_rolls_back_on_bad_reference(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let mut visit = new_visit(&s, Utc::now(), 10.0);
    visit.shop_id = Uuid::new_v4();

    record_visit(&pool, &visit, &passing_validation())
        .await
        .expect_err("unknown shop should violate the foreign key");

    assert_eq!(count_rows(&pool, "visits").await, 0);
    assert_eq!(count_rows(&pool, "visit_validations").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_visit_unknown_id_is_not_found(pool: sqlx::PgPool) {
    let err = get_visit(&pool, Uuid::new_v4())
        .await
        .expect_err("unknown visit should fail");
    assert!(matches!(err, DbError::NotFound), "got {err:?}");
}

#[sqlx::test(migrations = "../../migrations")]
async fn recent_visits_for_pair_newest_first_within_window(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let now = Utc::now();

    for minutes_ago in [90, 30, 10, 5] {
        record_visit(
            &pool,
            &new_visit(&s, now - Duration::minutes(minutes_ago), 5.0),
            &passing_validation(),
        )
        .await
        .expect("record_visit failed");
    }

    let since = now - Duration::hours(1);
    let all = list_recent_visits_for_pair(&pool, s.salesman_id, s.shop_id, since, 10)
        .await
        .expect("list failed");
    assert_eq!(all.len(), 3, "the 90-minute-old visit is outside the window");
    assert!(all[0].verified_at > all[1].verified_at);
    assert!(all[1].verified_at > all[2].verified_at);

    let limited = list_recent_visits_for_pair(&pool, s.salesman_id, s.shop_id, since, 2)
        .await
        .expect("list failed");
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, all[0].id);
}

// ---------------------------------------------------------------------------
// Section 3: Validator against Postgres
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn validator_accepts_and_persists(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let validator = VisitValidator::new(PgVisitStore::new(pool.clone()), VisitPolicy::default());

    let outcome = validator
        .validate(submission(&s, SHOP_QR, 0.0002))
        .await
        .expect("validate failed");

    let ValidationOutcome::Accepted(accepted) = outcome else {
        panic!("expected acceptance, got {outcome:?}");
    };
    assert_eq!(accepted.shop_name, "Equator Mart");
    assert_eq!(accepted.formatted_distance(), "22.24");
    assert!(accepted.anomaly.is_none());

    let validation = get_visit_validation(&pool, accepted.visit.id)
        .await
        .expect("get_visit_validation failed")
        .expect("validation row should exist");
    assert!(validation.validation_errors.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn validator_rejection_writes_nothing(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let validator = VisitValidator::new(PgVisitStore::new(pool.clone()), VisitPolicy::default());

    let mut wrong_place = submission(&s, SHOP_QR, 0.000_45);
    wrong_place.resolution = Resolution::ByExplicitReference {
        salesman_id: s.salesman_id,
        shop_id: s.shop_id,
    };
    wrong_place.qr_data = "qr-other".to_string();

    let outcome = validator.validate(wrong_place).await.expect("validate failed");
    let ValidationOutcome::Rejected(rejected) = outcome else {
        panic!("expected rejection, got {outcome:?}");
    };
    assert_eq!(
        rejected.errors,
        vec!["GPS out of range: 50.04m".to_string(), "Invalid QR code".to_string()]
    );

    assert_eq!(count_rows(&pool, "visits").await, 0);
    assert_eq!(count_rows(&pool, "visit_validations").await, 0);
    assert_eq!(count_rows(&pool, "anomaly_flags").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn validator_flags_second_visit_within_hour(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let validator = VisitValidator::new(PgVisitStore::new(pool.clone()), VisitPolicy::default());

    let first = validator
        .validate(submission(&s, SHOP_QR, 0.0001))
        .await
        .expect("first validate failed");
    assert!(matches!(
        first,
        ValidationOutcome::Accepted(ref a) if a.anomaly.is_none()
    ));

    let second = validator
        .validate(submission(&s, SHOP_QR, 0.0001))
        .await
        .expect("second validate failed");
    let ValidationOutcome::Accepted(accepted) = second else {
        panic!("expected acceptance, got {second:?}");
    };
    let flag = accepted.anomaly.expect("second visit should be flagged");
    assert_eq!(flag.flag_type, "duplicate_visit_short_interval");
    assert_eq!(flag.severity, "medium");

    let stored = list_anomaly_flags_for_visit(&pool, accepted.visit.id)
        .await
        .expect("list flags failed");
    assert_eq!(stored.len(), 1);
    assert_eq!(count_rows(&pool, "visits").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn validator_unknown_qr_is_shop_not_found(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let validator = VisitValidator::new(PgVisitStore::new(pool.clone()), VisitPolicy::default());

    let err = validator
        .validate(submission(&s, "qr-unknown", 0.0))
        .await
        .expect_err("unknown QR should fail");
    assert!(matches!(err, ValidateError::ShopNotFound), "got {err:?}");
    assert_eq!(count_rows(&pool, "visits").await, 0);
}

// ---------------------------------------------------------------------------
// Section 4: Reports
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn report_listing_filters_by_salesman_and_date(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let (_, other_salesman) = insert_salesman(&pool, "EMP-200", true).await;
    let now = Utc::now();

    record_visit(&pool, &new_visit(&s, now, 5.0), &passing_validation())
        .await
        .expect("record failed");
    record_visit(
        &pool,
        &new_visit(&s, now - Duration::days(3), 5.0),
        &passing_validation(),
    )
    .await
    .expect("record failed");
    let mut other = new_visit(&s, now, 5.0);
    other.salesman_id = other_salesman;
    record_visit(&pool, &other, &passing_validation())
        .await
        .expect("record failed");

    let everything = list_visit_report(&pool, &VisitFilter::default(), 100)
        .await
        .expect("list failed");
    assert_eq!(everything.len(), 3);
    assert_eq!(everything[0].shop_name, "Equator Mart");

    let today_for_salesman = VisitFilter {
        date: Some(now.date_naive()),
        salesman_id: Some(s.salesman_id),
        shop_id: None,
    };
    let filtered = list_visit_report(&pool, &today_for_salesman, 100)
        .await
        .expect("list failed");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].employee_code, "EMP-100");
    assert_eq!(filtered[0].salesman_display(), "Salesman EMP-100");

    let limited = list_visit_report(&pool, &VisitFilter::default(), 1)
        .await
        .expect("list failed");
    assert_eq!(limited.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn summary_counts_out_of_range_and_flagged(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let validator = VisitValidator::new(PgVisitStore::new(pool.clone()), VisitPolicy::default());

    validator
        .validate(submission(&s, SHOP_QR, 0.0001))
        .await
        .expect("validate failed");
    validator
        .validate(submission(&s, SHOP_QR, 0.0001))
        .await
        .expect("validate failed");
    record_visit(
        &pool,
        &new_visit(&s, Utc::now() - Duration::days(2), 73.0),
        &passing_validation(),
    )
    .await
    .expect("record failed");

    let summary = summarize_visits(&pool, &VisitFilter::default(), 50.0)
        .await
        .expect("summary failed");

    assert_eq!(summary.total_visits, 3);
    assert_eq!(summary.visits_today, 2);
    assert_eq!(summary.active_salesmen, 1);
    assert_eq!(summary.shops_covered, 1);
    assert_eq!(summary.out_of_range, 1);
    assert_eq!(summary.flagged, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn trend_is_dense_and_ends_today(pool: sqlx::PgPool) {
    let s = seed(&pool).await;
    let now = Utc::now();
    for days_ago in [0, 0, 2] {
        record_visit(
            &pool,
            &new_visit(&s, now - Duration::days(days_ago), 5.0),
            &passing_validation(),
        )
        .await
        .expect("record failed");
    }

    let trend = visit_trend(&pool, 7).await.expect("trend failed");

    assert_eq!(trend.len(), 7);
    assert_eq!(trend[6].day, Utc::now().date_naive());
    assert_eq!(trend[6].visit_count, 2);
    assert_eq!(trend[4].visit_count, 1);
    assert_eq!(trend.iter().map(|d| d.visit_count).sum::<i64>(), 3);
}
