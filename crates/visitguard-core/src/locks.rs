//! The three visit locks and the accept/reject decision.
//!
//! - GPS lock: submitted position within the geofence radius of the shop.
//! - QR lock: scanned token equals the shop's stored token.
//! - Time lock: the visit time is the server clock, so it always holds.

use chrono::Duration;

use crate::app_config::AppConfig;
use crate::geo::{format_distance, GeoPoint};
use crate::model::{NewVisitValidation, Shop};

pub const DEFAULT_GEOFENCE_RADIUS_M: f64 = 50.0;
pub const DEFAULT_DUPLICATE_WINDOW_SECS: i64 = 3600;
/// Longest accepted duplicate window: 30 days.
pub const MAX_DUPLICATE_WINDOW_SECS: u32 = 30 * 24 * 3600;

pub const INVALID_QR_MESSAGE: &str = "Invalid QR code";

/// Tunables for lock evaluation and the anomaly rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitPolicy {
    pub geofence_radius_m: f64,
    pub duplicate_window: Duration,
}

impl Default for VisitPolicy {
    fn default() -> Self {
        Self {
            geofence_radius_m: DEFAULT_GEOFENCE_RADIUS_M,
            duplicate_window: Duration::seconds(DEFAULT_DUPLICATE_WINDOW_SECS),
        }
    }
}

impl VisitPolicy {
    /// Windows longer than [`MAX_DUPLICATE_WINDOW_SECS`] are clamped to it.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let window_secs = u32::try_from(config.duplicate_window_secs)
            .map_or(MAX_DUPLICATE_WINDOW_SECS, |secs| secs.min(MAX_DUPLICATE_WINDOW_SECS));
        Self {
            geofence_radius_m: config.geofence_radius_m,
            duplicate_window: Duration::seconds(i64::from(window_secs)),
        }
    }
}

/// Result of evaluating all locks for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct LockReport {
    pub distance_m: f64,
    pub gps_valid: bool,
    pub qr_valid: bool,
    pub time_sync_valid: bool,
    /// Human-readable failure reasons, GPS first. Empty when accepted.
    pub errors: Vec<String>,
}

impl LockReport {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.gps_valid && self.qr_valid && self.time_sync_valid
    }

    #[must_use]
    pub fn formatted_distance(&self) -> String {
        format_distance(self.distance_m)
    }

    /// Audit row for this report.
    #[must_use]
    pub fn to_validation(&self) -> NewVisitValidation {
        NewVisitValidation {
            gps_valid: self.gps_valid,
            qr_valid: self.qr_valid,
            time_sync_valid: self.time_sync_valid,
            validation_errors: if self.errors.is_empty() {
                None
            } else {
                Some(self.errors.clone())
            },
        }
    }
}

/// Evaluate every lock for a submission against the trusted shop record.
///
/// Distance is always computed here from the shop's stored coordinates.
#[must_use]
pub fn evaluate_locks(
    policy: &VisitPolicy,
    qr_data: &str,
    position: GeoPoint,
    shop: &Shop,
) -> LockReport {
    let distance_m = position.distance_to(&shop.location());

    let gps_valid = distance_m <= policy.geofence_radius_m;
    let qr_valid = qr_data == shop.qr_code_hash;
    let time_sync_valid = true;

    let mut errors = Vec::new();
    if !gps_valid {
        errors.push(format!("GPS out of range: {}m", format_distance(distance_m)));
    }
    if !qr_valid {
        errors.push(INVALID_QR_MESSAGE.to_string());
    }

    LockReport {
        distance_m,
        gps_valid,
        qr_valid,
        time_sync_valid,
        errors,
    }
}
