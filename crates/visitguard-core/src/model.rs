//! Domain records shared between the validator, the store, and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Flag type raised when the same salesman checks into the same shop twice
/// inside the duplicate window.
pub const DUPLICATE_VISIT_FLAG: &str = "duplicate_visit_short_interval";

pub const SEVERITY_MEDIUM: &str = "medium";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shop {
    pub id: Uuid,
    pub shop_name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Token encoded in the shop's printed QR code.
    pub qr_code_hash: String,
}

impl Shop {
    #[must_use]
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Salesman {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_code: String,
    pub full_name: Option<String>,
}

/// Optional client metadata stored verbatim with an accepted visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitMetadata {
    pub photo_url: Option<String>,
    pub device_id: Option<String>,
    pub app_version: Option<String>,
}

/// A persisted, immutable visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
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

/// Insert payload for a visit; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVisit {
    pub salesman_id: Uuid,
    pub shop_id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub gps_lat: f64,
    pub gps_lng: f64,
    pub distance_from_shop: f64,
    pub metadata: VisitMetadata,
}

/// Audit row describing which locks passed for a visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVisitValidation {
    pub gps_valid: bool,
    pub qr_valid: bool,
    pub time_sync_valid: bool,
    /// `None` when every lock passed.
    pub validation_errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnomalyFlag {
    pub visit_id: Uuid,
    pub flag_type: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnomalyFlag {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub flag_type: String,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}
