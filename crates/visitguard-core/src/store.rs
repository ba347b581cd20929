//! Persistence seam used by [`crate::VisitValidator`].
//!
//! The PostgreSQL implementation lives in `visitguard-db`; tests use an
//! in-memory double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{AnomalyFlag, NewAnomalyFlag, NewVisit, NewVisitValidation, Salesman, Shop, Visit};

/// Error crossing the store boundary. Implementations box their own error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Salesman linked to an authenticated user identity.
    async fn find_salesman_by_user(&self, user_id: Uuid) -> Result<Option<Salesman>, StoreError>;

    async fn find_salesman(&self, salesman_id: Uuid) -> Result<Option<Salesman>, StoreError>;

    async fn find_shop(&self, shop_id: Uuid) -> Result<Option<Shop>, StoreError>;

    /// Shop whose stored QR token equals `qr_token` exactly.
    async fn find_shop_by_qr(&self, qr_token: &str) -> Result<Option<Shop>, StoreError>;

    /// Persist a visit and its validation audit row, returning the stored visit.
    ///
    /// The audit row must reference the generated visit id and must never be
    /// written when the visit insert fails.
    async fn record_visit(
        &self,
        visit: &NewVisit,
        validation: &NewVisitValidation,
    ) -> Result<Visit, StoreError>;

    /// Up to `limit` visits by the pair with `verified_at >= since`, newest first.
    async fn recent_visits(
        &self,
        salesman_id: Uuid,
        shop_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Visit>, StoreError>;

    async fn flag_anomaly(&self, flag: &NewAnomalyFlag) -> Result<AnomalyFlag, StoreError>;
}
