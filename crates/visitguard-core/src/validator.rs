//! Visit validation pipeline: resolve, evaluate locks, record, flag.

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::geo::{format_distance, GeoPoint};
use crate::locks::{evaluate_locks, VisitPolicy};
use crate::model::{
    AnomalyFlag, NewAnomalyFlag, NewVisit, Salesman, Shop, Visit, VisitMetadata,
    DUPLICATE_VISIT_FLAG, SEVERITY_MEDIUM,
};
use crate::store::{StoreError, VisitStore};

/// Visits fetched by the duplicate check; two is enough to decide.
const RECENT_VISIT_LOOKBACK: i64 = 2;

/// How the salesman and shop for a submission are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Salesman from the caller's identity; shop from the scanned QR token.
    ByAuthenticatedUser { user_id: Uuid },
    /// Salesman and shop by id. The QR lock still checks the token against
    /// the shop record.
    ByExplicitReference { salesman_id: Uuid, shop_id: Uuid },
}

/// One check-in attempt as submitted by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitSubmission {
    pub qr_data: String,
    pub position: GeoPoint,
    pub resolution: Resolution,
    pub metadata: VisitMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedVisit {
    pub visit: Visit,
    pub shop_name: String,
    pub distance_m: f64,
    /// Set when the duplicate-visit rule fired for this visit.
    pub anomaly: Option<AnomalyFlag>,
}

impl AcceptedVisit {
    #[must_use]
    pub fn formatted_distance(&self) -> String {
        format_distance(self.distance_m)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedVisit {
    /// Non-empty list of failed-lock reasons.
    pub errors: Vec<String>,
    pub distance_m: f64,
}

impl RejectedVisit {
    #[must_use]
    pub fn formatted_distance(&self) -> String {
        format_distance(self.distance_m)
    }
}

/// Business outcome of a well-formed submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(AcceptedVisit),
    Rejected(RejectedVisit),
}

/// System failures. Lock failures are [`ValidationOutcome::Rejected`], not errors.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("SALESMAN_NOT_FOUND")]
    SalesmanNotFound,
    #[error("SHOP_NOT_FOUND")]
    ShopNotFound,
    #[error("SALESMAN_ERROR: {0}")]
    SalesmanLookup(#[source] StoreError),
    #[error("SHOP_ERROR: {0}")]
    ShopLookup(#[source] StoreError),
    #[error("VISIT_ERROR: {0}")]
    Record(#[source] StoreError),
}

impl ValidateError {
    /// Stable machine-readable code for the failing step.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SalesmanNotFound => "SALESMAN_NOT_FOUND",
            Self::ShopNotFound => "SHOP_NOT_FOUND",
            Self::SalesmanLookup(_) => "SALESMAN_ERROR",
            Self::ShopLookup(_) => "SHOP_ERROR",
            Self::Record(_) => "VISIT_ERROR",
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SalesmanNotFound | Self::ShopNotFound)
    }
}

#[derive(Debug, Clone)]
pub struct VisitValidator<S> {
    store: S,
    policy: VisitPolicy,
}

impl<S: VisitStore> VisitValidator<S> {
    #[must_use]
    pub fn new(store: S, policy: VisitPolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn policy(&self) -> &VisitPolicy {
        &self.policy
    }

    /// Run the full pipeline for one submission.
    ///
    /// Rejections return before anything is written. The duplicate-visit check
    /// runs after a successful write and its failures are only logged.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError`] when a lookup finds nothing, a lookup fails,
    /// or the visit cannot be recorded.
    pub async fn validate(
        &self,
        submission: VisitSubmission,
    ) -> Result<ValidationOutcome, ValidateError> {
        let salesman = self.resolve_salesman(submission.resolution).await?;
        let shop = self
            .resolve_shop(submission.resolution, &submission.qr_data)
            .await?;

        let report = evaluate_locks(
            &self.policy,
            &submission.qr_data,
            submission.position,
            &shop,
        );
        // Client timestamps are never read; the server clock is the visit time.
        let verified_at = Utc::now();

        if !report.is_accepted() {
            tracing::info!(
                salesman_id = %salesman.id,
                shop_id = %shop.id,
                distance_m = report.distance_m,
                gps_valid = report.gps_valid,
                qr_valid = report.qr_valid,
                "visit rejected"
            );
            return Ok(ValidationOutcome::Rejected(RejectedVisit {
                errors: report.errors,
                distance_m: report.distance_m,
            }));
        }

        let new_visit = NewVisit {
            salesman_id: salesman.id,
            shop_id: shop.id,
            verified_at,
            gps_lat: submission.position.latitude,
            gps_lng: submission.position.longitude,
            distance_from_shop: report.distance_m,
            metadata: submission.metadata,
        };

        let visit = self
            .store
            .record_visit(&new_visit, &report.to_validation())
            .await
            .map_err(ValidateError::Record)?;

        tracing::info!(
            visit_id = %visit.id,
            salesman_id = %visit.salesman_id,
            shop_id = %visit.shop_id,
            distance_m = visit.distance_from_shop,
            "visit recorded"
        );

        let anomaly = self.flag_if_duplicate(&visit).await;

        Ok(ValidationOutcome::Accepted(AcceptedVisit {
            visit,
            shop_name: shop.shop_name,
            distance_m: report.distance_m,
            anomaly,
        }))
    }

    async fn resolve_salesman(&self, resolution: Resolution) -> Result<Salesman, ValidateError> {
        let found = match resolution {
            Resolution::ByAuthenticatedUser { user_id } => {
                self.store.find_salesman_by_user(user_id).await
            }
            Resolution::ByExplicitReference { salesman_id, .. } => {
                self.store.find_salesman(salesman_id).await
            }
        };

        found
            .map_err(ValidateError::SalesmanLookup)?
            .ok_or(ValidateError::SalesmanNotFound)
    }

    async fn resolve_shop(
        &self,
        resolution: Resolution,
        qr_data: &str,
    ) -> Result<Shop, ValidateError> {
        let found = match resolution {
            Resolution::ByAuthenticatedUser { .. } => self.store.find_shop_by_qr(qr_data).await,
            Resolution::ByExplicitReference { shop_id, .. } => self.store.find_shop(shop_id).await,
        };

        found
            .map_err(ValidateError::ShopLookup)?
            .ok_or(ValidateError::ShopNotFound)
    }

    /// Raise a duplicate-visit flag when the pair already has a visit inside
    /// the window. Never fails the caller.
    async fn flag_if_duplicate(&self, visit: &Visit) -> Option<AnomalyFlag> {
        let Some(since) = visit
            .verified_at
            .checked_sub_signed(self.policy.duplicate_window)
        else {
            tracing::warn!(
                visit_id = %visit.id,
                window_secs = self.policy.duplicate_window.num_seconds(),
                "duplicate window out of range; skipping duplicate-visit check"
            );
            return None;
        };

        let recent = match self
            .store
            .recent_visits(visit.salesman_id, visit.shop_id, since, RECENT_VISIT_LOOKBACK)
            .await
        {
            Ok(recent) => recent,
            Err(e) => {
                tracing::warn!(visit_id = %visit.id, error = %e, "duplicate-visit check failed");
                return None;
            }
        };

        if recent.len() < 2 {
            return None;
        }

        let flag = NewAnomalyFlag {
            visit_id: visit.id,
            flag_type: DUPLICATE_VISIT_FLAG.to_string(),
            severity: SEVERITY_MEDIUM.to_string(),
        };

        match self.store.flag_anomaly(&flag).await {
            Ok(flag) => {
                tracing::info!(
                    visit_id = %visit.id,
                    flag_type = %flag.flag_type,
                    "anomaly flagged"
                );
                Some(flag)
            }
            Err(e) => {
                tracing::warn!(visit_id = %visit.id, error = %e, "failed to record anomaly flag");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
