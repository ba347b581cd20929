//! [`VisitStore`] backed by a Postgres pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use visitguard_core::{
    AnomalyFlag, NewAnomalyFlag, NewVisit, NewVisitValidation, Salesman, Shop, StoreError, Visit,
    VisitStore,
};

use crate::{directory, visits};

#[derive(Debug, Clone)]
pub struct PgVisitStore {
    pool: PgPool,
}

impl PgVisitStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl VisitStore for PgVisitStore {
    async fn find_salesman_by_user(&self, user_id: Uuid) -> Result<Option<Salesman>, StoreError> {
        let row = directory::get_salesman_by_user_id(&self.pool, user_id).await?;
        Ok(row.map(Salesman::from))
    }

    async fn find_salesman(&self, salesman_id: Uuid) -> Result<Option<Salesman>, StoreError> {
        let row = directory::get_salesman(&self.pool, salesman_id).await?;
        Ok(row.map(Salesman::from))
    }

    async fn find_shop(&self, shop_id: Uuid) -> Result<Option<Shop>, StoreError> {
        let row = directory::get_shop(&self.pool, shop_id).await?;
        Ok(row.map(Shop::from))
    }

    async fn find_shop_by_qr(&self, qr_token: &str) -> Result<Option<Shop>, StoreError> {
        let row = directory::get_shop_by_qr_token(&self.pool, qr_token).await?;
        Ok(row.map(Shop::from))
    }

    async fn record_visit(
        &self,
        visit: &NewVisit,
        validation: &NewVisitValidation,
    ) -> Result<Visit, StoreError> {
        let row = visits::record_visit(&self.pool, visit, validation).await?;
        Ok(row.into())
    }

    async fn recent_visits(
        &self,
        salesman_id: Uuid,
        shop_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Visit>, StoreError> {
        let rows =
            visits::list_recent_visits_for_pair(&self.pool, salesman_id, shop_id, since, limit)
                .await?;
        Ok(rows.into_iter().map(Visit::from).collect())
    }

    async fn flag_anomaly(&self, flag: &NewAnomalyFlag) -> Result<AnomalyFlag, StoreError> {
        let row = visits::insert_anomaly_flag(&self.pool, flag).await?;
        Ok(row.into())
    }
}
