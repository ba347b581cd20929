pub mod app_config;
pub mod config;
pub mod geo;
pub mod locks;
pub mod model;
pub mod store;
pub mod validator;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{format_distance, haversine_distance_m, GeoPoint, EARTH_RADIUS_M};
pub use locks::{evaluate_locks, LockReport, VisitPolicy};
pub use model::{
    AnomalyFlag, NewAnomalyFlag, NewVisit, NewVisitValidation, Salesman, Shop, Visit,
    VisitMetadata,
};
pub use store::{StoreError, VisitStore};
pub use validator::{
    AcceptedVisit, RejectedVisit, Resolution, ValidateError, ValidationOutcome, VisitSubmission,
    VisitValidator,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
