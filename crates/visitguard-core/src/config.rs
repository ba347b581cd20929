use crate::app_config::{AppConfig, Environment};
use crate::locks::MAX_DUPLICATE_WINDOW_SECS;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(invalid(var, format!("must be a positive number, got {value}")))
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("VISITGUARD_ENV", "development"))?;

    let bind_addr = parse_addr("VISITGUARD_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("VISITGUARD_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("VISITGUARD_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("VISITGUARD_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("VISITGUARD_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let geofence_radius_m = parse_positive_f64("VISITGUARD_GEOFENCE_RADIUS_M", "50")?;
    let duplicate_window_secs = parse_u64("VISITGUARD_DUPLICATE_WINDOW_SECS", "3600")?;
    if !(1..=u64::from(MAX_DUPLICATE_WINDOW_SECS)).contains(&duplicate_window_secs) {
        return Err(invalid(
            "VISITGUARD_DUPLICATE_WINDOW_SECS",
            format!(
                "must be between 1 and {MAX_DUPLICATE_WINDOW_SECS} seconds, \
                 got {duplicate_window_secs}"
            ),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        geofence_radius_m,
        duplicate_window_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "VISITGUARD_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
