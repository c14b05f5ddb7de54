use crate::app_config::{AppConfig, Environment};
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
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<i64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let extractor_base_url = require("CHURNWATCH_EXTRACTOR_BASE_URL")?;

    let env = parse_environment(&or_default("CHURNWATCH_ENV", "development"));

    let bind_addr = parse_addr("CHURNWATCH_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("CHURNWATCH_LOG_LEVEL", "info");
    let targets_path = PathBuf::from(or_default(
        "CHURNWATCH_TARGETS_PATH",
        "./config/targets.yaml",
    ));

    let coverage_trust_threshold =
        parse_trust_threshold(&or_default("CHURNWATCH_COVERAGE_TRUST_THRESHOLD", "0.80"))?;
    let quick_unfollow_window_days = parse_i64("CHURNWATCH_QUICK_UNFOLLOW_WINDOW_DAYS", "7")?;

    let db_max_connections = parse_u32("CHURNWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CHURNWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CHURNWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let extractor_api_key = lookup("CHURNWATCH_EXTRACTOR_API_KEY").ok();
    let extractor_request_timeout_secs =
        parse_u64("CHURNWATCH_EXTRACTOR_REQUEST_TIMEOUT_SECS", "30")?;
    let extractor_user_agent = or_default(
        "CHURNWATCH_EXTRACTOR_USER_AGENT",
        "churnwatch/0.1 (follower-intelligence)",
    );
    let extractor_page_size = parse_u32("CHURNWATCH_EXTRACTOR_PAGE_SIZE", "200")?;
    let extractor_max_concurrent_targets =
        parse_usize("CHURNWATCH_EXTRACTOR_MAX_CONCURRENT_TARGETS", "1")?;
    let extractor_inter_request_delay_ms =
        parse_u64("CHURNWATCH_EXTRACTOR_INTER_REQUEST_DELAY_MS", "250")?;
    let extractor_max_retries = parse_u32("CHURNWATCH_EXTRACTOR_MAX_RETRIES", "3")?;
    let extractor_retry_backoff_base_secs =
        parse_u64("CHURNWATCH_EXTRACTOR_RETRY_BACKOFF_BASE_SECS", "5")?;

    let scan_cron = lookup("CHURNWATCH_SCAN_CRON").ok().filter(|s| !s.is_empty());

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        targets_path,
        coverage_trust_threshold,
        quick_unfollow_window_days,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        extractor_base_url,
        extractor_api_key,
        extractor_request_timeout_secs,
        extractor_user_agent,
        extractor_page_size,
        extractor_max_concurrent_targets,
        extractor_inter_request_delay_ms,
        extractor_max_retries,
        extractor_retry_backoff_base_secs,
        scan_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

/// Parse and validate the coverage trust threshold.
///
/// The value must be a float in `(0, 1]`. A threshold of 0 would trust every
/// scan including empty ones; above 1 no scan could ever be trusted.
fn parse_trust_threshold(raw: &str) -> Result<f64, ConfigError> {
    let value = raw
        .parse::<f64>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "CHURNWATCH_COVERAGE_TRUST_THRESHOLD".to_string(),
            reason: e.to_string(),
        })?;

    if !(value > 0.0 && value <= 1.0) {
        return Err(ConfigError::InvalidEnvVar {
            var: "CHURNWATCH_COVERAGE_TRUST_THRESHOLD".to_string(),
            reason: format!("must be in (0, 1], got {value}"),
        });
    }

    Ok(value)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
