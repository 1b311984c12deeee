use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if an env var holds a value that cannot be parsed.
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
/// Returns `ConfigError` if an env var holds a value that cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

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

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let env = parse_environment(&or_default("COUPONHUB_ENV", "development"));
    let bind_addr = parse_addr("COUPONHUB_BIND_ADDR", "0.0.0.0:4000")?;
    let log_level = or_default("COUPONHUB_LOG_LEVEL", "info");

    let providers_path = lookup("COUPONHUB_PROVIDERS_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let store_path = PathBuf::from(or_default(
        "COUPONHUB_STORE_PATH",
        "./data/coupons/coupons.json",
    ));

    let metrics_history = parse_usize("COUPONHUB_METRICS_HISTORY", "100")?;
    if metrics_history == 0 {
        return Err(invalid(
            "COUPONHUB_METRICS_HISTORY",
            "must be at least 1".to_string(),
        ));
    }

    let fetch_timeout_secs = parse_u64("COUPONHUB_FETCH_TIMEOUT_SECS", "30")?;
    let fetch_user_agent = or_default(
        "COUPONHUB_FETCH_USER_AGENT",
        "couponhub/0.1 (coupon-aggregator)",
    );
    let fetch_max_retries = parse_u32("COUPONHUB_FETCH_MAX_RETRIES", "2")?;
    let fetch_backoff_base_secs = parse_u64("COUPONHUB_FETCH_BACKOFF_BASE_SECS", "2")?;
    let run_on_startup = parse_bool("COUPONHUB_RUN_ON_STARTUP", "false")?;
    let shutdown_timeout_secs = parse_u64("COUPONHUB_SHUTDOWN_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        providers_path,
        store_path,
        metrics_history,
        fetch_timeout_secs,
        fetch_user_agent,
        fetch_max_retries,
        fetch_backoff_base_secs,
        run_on_startup,
        shutdown_timeout_secs,
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
