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
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::str::FromStr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SQSTWITT_ENV", "development"))?;
    let log_level = or_default("SQSTWITT_LOG_LEVEL", "info");

    let bind_addr = or_default("SQSTWITT_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("SQSTWITT_BIND_ADDR", e.to_string()))?;

    let parse_num = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        u64::from_str(raw.trim()).map_err(|e| invalid(var, e.to_string()))
    };

    let parse_in_range = |var: &str, default: &str, min: u64, max: u64| -> Result<u64, ConfigError> {
        let value = parse_num(var, default)?;
        if value < min || value > max {
            return Err(invalid(var, format!("must be between {min} and {max}, got {value}")));
        }
        Ok(value)
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Ok(raw) => parse_flag(&raw).ok_or_else(|| {
                invalid(var, format!("expected true/false, got '{raw}'"))
            }),
            Err(_) => Ok(default),
        }
    };

    let queue_name = or_default("SQSTWITT_QUEUE_NAME", "tweetsQueue");
    let aws_region = or_default("SQSTWITT_AWS_REGION", "us-east-1");
    let sqs_endpoint_url = optional("SQSTWITT_SQS_ENDPOINT_URL");
    let dead_letter_queue_name = optional("SQSTWITT_DEAD_LETTER_QUEUE_NAME");

    // Bounds are the SQS API limits for ReceiveMessage.
    let receive_batch_size = parse_in_range("SQSTWITT_RECEIVE_BATCH_SIZE", "10", 1, 10)?;
    let receive_wait_secs = parse_in_range("SQSTWITT_RECEIVE_WAIT_SECS", "10", 0, 20)?;
    let poll_interval_secs = parse_num("SQSTWITT_POLL_INTERVAL_SECS", "10")?;
    let max_in_flight = parse_in_range("SQSTWITT_MAX_IN_FLIGHT", "32", 1, 4096)?;
    let call_timeout_secs = parse_in_range("SQSTWITT_CALL_TIMEOUT_SECS", "30", 1, 600)?;
    let ack_enabled = parse_bool("SQSTWITT_ACK_ENABLED", true)?;
    let max_receive_count = parse_in_range("SQSTWITT_MAX_RECEIVE_COUNT", "5", 1, 1000)?;
    let batch_classify = parse_bool("SQSTWITT_BATCH_CLASSIFY", false)?;

    let classifier_url = optional("SQSTWITT_CLASSIFIER_URL");
    let classifier_token = optional("SQSTWITT_CLASSIFIER_TOKEN");

    let db_max_connections = parse_in_range("SQSTWITT_DB_MAX_CONNECTIONS", "10", 1, 1000)?;
    let db_min_connections = parse_in_range("SQSTWITT_DB_MIN_CONNECTIONS", "1", 0, 1000)?;
    let db_acquire_timeout_secs = parse_num("SQSTWITT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if db_min_connections > db_max_connections {
        return Err(invalid(
            "SQSTWITT_DB_MIN_CONNECTIONS",
            format!("must not exceed SQSTWITT_DB_MAX_CONNECTIONS ({db_max_connections})"),
        ));
    }

    // Every range above fits the narrower target types, so these conversions
    // cannot fail; map_err keeps them panic-free anyway.
    let narrow = |var: &str, e: std::num::TryFromIntError| invalid(var, e.to_string());

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        bind_addr,
        queue_name,
        aws_region,
        sqs_endpoint_url,
        dead_letter_queue_name,
        receive_batch_size: i32::try_from(receive_batch_size)
            .map_err(|e| narrow("SQSTWITT_RECEIVE_BATCH_SIZE", e))?,
        receive_wait_secs: i32::try_from(receive_wait_secs)
            .map_err(|e| narrow("SQSTWITT_RECEIVE_WAIT_SECS", e))?,
        poll_interval_secs,
        max_in_flight: usize::try_from(max_in_flight)
            .map_err(|e| narrow("SQSTWITT_MAX_IN_FLIGHT", e))?,
        call_timeout_secs,
        ack_enabled,
        max_receive_count: u32::try_from(max_receive_count)
            .map_err(|e| narrow("SQSTWITT_MAX_RECEIVE_COUNT", e))?,
        batch_classify,
        classifier_url,
        classifier_token,
        db_max_connections: u32::try_from(db_max_connections)
            .map_err(|e| narrow("SQSTWITT_DB_MAX_CONNECTIONS", e))?,
        db_min_connections: u32::try_from(db_min_connections)
            .map_err(|e| narrow("SQSTWITT_DB_MIN_CONNECTIONS", e))?,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SQSTWITT_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
