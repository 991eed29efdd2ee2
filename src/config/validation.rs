//! Configuration validation.
//!
//! Serde handles the syntax; this module checks value ranges and
//! cross-field constraints. All errors are collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::{
    BreakerSettings, CommandSettings, DirectoryKind, EdgeConfig, PoolSettings,
};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    check_command("commands.default", &config.commands.default, &mut errors);
    for key in config.commands.overrides.keys() {
        if key.is_empty() {
            errors.push(ValidationError::new("commands.overrides", "command key must not be empty"));
            continue;
        }
        let field = format!("commands.overrides.{key}");
        check_command(&field, &config.commands.resolve(key), &mut errors);
    }

    check_pool("pools.default", &config.pools.default, &mut errors);
    for key in config.pools.overrides.keys() {
        if key.is_empty() {
            errors.push(ValidationError::new("pools.overrides", "pool key must not be empty"));
            continue;
        }
        let field = format!("pools.overrides.{key}");
        check_pool(&field, &config.pools.resolve(key), &mut errors);
    }

    for (name, client) in &config.clients {
        let field = format!("clients.{name}");
        if client.service_name.is_empty() {
            errors.push(ValidationError::new(format!("{field}.service_name"), "must not be empty"));
        }
        if client.refresh_interval_secs == 0 {
            errors.push(ValidationError::new(format!("{field}.refresh_interval_secs"), "must be > 0"));
        }
        if client.read_timeout_ms == 0 || client.connect_timeout_ms == 0 {
            errors.push(ValidationError::new(field, "timeouts must be > 0"));
        }
    }

    if config.directory.kind == DirectoryKind::Http && url::Url::parse(&config.directory.url).is_err() {
        errors.push(ValidationError::new(
            "directory.url",
            format!("'{}' is not a valid URL", config.directory.url),
        ));
    }
    for (service, endpoints) in &config.directory.services {
        for (i, endpoint) in endpoints.iter().enumerate() {
            if endpoint.host.is_empty() {
                errors.push(ValidationError::new(
                    format!("directory.services.{service}[{i}].host"),
                    "must not be empty",
                ));
            }
        }
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_secs == 0 {
            errors.push(ValidationError::new("health_check.interval_secs", "must be > 0"));
        }
        if health.healthy_threshold == 0 || health.unhealthy_threshold == 0 {
            errors.push(ValidationError::new("health_check", "thresholds must be > 0"));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_command(field: &str, settings: &CommandSettings, errors: &mut Vec<ValidationError>) {
    if settings.timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{field}.timeout_ms"), "must be > 0"));
    }
    check_breaker(&format!("{field}.circuit_breaker"), &settings.circuit_breaker, errors);
}

fn check_breaker(field: &str, b: &BreakerSettings, errors: &mut Vec<ValidationError>) {
    if b.error_threshold_percentage > 100 {
        errors.push(ValidationError::new(
            format!("{field}.error_threshold_percentage"),
            "must be between 0 and 100",
        ));
    }
    if b.rolling_window_buckets == 0 {
        errors.push(ValidationError::new(format!("{field}.rolling_window_buckets"), "must be > 0"));
    } else if b.rolling_window_ms % u64::from(b.rolling_window_buckets) != 0 {
        errors.push(ValidationError::new(
            format!("{field}.rolling_window_ms"),
            "must divide evenly into rolling_window_buckets",
        ));
    }
    if b.rolling_window_ms == 0 {
        errors.push(ValidationError::new(format!("{field}.rolling_window_ms"), "must be > 0"));
    }
    if b.force_open && b.force_closed {
        errors.push(ValidationError::new(field, "force_open and force_closed are exclusive"));
    }
}

fn check_pool(field: &str, settings: &PoolSettings, errors: &mut Vec<ValidationError>) {
    if settings.max_concurrency == 0 {
        errors.push(ValidationError::new(format!("{field}.max_concurrency"), "must be > 0"));
    }
}
