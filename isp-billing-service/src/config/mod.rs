//! Configuration module for isp-billing-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// `None` runs the service on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub jobs: JobsConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Background lifecycle job runner.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    pub enabled: bool,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub enabled: bool,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Upper bound on retrying one delivery.
    pub max_elapsed: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(86_400),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(10),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS").unwrap_or(2),
            }),
            _ => None,
        };

        let jobs_defaults = JobsConfig::default();
        let push_defaults = PushConfig::default();

        let interval_secs: u64 =
            env_parse("JOBS_INTERVAL_SECS").unwrap_or(jobs_defaults.interval.as_secs());
        if interval_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JOBS_INTERVAL_SECS must be greater than zero"
            )));
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "isp-billing-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database,
            jobs: JobsConfig {
                enabled: env_parse("JOBS_ENABLED").unwrap_or(jobs_defaults.enabled),
                interval: Duration::from_secs(interval_secs),
            },
            push: PushConfig {
                enabled: env_parse("PUSH_ENABLED").unwrap_or(push_defaults.enabled),
                timeout: env_parse("PUSH_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(push_defaults.timeout),
                max_elapsed: env_parse("PUSH_MAX_ELAPSED_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(push_defaults.max_elapsed),
            },
        })
    }

    /// Configuration for tests and local runs: in-memory store, jobs off.
    pub fn for_tests() -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: "isp-billing-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: None,
            jobs: JobsConfig::default(),
            push: PushConfig {
                max_elapsed: Duration::from_secs(1),
                ..PushConfig::default()
            },
        }
    }
}
