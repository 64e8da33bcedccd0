use std::env;
use std::time::Duration;

/// Deployment-level settings, as distinct from the per-run [`crate::params::GcJobParams`].
/// Loaded once at process start the way `services/connector-manager`'s
/// `Config::from_env` and `shared::storage::gc::GCConfig::from_env` do.
#[derive(Debug, Clone)]
pub struct GcConfig {
    pub database_url: String,
    pub registry_control_url: String,
    pub registry_v2_url: String,
    /// Overridable only for tests; production always runs with the spec's
    /// fixed worker pool size of 5.
    pub sweep_concurrency: usize,
    pub health_check_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

const DEFAULT_SWEEP_CONCURRENCY: usize = 5;

impl GcConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let registry_control_url = env::var("REGISTRY_CONTROL_URL")
            .map_err(|_| ConfigError::Missing("REGISTRY_CONTROL_URL"))?;
        let registry_v2_url =
            env::var("REGISTRY_V2_URL").map_err(|_| ConfigError::Missing("REGISTRY_V2_URL"))?;

        let sweep_concurrency = match env::var("GC_SWEEP_CONCURRENCY") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "GC_SWEEP_CONCURRENCY",
                value: raw,
            })?,
            Err(_) => DEFAULT_SWEEP_CONCURRENCY,
        };

        Ok(Self {
            database_url,
            registry_control_url,
            registry_v2_url,
            sweep_concurrency,
            health_check_timeout: Duration::from_secs(5),
        })
    }
}
