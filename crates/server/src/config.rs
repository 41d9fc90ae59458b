use crate::report::ReportOptions;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP listener binds to (`BIND_ADDRESS`).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Budget for probing one endpoint.
    #[serde(default = "default_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Budget for a single DNS lookup during discovery.
    #[serde(default = "default_timeout_secs")]
    pub dns_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            probe_timeout_secs: default_timeout_secs(),
            dns_timeout_secs: default_timeout_secs(),
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_probes() -> usize {
    8
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Validation(format!("bind_address '{}': {e}", self.bind_address))
        })?;
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "probe_timeout_secs must be > 0".into(),
            ));
        }
        if self.dns_timeout_secs == 0 {
            return Err(ConfigError::Validation("dns_timeout_secs must be > 0".into()));
        }
        if self.max_concurrent_probes == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_probes must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            max_concurrent_probes: self.max_concurrent_probes,
        }
    }
}

/// Load configuration from an optional `config.yaml` plus environment overrides.
///
/// Environment variables match the key path with `__` as separator, so
/// `BIND_ADDRESS` sets `bind_address` and `PROBE_TIMEOUT_SECS` sets
/// `probe_timeout_secs`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
