use anyhow::Result;
use config::{Config, Environment, File};
use rxkit::config::{DatabaseConfig, ObservabilityConfig, ReactiveConfig};
use rxkit::shape::DaoMethod;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub database: DatabaseConfig,
    pub reactive: ReactiveConfig,
    pub observability: ObservabilityConfig,
    /// DAO methods run when no ad-hoc query is given.
    pub dao: Vec<DaoMethod>,
}

pub fn load_config(path: &str) -> Result<ProbeConfig> {
    let config = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix("CQL_PROBE").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
