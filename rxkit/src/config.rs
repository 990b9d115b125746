use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub hosts: Vec<String>,
    pub port: u16,
    pub keyspace: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connection_timeout: Duration,
    pub request_timeout: Duration,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            port: 9042,
            keyspace: "system".to_string(),
            username: None,
            password: None,
            connection_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            pool_size: 4,
        }
    }
}

impl DatabaseConfig {
    pub fn contact_points(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|h| format!("{}:{}", h, self.port))
            .collect()
    }
}

/// Settings of the reactive layer itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Page size applied to statements that do not set one.
    pub page_size: Option<u32>,
    /// Capture the ambient runtime as the delivery context of new sessions.
    pub context_affinity: bool,
    pub context_name: String,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            page_size: Some(5000),
            context_affinity: true,
            context_name: "request".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
