//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//! cors_allowed_origins = ["https://status.acme.example"]
//!
//! [engine]
//! db_path = "/var/lib/uptime/uptime.db"
//! check_interval_secs = 60
//! retention_days = 30
//!
//! [[monitor]]
//! group = "acme"
//! name = "home"
//! url = "https://acme.example"
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use uptime_core::{EngineConfig, Monitor};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub monitor: Vec<MonitorDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
            cors_allowed_origins: default_cors_origins(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,

    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            check_interval_secs: default_check_interval_secs(),
            retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval_secs(),
            request_timeout_ms: None,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data.db")
}

fn default_check_interval_secs() -> u64 {
    300
}

fn default_retention_days() -> u32 {
    90
}

fn default_purge_interval_secs() -> u64 {
    24 * 60 * 60
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut c = EngineConfig::default()
            .with_check_interval_secs(self.check_interval_secs)
            .with_retention_days(self.retention_days)
            .with_purge_interval_secs(self.purge_interval_secs);
        if let Some(ms) = self.request_timeout_ms {
            c = c.with_request_timeout_ms(ms);
        }
        c
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorDef {
    pub group: String,
    pub name: String,
    pub url: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn monitors(&self) -> Vec<Monitor> {
        self.monitor
            .iter()
            .map(|m| Monitor::new(m.group.as_str(), m.name.as_str(), m.url.as_str()))
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        let mut keys = HashSet::new();
        for (i, m) in self.monitor.iter().enumerate() {
            if m.group.trim().is_empty() {
                return Err(format!("Monitor at index {} has an empty group", i));
            }
            if m.name.trim().is_empty() {
                return Err(format!("Monitor at index {} has an empty name", i));
            }
            if !keys.insert((m.group.as_str(), m.name.as_str())) {
                return Err(format!("Duplicate monitor: {}/{}", m.group, m.name));
            }
            let parsed = url::Url::parse(&m.url).map_err(|e| {
                format!("Invalid URL for monitor '{}/{}': {} ({})", m.group, m.name, m.url, e)
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!(
                    "Monitor URL must use http or https for '{}/{}': {}",
                    m.group, m.name, m.url
                ));
            }
        }

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        if self.engine.check_interval_secs == 0 {
            return Err("check_interval_secs must be greater than 0".into());
        }
        if self.engine.retention_days == 0 {
            return Err("retention_days must be greater than 0".into());
        }
        if self.engine.purge_interval_secs == 0 {
            return Err("purge_interval_secs must be greater than 0".into());
        }

        Ok(())
    }
}
