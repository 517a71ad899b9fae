use anyhow::{Context, Result};
use serde::Deserialize;

use crate::analysis::AnalysisServiceConfig;
use crate::capture::CaptureConfig;
use crate::persistence::PersistenceConfig;

/// Environment variable prefix; nested keys use `__`
/// (e.g. `INTERVIEW_COACH__ANALYSIS__BASE_URL`)
pub const ENV_PREFIX: &str = "INTERVIEW_COACH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub analysis: AnalysisServiceConfig,
    pub capture: CaptureConfig,
    pub catalog: CatalogConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "interview-coach".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// How long a finished session stays readable before it is dropped
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            session_ttl_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file holding the domain list
    pub path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "config/catalog.json".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (extension optional) layered under environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        let config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        config
            .capture
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid capture configuration: {}", e))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "coach-test"

[analysis]
base_url = "http://analysis.local/api"

[capture]
max_duration_secs = 120
warning_threshold_secs = 15
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.service.name, "coach-test");
        assert_eq!(config.service.http.port, 8080);
        assert_eq!(config.analysis.base_url, "http://analysis.local/api");
        assert_eq!(config.analysis.upload_timeout_secs, 300);
        assert_eq!(config.capture.max_duration_secs, 120);
        assert_eq!(config.capture.sample_rate, 16000);
        assert_eq!(config.persistence.subject, "interview.session.completed");
        assert!(config.persistence.nats_url.is_none());
    }

    #[test]
    fn test_rejects_warning_past_limit() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[capture]\nmax_duration_secs = 30\nwarning_threshold_secs = 30"
        )
        .unwrap();

        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }
}
