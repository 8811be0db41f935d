//! regrid.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default API listen port.
const DEFAULT_PORT: u16 = 8090;
/// Default per-watcher cache sync deadline.
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);
/// Default retry budget per event identity.
const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegridConfig {
    pub rules: Option<RulesConfig>,
    pub periodic: Option<PeriodicConfig>,
    pub engine: Option<EngineConfigSection>,
    pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Label expression restricting which nodes are observed.
    pub node_selector: Option<String>,
    /// Minimum ready fleet size before a pass may fire.
    pub min_ready: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodicConfig {
    pub enabled: Option<bool>,
    /// Tick interval, e.g. "5m".
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigSection {
    /// Cache sync deadline, e.g. "30s".
    pub sync_timeout: Option<String>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: Option<u16>,
}

impl RegridConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RegridConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Node selector expression; empty means observe everything.
    pub fn node_selector(&self) -> &str {
        self.rules
            .as_ref()
            .and_then(|r| r.node_selector.as_deref())
            .unwrap_or("")
    }

    pub fn min_ready(&self) -> usize {
        self.rules.as_ref().and_then(|r| r.min_ready).unwrap_or(1)
    }

    /// Tick interval when periodic mode is enabled, else `None`.
    pub fn periodic_interval(&self) -> Option<Duration> {
        let periodic = self.periodic.as_ref()?;
        if !periodic.enabled.unwrap_or(false) {
            return None;
        }
        periodic
            .interval
            .as_deref()
            .and_then(parse_duration)
    }

    pub fn sync_timeout(&self) -> Duration {
        self.engine
            .as_ref()
            .and_then(|e| e.sync_timeout.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_SYNC_TIMEOUT)
    }

    pub fn max_retries(&self) -> u32 {
        self.engine
            .as_ref()
            .and_then(|e| e.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn port(&self) -> u16 {
        self.api.as_ref().and_then(|a| a.port).unwrap_or(DEFAULT_PORT)
    }
}

/// Parse a duration string like "5s", "500ms", "2m".
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[rules]
node_selector = "role=worker"
min_ready = 3

[periodic]
enabled = true
interval = "5m"

[engine]
sync_timeout = "10s"
max_retries = 7

[api]
port = 9000
"#;
        let config: RegridConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.node_selector(), "role=worker");
        assert_eq!(config.min_ready(), 3);
        assert_eq!(config.periodic_interval(), Some(Duration::from_secs(300)));
        assert_eq!(config.sync_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_retries(), 7);
        assert_eq!(config.port(), 9000);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: RegridConfig = toml::from_str("").unwrap();
        assert_eq!(config.node_selector(), "");
        assert_eq!(config.min_ready(), 1);
        assert_eq!(config.periodic_interval(), None);
        assert_eq!(config.sync_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries(), 5);
        assert_eq!(config.port(), 8090);
    }

    #[test]
    fn periodic_disabled_means_no_interval() {
        let toml_str = r#"
[periodic]
enabled = false
interval = "5m"
"#;
        let config: RegridConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.periodic_interval(), None);
    }

    #[test]
    fn parse_duration_forms() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("soon"), None);
    }
}
