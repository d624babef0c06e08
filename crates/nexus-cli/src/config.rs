use anyhow::Context;
use nexus_broker::BrokerConfig;
use nexus_capability::MatcherConfig;
use nexus_orchestrator::{HttpExecutorConfig, RetryPolicy, WorkerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Contents of `nexus.toml`.
#[derive(Debug, Deserialize)]
pub struct NexusConfig {
    /// Agent definitions JSON; relative paths resolve against the config file.
    #[serde(default = "default_agents_file")]
    pub agents_file: PathBuf,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub http: HttpExecutorConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_agents_file() -> PathBuf {
    PathBuf::from("agents.json")
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            agents_file: default_agents_file(),
            matcher: MatcherConfig::default(),
            broker: BrokerConfig::default(),
            worker: WorkerConfig::default(),
            http: HttpExecutorConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl NexusConfig {
    /// Load and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
            toml::from_str::<NexusConfig>(&raw)
                .with_context(|| format!("Invalid config file '{}'", path.display()))?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            NexusConfig::default()
        };

        if config.agents_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.agents_file = dir.join(&config.agents_file);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.matcher.validate()?;
        self.broker.validate()?;
        if self.worker.max_concurrent_tasks == 0 {
            anyhow::bail!("worker.max_concurrent_tasks must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexus.toml");
        std::fs::write(
            &path,
            r#"
agents_file = "fleet/agents.json"

[matcher]
path_weight = 0.5
action_weight = 0.5
minimum_score = 0.8
max_matches = 3

[broker]
buffer_size = 16

[worker]
task_timeout_secs = 60
max_concurrent_tasks = 2

[http]
timeout_secs = 10

[retry]
max_retries = 5
backoff_base_ms = 200
backoff_max_ms = 2000
"#,
        )
        .unwrap();

        let config = NexusConfig::load(&path).unwrap();
        assert_eq!(config.agents_file, dir.path().join("fleet/agents.json"));
        assert_eq!(config.matcher.max_matches, 3);
        assert_eq!(config.broker.buffer_size, 16);
        assert_eq!(config.worker.max_concurrent_tasks, 2);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.retry.backoff_max_ms, 2000);
    }

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = NexusConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.agents_file, dir.path().join("agents.json"));
        assert_eq!(config.matcher, MatcherConfig::default());
        assert_eq!(config.broker.buffer_size, 100);
        assert_eq!(config.worker.task_timeout_secs, 300);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexus.toml");
        std::fs::write(&path, "[matcher]\npath_weight = 0.9\n").unwrap();
        assert!(NexusConfig::load(&path).is_err());

        std::fs::write(&path, "[broker]\nbuffer_size = 0\n").unwrap();
        assert!(NexusConfig::load(&path).is_err());
    }
}
