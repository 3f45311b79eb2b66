use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{EnvironmentConfig, EnvironmentKey};
use crate::error::{EnvError, EnvResult};

/// The set of environments with a usable configuration.
///
/// An environment without a configuration is simply absent; callers hide it
/// rather than treating it as a failure.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentRegistry {
    environments: BTreeMap<EnvironmentKey, EnvironmentConfig>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe `dir` for every well-known environment file.
    ///
    /// Missing, unreadable, or inconsistent files leave that environment
    /// unavailable and are only logged.
    pub fn discover(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut environments = BTreeMap::new();
        for key in EnvironmentKey::ALL {
            match load_config(dir, key) {
                Ok(config) => {
                    info!(environment = %key, url = %config.ledger_api_url, "environment available");
                    environments.insert(key, config);
                }
                Err(EnvError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(environment = %key, dir = %dir.display(), "no configuration found");
                }
                Err(e) => {
                    warn!(environment = %key, error = %e, "ignoring environment configuration");
                }
            }
        }
        Self { environments }
    }

    /// Build a registry from already loaded configurations.
    pub fn from_configs<I>(configs: I) -> EnvResult<Self>
    where
        I: IntoIterator<Item = (EnvironmentKey, EnvironmentConfig)>,
    {
        let mut environments = BTreeMap::new();
        for (key, config) in configs {
            check_mode(key, &config)?;
            environments.insert(key, config);
        }
        Ok(Self { environments })
    }

    /// Available environments in preference order.
    pub fn available_environments(&self) -> Vec<EnvironmentKey> {
        self.environments.keys().copied().collect()
    }

    pub fn get(&self, key: EnvironmentKey) -> Option<&EnvironmentConfig> {
        self.environments.get(&key)
    }

    pub fn is_available(&self, key: EnvironmentKey) -> bool {
        self.environments.contains_key(&key)
    }

    /// Local if configured, else the first other available environment.
    pub fn default_key(&self) -> Option<EnvironmentKey> {
        EnvironmentKey::ALL.into_iter().find(|k| self.is_available(*k))
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

/// Path of the configuration file for `key` under `dir`.
pub fn config_path(dir: &Path, key: EnvironmentKey) -> PathBuf {
    dir.join(key.file_name())
}

/// Load and validate the configuration for one environment.
pub fn load_config(dir: &Path, key: EnvironmentKey) -> EnvResult<EnvironmentConfig> {
    let path = config_path(dir, key);
    let text = fs::read_to_string(&path)?;
    let config = EnvironmentConfig::from_json(&text).map_err(|e| EnvError::InvalidConfig {
        path: path.clone(),
        message: e.to_string(),
    })?;
    if config.ledger_api_url.trim().is_empty() {
        return Err(EnvError::InvalidConfig {
            path,
            message: "ledgerApiUrl is empty".into(),
        });
    }
    check_mode(key, &config)?;
    Ok(config)
}

fn check_mode(key: EnvironmentKey, config: &EnvironmentConfig) -> EnvResult<()> {
    if config.mode != key.expected_mode() {
        return Err(EnvError::ModeMismatch {
            key,
            expected: key.expected_mode(),
            found: config.mode,
        });
    }
    Ok(())
}
