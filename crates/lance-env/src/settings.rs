use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EnvError, EnvResult};

/// Settings for one running session, read from a TOML file.
///
/// Every field is optional in the file; omitted fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Directory holding `local-config.json` and `devnet-config.json`.
    pub config_dir: PathBuf,
    /// Directory for persisted identities.
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub application_id: String,
    pub action_log_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            data_dir: PathBuf::from(".cantonlance"),
            request_timeout_secs: 30,
            application_id: "cantonlance".to_string(),
            action_log_capacity: 200,
        }
    }
}

impl SessionSettings {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> EnvResult<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(text: &str) -> EnvResult<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| EnvError::Settings(e.to_string()))?;
        if settings.request_timeout_secs == 0 {
            return Err(EnvError::Settings("request_timeout_secs must be positive".into()));
        }
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SessionSettings::default();
        assert_eq!(s.request_timeout(), Duration::from_secs(30));
        assert_eq!(s.application_id, "cantonlance");
        assert_eq!(s.action_log_capacity, 200);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = SessionSettings::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(s, SessionSettings::default());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "config_dir = \"/etc/cantonlance\"\nrequest_timeout_secs = 5\n").unwrap();
        let s = SessionSettings::load(&path).unwrap();
        assert_eq!(s.config_dir, PathBuf::from("/etc/cantonlance"));
        assert_eq!(s.request_timeout_secs, 5);
        assert_eq!(s.action_log_capacity, 200);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(SessionSettings::from_toml("request_timeout_secs = 0").is_err());
        assert!(SessionSettings::from_toml("request_timeout_secs = \"soon\"").is_err());
    }
}
