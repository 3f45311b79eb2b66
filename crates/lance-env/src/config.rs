use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use lance_types::{LedgerMode, PartyCredential};
use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Well-known environments a session can switch between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKey {
    Local,
    Devnet,
}

impl EnvironmentKey {
    /// Preference order when picking a default.
    pub const ALL: [EnvironmentKey; 2] = [Self::Local, Self::Devnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Devnet => "devnet",
        }
    }

    /// Name of the configuration file probed for this environment.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Local => "local-config.json",
            Self::Devnet => "devnet-config.json",
        }
    }

    pub fn expected_mode(&self) -> LedgerMode {
        match self {
            Self::Local => LedgerMode::Local,
            Self::Devnet => LedgerMode::Devnet,
        }
    }
}

impl fmt::Display for EnvironmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentKey {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "sandbox" => Ok(Self::Local),
            "devnet" => Ok(Self::Devnet),
            other => Err(EnvError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// Connection parameters for one ledger deployment, as written by the
/// deployment scripts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub mode: LedgerMode,
    pub ledger_api_url: String,
    /// Identity key to credential, e.g. `client`, `freelancerA`.
    #[serde(default)]
    pub parties: BTreeMap<String, PartyCredential>,
    pub dar_package_id: String,
    #[serde(default)]
    pub deployed_at: String,
    /// Concrete template package id, when known at deploy time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
}

impl EnvironmentConfig {
    pub fn new(mode: LedgerMode, ledger_api_url: impl Into<String>, dar_package_id: impl Into<String>) -> Self {
        Self {
            mode,
            ledger_api_url: ledger_api_url.into(),
            parties: BTreeMap::new(),
            dar_package_id: dar_package_id.into(),
            deployed_at: String::new(),
            package_id: None,
        }
    }

    pub fn with_party(mut self, identity: impl Into<String>, credential: PartyCredential) -> Self {
        self.parties.insert(identity.into(), credential);
        self
    }

    pub fn is_sandbox(&self) -> bool {
        self.mode.is_sandbox()
    }

    pub fn mode_label(&self) -> &'static str {
        self.mode.label()
    }

    pub fn credential(&self, identity: &str) -> Option<&PartyCredential> {
        self.parties.get(identity)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
