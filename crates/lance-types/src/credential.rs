use std::fmt;

use serde::{Deserialize, Serialize};

/// Class of ledger deployment an environment points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// Local sandbox: no auth header, identity allocation allowed.
    Local,
    /// Remote network: bearer tokens, no identity allocation.
    Devnet,
}

impl LedgerMode {
    pub fn is_sandbox(&self) -> bool {
        matches!(self, Self::Local)
    }

    /// Upper-case tag used in call-log descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "SANDBOX",
            Self::Devnet => "DEVNET",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Local => "Local Sandbox",
            Self::Devnet => "Canton DevNet",
        }
    }
}

impl fmt::Display for LedgerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Devnet => write!(f, "devnet"),
        }
    }
}

/// How one identity authenticates and acts on a ledger.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyCredential {
    /// Ledger-native party identifier (`<hint>::<fingerprint>`).
    pub party_id: String,
    pub user_id: String,
    #[serde(default)]
    pub token: String,
}

impl PartyCredential {
    pub fn new(party_id: impl Into<String>, user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            party_id: party_id.into(),
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for PartyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartyCredential")
            .field("party_id", &self.party_id)
            .field("user_id", &self.user_id)
            .field("token", &if self.token.is_empty() { "<none>" } else { "<redacted>" })
            .finish()
    }
}
