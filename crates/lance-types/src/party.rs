use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Role a party plays in the hiring workflow.
///
/// The role decides both which views a party is routed to and which
/// workflow transitions it may trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleCategory {
    Client,
    Freelancer,
    Auditor,
}

impl RoleCategory {
    pub const ALL: [RoleCategory; 3] = [Self::Client, Self::Freelancer, Self::Auditor];

    /// Default colour tag for parties of this role.
    pub fn color_tag(&self) -> &'static str {
        match self {
            Self::Client => "#0d6efd",
            Self::Freelancer => "#198754",
            Self::Auditor => "#dc3545",
        }
    }

    pub fn can_propose(&self) -> bool {
        matches!(self, Self::Client)
    }

    /// Accepting or rejecting a proposal.
    pub fn can_respond_to_proposal(&self) -> bool {
        matches!(self, Self::Freelancer)
    }

    pub fn can_submit_milestone(&self) -> bool {
        matches!(self, Self::Freelancer)
    }

    /// Approving or rejecting a submitted milestone.
    pub fn can_review_milestone(&self) -> bool {
        matches!(self, Self::Client)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Client)
    }

    pub fn can_generate_audit(&self) -> bool {
        matches!(self, Self::Client)
    }

    pub fn can_observe_audit(&self) -> bool {
        matches!(self, Self::Auditor)
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "Client"),
            Self::Freelancer => write!(f, "Freelancer"),
            Self::Auditor => write!(f, "Auditor"),
        }
    }
}

impl FromStr for RoleCategory {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "freelancer" => Ok(Self::Freelancer),
            "auditor" => Ok(Self::Auditor),
            other => Err(TypeError::UnknownRole(other.to_string())),
        }
    }
}

/// An identity capable of acting on the ledger.
///
/// `raw_ledger_name` is the party hint the ledger-native identifier starts
/// with: native ids look like `<raw_ledger_name>::<fingerprint>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: String,
    pub raw_ledger_name: String,
    pub display_name: String,
    pub short_name: String,
    pub avatar_glyph: String,
    pub role: RoleCategory,
    pub color_tag: String,
    pub is_preset: bool,
}

impl Party {
    /// A fixed demo identity.
    pub fn preset(
        id: &str,
        raw_ledger_name: &str,
        display_name: &str,
        role: RoleCategory,
        color_tag: &str,
    ) -> Self {
        Self {
            id: id.into(),
            raw_ledger_name: raw_ledger_name.into(),
            display_name: display_name.into(),
            short_name: short_name_of(display_name),
            avatar_glyph: initials(display_name),
            role,
            color_tag: color_tag.into(),
            is_preset: true,
        }
    }

    /// An identity allocated at runtime. Avatar and colour are derived.
    pub fn dynamic(
        id: impl Into<String>,
        raw_ledger_name: impl Into<String>,
        display_name: &str,
        role: RoleCategory,
    ) -> Self {
        let display_name = display_name.trim();
        Self {
            id: id.into(),
            raw_ledger_name: raw_ledger_name.into(),
            display_name: display_name.into(),
            short_name: short_name_of(display_name),
            avatar_glyph: initials(display_name),
            role,
            color_tag: role.color_tag().into(),
            is_preset: false,
        }
    }

    /// Label used in human-readable descriptions, e.g. `Nidhi (Freelancer)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.display_name, self.role)
    }
}

/// Up to two uppercase initials, `?` for a blank name.
fn initials(name: &str) -> String {
    let glyph: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if glyph.is_empty() {
        "?".into()
    } else {
        glyph
    }
}

fn short_name_of(name: &str) -> String {
    name.split_whitespace().next().unwrap_or_default().to_string()
}

/// The fixed demo identities, in registry order.
pub fn preset_parties() -> Vec<Party> {
    vec![
        Party::preset(
            "client",
            "Client_EthFoundation",
            "Ethereum Foundation",
            RoleCategory::Client,
            "#0d6efd",
        ),
        Party::preset(
            "freelancerA",
            "FreelancerA_Nidhi",
            "Nidhi",
            RoleCategory::Freelancer,
            "#198754",
        ),
        Party::preset(
            "freelancerB",
            "FreelancerB_Akash",
            "Akash",
            RoleCategory::Freelancer,
            "#6f42c1",
        ),
        Party::preset(
            "auditor",
            "Auditor_Eve",
            "Eve",
            RoleCategory::Auditor,
            "#dc3545",
        ),
    ]
}
