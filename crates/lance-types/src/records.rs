use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Upper bound on milestones per engagement.
pub const MAX_MILESTONES: u32 = 20;

/// Ledger identifier of an active contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractRef(String);

impl ContractRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 characters, for log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(16) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContractRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Terms a Client offers when proposing work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalTerms {
    pub description: String,
    pub hourly_rate: f64,
    pub total_budget: f64,
    pub milestones_total: u32,
}

impl ProposalTerms {
    pub fn new(
        description: impl Into<String>,
        hourly_rate: f64,
        total_budget: f64,
        milestones_total: u32,
    ) -> Self {
        Self {
            description: description.into(),
            hourly_rate,
            total_budget,
            milestones_total,
        }
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        if self.description.trim().is_empty() {
            return Err(TypeError::InvalidTerms("description must not be empty".into()));
        }
        if !(self.hourly_rate.is_finite() && self.hourly_rate > 0.0) {
            return Err(TypeError::InvalidTerms(format!(
                "hourly rate must be positive, got {}",
                self.hourly_rate
            )));
        }
        if !(self.total_budget.is_finite() && self.total_budget > 0.0) {
            return Err(TypeError::InvalidTerms(format!(
                "total budget must be positive, got {}",
                self.total_budget
            )));
        }
        if !(1..=MAX_MILESTONES).contains(&self.milestones_total) {
            return Err(TypeError::InvalidTerms(format!(
                "milestones must be between 1 and {MAX_MILESTONES}, got {}",
                self.milestones_total
            )));
        }
        Ok(())
    }
}

/// Validate a milestone payment amount.
pub fn validate_payment(amount: f64) -> Result<(), TypeError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(TypeError::InvalidPayment(amount))
    }
}

/// An unconfirmed offer from a Client to a Freelancer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub contract_ref: ContractRef,
    pub client: String,
    pub freelancer: String,
    pub description: String,
    pub hourly_rate: f64,
    pub total_budget: f64,
    pub milestones_total: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Active,
    Completed,
    Disputed,
}

impl ContractStatus {
    /// Parse a ledger status; missing or unrecognised values are `Active`.
    pub fn from_ledger(value: &str) -> Self {
        match value {
            "Completed" => Self::Completed,
            "Disputed" => Self::Disputed,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Disputed => "Disputed",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accepted engagement with milestone and payment tracking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_ref: ContractRef,
    pub client: String,
    pub freelancer: String,
    pub description: String,
    pub hourly_rate: f64,
    pub total_budget: f64,
    pub milestones_total: u32,
    pub milestones_completed: u32,
    pub amount_paid: f64,
    pub status: ContractStatus,
    /// `None` when the ledger payload does not expose the flag.
    pub milestone_pending: Option<bool>,
}

impl Contract {
    pub fn remaining_budget(&self) -> f64 {
        (self.total_budget - self.amount_paid).max(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.status == ContractStatus::Completed
            || (self.milestones_total > 0 && self.milestones_completed >= self.milestones_total)
    }
}

/// Immutable record of one approved milestone payment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub contract_ref: ContractRef,
    pub client: String,
    pub freelancer: String,
    pub amount: f64,
    pub milestone_number: u32,
    pub timestamp: String,
    pub project_description: String,
}

/// Aggregate totals shared with an Auditor; never references contracts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub contract_ref: ContractRef,
    pub client: String,
    pub auditor: String,
    pub total_contracts_count: u32,
    pub total_amount_paid: f64,
    pub report_period: String,
}

/// Everything one identity can currently see on the ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleState {
    pub contracts: Vec<Contract>,
    pub proposals: Vec<Proposal>,
    pub payments: Vec<Payment>,
    pub audit_summaries: Vec<AuditSummary>,
}

impl VisibleState {
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
            && self.proposals.is_empty()
            && self.payments.is_empty()
            && self.audit_summaries.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.contracts.len() + self.proposals.len() + self.payments.len() + self.audit_summaries.len()
    }

    /// Sum of all visible payments.
    pub fn total_paid(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn contract(&self, contract_ref: &ContractRef) -> Option<&Contract> {
        self.contracts.iter().find(|c| &c.contract_ref == contract_ref)
    }

    pub fn proposal(&self, contract_ref: &ContractRef) -> Option<&Proposal> {
        self.proposals.iter().find(|p| &p.contract_ref == contract_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(completed: u32, total: u32, paid: f64) -> Contract {
        Contract {
            contract_ref: "00abc".into(),
            client: "Client::1".into(),
            freelancer: "Freelancer::2".into(),
            description: "Audit tooling".into(),
            hourly_rate: 100.0,
            total_budget: 1000.0,
            milestones_total: total,
            milestones_completed: completed,
            amount_paid: paid,
            status: ContractStatus::Active,
            milestone_pending: None,
        }
    }

    #[test]
    fn terms_validation() {
        assert!(ProposalTerms::new("Build", 150.0, 5000.0, 4).validate().is_ok());
        assert!(ProposalTerms::new("", 150.0, 5000.0, 4).validate().is_err());
        assert!(ProposalTerms::new("Build", 0.0, 5000.0, 4).validate().is_err());
        assert!(ProposalTerms::new("Build", 150.0, -1.0, 4).validate().is_err());
        assert!(ProposalTerms::new("Build", 150.0, 5000.0, 0).validate().is_err());
        assert!(ProposalTerms::new("Build", 150.0, 5000.0, 21).validate().is_err());
        assert!(ProposalTerms::new("Build", 150.0, 5000.0, 20).validate().is_ok());
        assert!(ProposalTerms::new("Build", f64::NAN, 5000.0, 2).validate().is_err());
    }

    #[test]
    fn payment_validation() {
        assert!(validate_payment(500.0).is_ok());
        assert_eq!(validate_payment(0.0), Err(TypeError::InvalidPayment(0.0)));
        assert!(validate_payment(-5.0).is_err());
    }

    #[test]
    fn contract_ref_short() {
        let r = ContractRef::new("00112233445566778899aabbccddeeff");
        assert_eq!(r.short(), "0011223344556677");
        assert_eq!(ContractRef::new("abc").short(), "abc");
    }

    #[test]
    fn status_parse_defaults_to_active() {
        assert_eq!(ContractStatus::from_ledger("Completed"), ContractStatus::Completed);
        assert_eq!(ContractStatus::from_ledger("Disputed"), ContractStatus::Disputed);
        assert_eq!(ContractStatus::from_ledger(""), ContractStatus::Active);
        assert_eq!(ContractStatus::from_ledger("Weird"), ContractStatus::Active);
    }

    #[test]
    fn contract_helpers() {
        let c = contract(1, 2, 500.0);
        assert_eq!(c.remaining_budget(), 500.0);
        assert!(!c.is_complete());
        assert!(contract(2, 2, 1000.0).is_complete());
    }

    #[test]
    fn visible_state_lookups() {
        let mut state = VisibleState::default();
        assert!(state.is_empty());
        state.contracts.push(contract(0, 2, 0.0));
        state.payments.push(Payment {
            contract_ref: "p1".into(),
            client: "c".into(),
            freelancer: "f".into(),
            amount: 250.0,
            milestone_number: 1,
            timestamp: String::new(),
            project_description: String::new(),
        });
        assert_eq!(state.total_records(), 2);
        assert_eq!(state.total_paid(), 250.0);
        assert!(state.contract(&"00abc".into()).is_some());
        assert!(state.proposal(&"00abc".into()).is_none());
    }

    #[test]
    fn contract_ref_serializes_transparently() {
        let json = serde_json::to_string(&ContractRef::new("00ff")).unwrap();
        assert_eq!(json, "\"00ff\"");
    }
}
