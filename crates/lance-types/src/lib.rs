//! Domain records for CantonLance.
//!
//! Every other `lance-*` crate depends on `lance-types`. The records here are
//! pure data: the ledger owns their lifecycle, the rest of the workspace only
//! submits intents and re-reads what the ledger lets an identity see.
//!
//! # Key Types
//!
//! - [`Party`] — a preset or dynamically allocated identity, with its [`RoleCategory`]
//! - [`ContractRef`] — ledger contract identifier
//! - [`ProposalTerms`] — validated terms for a new proposal
//! - [`Proposal`], [`Contract`], [`Payment`], [`AuditSummary`] — decoded ledger records
//! - [`VisibleState`] — everything one identity can currently see

pub mod credential;
pub mod error;
pub mod numeric;
pub mod party;
pub mod period;
pub mod records;

pub use credential::{LedgerMode, PartyCredential};
pub use error::TypeError;
pub use party::{preset_parties, Party, RoleCategory};
pub use period::{current_report_period, report_period_for};
pub use records::{
    validate_payment, AuditSummary, Contract, ContractRef, ContractStatus, Payment, Proposal,
    ProposalTerms, VisibleState, MAX_MILESTONES,
};
