use lance_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Rejected before any ledger call.
    #[error("policy violation: {0}")]
    Policy(String),

    #[error("invalid display name: {0:?}")]
    InvalidName(String),

    /// The party exists on the ledger but no local identity was recorded.
    #[error("party {party} was allocated but its user could not be created: {source}")]
    OrphanedParty {
        party: String,
        #[source]
        source: LedgerError,
    },

    #[error("identity registry has no active environment")]
    Inactive,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("identity store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IdentityResult<T> = Result<T, IdentityError>;
