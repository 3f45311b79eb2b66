use lance_env::{EnvError, EnvironmentKey};
use lance_identity::IdentityError;
use lance_ledger::LedgerError;
use lance_types::{ContractRef, RoleCategory, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The environment forbids the operation, e.g. account creation off the sandbox.
    #[error("not allowed: {0}")]
    Policy(String),

    #[error("a {role} cannot {action}")]
    NotPermitted { role: RoleCategory, action: &'static str },

    #[error(transparent)]
    Invalid(#[from] TypeError),

    #[error("contract {0} has no milestone awaiting review")]
    NoPendingMilestone(ContractRef),

    #[error("{0} is not a valid counterparty: {1}")]
    InvalidCounterparty(String, String),

    #[error("operation `{0}` is already in progress")]
    Busy(String),

    #[error("no ledger environment is connected")]
    NotConnected,

    #[error("environment `{0}` is not available")]
    UnknownEnvironment(EnvironmentKey),

    #[error("unknown identity `{0}`")]
    UnknownIdentity(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("identity error: {0}")]
    Identity(IdentityError),

    #[error("environment error: {0}")]
    Env(#[from] EnvError),
}

impl From<IdentityError> for SessionError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Policy(message) => Self::Policy(message),
            IdentityError::Ledger(e) => Self::Ledger(e),
            other => Self::Identity(other),
        }
    }
}

impl SessionError {
    /// Timeouts and network failures may be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_retryable())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
