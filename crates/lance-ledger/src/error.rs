/// Errors produced by ledger calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The ledger answered with a non-success status (including auth failures).
    #[error("ledger API error {status}: {body}")]
    Transport { status: u16, body: String },

    #[error("ledger request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected ledger response: {0}")]
    InvalidResponse(String),

    #[error("no credential registered for identity `{0}`")]
    UnknownIdentity(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Timeouts and connection failures may succeed on retry; protocol
    /// rejections will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Per-record failure while decoding a query response.
///
/// Partial visibility is expected, so these never fail a whole query; the
/// offending entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("entry carries no active contract")]
    MissingActiveContract,

    #[error("active contract carries no created event")]
    MissingCreatedEvent,

    #[error("created event has no contract id")]
    MissingContractId,

    #[error("create argument for {template} is not an object")]
    InvalidArgument { template: String },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(LedgerError::Timeout("t".into()).is_retryable());
        assert!(LedgerError::Network("n".into()).is_retryable());
        assert!(!LedgerError::Transport { status: 500, body: String::new() }.is_retryable());
        assert!(!LedgerError::UnknownIdentity("x".into()).is_retryable());
    }

    #[test]
    fn transport_error_display_carries_status_and_body() {
        let e = LedgerError::Transport { status: 403, body: "denied".into() };
        assert_eq!(e.to_string(), "ledger API error 403: denied");
        assert_eq!(e.status(), Some(403));
    }
}
