use thiserror::Error;

/// Errors produced when constructing or validating domain records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("invalid proposal terms: {0}")]
    InvalidTerms(String),

    #[error("invalid payment amount {0}: must be a positive number")]
    InvalidPayment(f64),

    #[error("unknown role category: {0}")]
    UnknownRole(String),
}
