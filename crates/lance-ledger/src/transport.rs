use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LedgerResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// One request to the ledger's JSON API.
#[derive(Clone, Debug)]
pub struct LedgerRequest {
    pub method: HttpMethod,
    pub endpoint: &'static str,
    pub body: Option<Value>,
    /// Credential token of the acting identity. Whether it is sent is up to
    /// the transport.
    pub token: Option<String>,
}

impl LedgerRequest {
    pub fn get(endpoint: &'static str) -> Self {
        Self {
            method: HttpMethod::Get,
            endpoint,
            body: None,
            token: None,
        }
    }

    pub fn post(endpoint: &'static str, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            endpoint,
            body: Some(body),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        if !token.is_empty() {
            self.token = Some(token.to_string());
        }
        self
    }
}

/// Transport boundary between the ledger client and a ledger.
///
/// Implementations return the decoded JSON body of a successful response and
/// map any non-success status to [`crate::LedgerError::Transport`].
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn send(&self, request: LedgerRequest) -> LedgerResult<Value>;
}
