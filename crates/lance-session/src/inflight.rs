//! Keyed in-flight operations.
//!
//! Each workflow operation holds a loading key such as `createProposal` or
//! `approveMilestone:<contract>` for as long as it runs. A second attempt on
//! the same key fails fast instead of double-submitting.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::error::{SessionError, SessionResult};

pub const CREATE_PROPOSAL: &str = "createProposal";
pub const GENERATE_AUDIT: &str = "generateAudit";
pub const CREATE_ACCOUNT: &str = "createAccount";

/// Loading key scoped to one contract.
pub fn contract_key(operation: &str, contract: &str) -> String {
    format!("{operation}:{contract}")
}

#[derive(Debug, Default, Clone)]
pub struct InFlight {
    keys: Arc<Mutex<BTreeSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or fail with [`SessionError::Busy`] if it is held.
    pub fn acquire(&self, key: impl Into<String>) -> SessionResult<InFlightGuard> {
        let key = key.into();
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        if !keys.insert(key.clone()) {
            return Err(SessionError::Busy(key));
        }
        Ok(InFlightGuard {
            keys: self.keys.clone(),
            key,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).contains(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

/// Releases its key on drop, whichever way the operation ended.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<BTreeSet<String>>>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
