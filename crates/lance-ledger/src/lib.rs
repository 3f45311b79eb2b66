//! Ledger client for CantonLance.
//!
//! This crate is the only point of contact with the external ledger. It
//! provides:
//! - The [`LedgerTransport`] boundary and its reqwest-backed [`HttpTransport`]
//! - Command envelope construction for every workflow intent
//! - Decoding of active-contract queries into [`lance_types::VisibleState`]
//! - [`LedgerClient`], which ties the above together per environment
//! - [`ApiCallLog`], a capped most-recent-first record of every wire call
//! - [`SandboxLedger`], an in-process ledger for tests, local demos, and embedding
//!
//! Privacy filtering is performed by the ledger, never here: a query returns
//! exactly what the requesting party is allowed to see.

pub mod api_log;
pub mod client;
pub mod commands;
pub mod decode;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod sandbox;
pub mod transport;

pub use api_log::{ApiCall, ApiCallLog, API_LOG_CAPACITY};
pub use client::{AuditTotals, LedgerClient, LedgerClientConfig, SubmitOutcome, ADMIN_IDENTITY};
pub use commands::{Choice, CommandIds, LedgerCommand, Template, TEMPLATE_MODULE};
pub use decode::{decode_active_contracts, DecodedSnapshot};
pub use error::{DecodeError, LedgerError, LedgerResult};
pub use http::HttpTransport;
pub use sandbox::SandboxLedger;
pub use transport::{HttpMethod, LedgerRequest, LedgerTransport};
