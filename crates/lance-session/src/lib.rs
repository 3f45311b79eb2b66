//! Workflow orchestration for CantonLance.
//!
//! A [`Session`] ties the environment registry, the identity registry, and one
//! [`lance_ledger::LedgerClient`] per environment together. Callers invoke
//! workflow operations on it and re-read [`Session::snapshot`] afterwards;
//! the snapshot only ever holds what the ledger returned for the active
//! identity.

pub mod activity;
pub mod connector;
pub mod error;
pub mod inflight;
pub mod session;

pub use activity::{Activity, Notice, NoticeLevel};
pub use connector::{HttpConnector, LedgerConnector, SandboxConnector};
pub use error::{SessionError, SessionResult};
pub use inflight::{InFlight, InFlightGuard};
pub use session::{Session, ViewContext, DEFAULT_IDENTITY};
