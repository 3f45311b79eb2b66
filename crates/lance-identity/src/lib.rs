//! Identity registry for CantonLance.
//!
//! Combines the immutable preset identities with identities allocated at
//! runtime. Dynamic identities are scoped to one environment, persisted as a
//! whole list per environment, and re-registered into the active ledger
//! client whenever that environment is activated.
//!
//! - [`IdentityRegistry`] — the authoritative id → [`lance_types::Party`] map
//! - [`IdentityStore`] — persistence boundary, with [`JsonFileIdentityStore`]
//!   and [`MemoryIdentityStore`]

pub mod error;
pub mod registry;
pub mod store;

pub use error::{IdentityError, IdentityResult};
pub use registry::IdentityRegistry;
pub use store::{IdentityStore, JsonFileIdentityStore, MemoryIdentityStore, StoredIdentity};
