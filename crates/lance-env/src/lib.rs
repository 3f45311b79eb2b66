//! Environment registry for CantonLance.
//!
//! An environment is one ledger deployment: an endpoint, per-identity
//! credentials, and deployment metadata. The registry discovers which
//! environments have a configuration on disk and otherwise stays passive;
//! it never talks to a ledger.

pub mod config;
pub mod error;
pub mod registry;
pub mod settings;

pub use config::{EnvironmentConfig, EnvironmentKey};
pub use error::{EnvError, EnvResult};
pub use registry::EnvironmentRegistry;
pub use settings::SessionSettings;
