//! JSON Ledger API v2 paths used by the client.

pub const LEDGER_END: &str = "/v2/state/ledger-end";
pub const ACTIVE_CONTRACTS: &str = "/v2/state/active-contracts";
pub const SUBMIT_AND_WAIT: &str = "/v2/commands/submit-and-wait";
pub const SUBMIT_AND_WAIT_FOR_TRANSACTION: &str = "/v2/commands/submit-and-wait-for-transaction";
pub const PACKAGES: &str = "/v2/packages";
pub const PARTIES: &str = "/v2/parties";
pub const USERS: &str = "/v2/users";
