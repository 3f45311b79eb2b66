use std::sync::{Arc, RwLock};

use lance_env::{EnvironmentConfig, EnvironmentKey};
use lance_ledger::LedgerClient;
use lance_types::{preset_parties, Party, PartyCredential, RoleCategory};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{IdentityError, IdentityResult};
use crate::store::{IdentityStore, MemoryIdentityStore, StoredIdentity};

#[derive(Debug, Default)]
struct ActiveIdentities {
    env: Option<EnvironmentKey>,
    dynamic: Vec<StoredIdentity>,
}

/// The authoritative map from identity id to [`Party`].
///
/// Presets come first and never change; dynamic identities belong to the
/// environment most recently passed to [`IdentityRegistry::activate`].
pub struct IdentityRegistry {
    presets: Vec<Party>,
    store: Arc<dyn IdentityStore>,
    active: RwLock<ActiveIdentities>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self::with_presets(store, preset_parties())
    }

    /// A registry over a custom preset roster.
    pub fn with_presets(store: Arc<dyn IdentityStore>, presets: Vec<Party>) -> Self {
        Self {
            presets,
            store,
            active: RwLock::new(ActiveIdentities::default()),
        }
    }

    /// A registry whose dynamic identities live only in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryIdentityStore::new()))
    }

    pub fn active_environment(&self) -> Option<EnvironmentKey> {
        self.read().env
    }

    /// Load the dynamic identities of `env` and register their credentials
    /// into `client`. Returns how many were loaded.
    pub fn activate(&self, env: EnvironmentKey, client: &LedgerClient) -> IdentityResult<usize> {
        let mut loaded = self.store.load(env)?;
        loaded.retain(|stored| {
            let clash = self.presets.iter().any(|p| p.id == stored.party.id);
            if clash {
                warn!(id = %stored.party.id, "stored identity shadows a preset; ignoring");
            }
            !clash
        });

        for stored in &loaded {
            client.register_credential(&stored.party.id, stored.credential.clone());
        }

        let count = loaded.len();
        let mut active = self.write();
        active.env = Some(env);
        active.dynamic = loaded;
        info!(environment = %env, dynamic = count, "identities activated");
        Ok(count)
    }

    /// Allocate a new identity on the ledger and record it.
    ///
    /// Only sandbox environments allow this; the check happens before any
    /// ledger call. If the user cannot be created after the party was
    /// allocated, the party is left orphaned on the ledger and reported as
    /// [`IdentityError::OrphanedParty`]; nothing is recorded locally.
    pub async fn allocate(
        &self,
        display_name: &str,
        role: RoleCategory,
        config: &EnvironmentConfig,
        client: &LedgerClient,
    ) -> IdentityResult<Party> {
        if !config.is_sandbox() {
            return Err(IdentityError::Policy(format!(
                "account creation is only available on the local sandbox, not {}",
                config.mode.display_name()
            )));
        }
        let name = display_name.trim();
        if name.is_empty() {
            return Err(IdentityError::InvalidName(display_name.to_string()));
        }
        let env = self.active_environment().ok_or(IdentityError::Inactive)?;

        let hint = party_hint(name, role);
        let party_id = client.allocate_party(&hint).await?;

        let user_id = format!("user-{}", random_hex(8));
        if let Err(source) = client.create_user(&user_id, &party_id).await {
            warn!(party = %party_id, error = %source, "user creation failed; party is orphaned");
            return Err(IdentityError::OrphanedParty {
                party: party_id,
                source,
            });
        }

        let credential = PartyCredential::new(party_id, user_id.clone(), "");
        client.register_credential(&user_id, credential.clone());

        let party = Party::dynamic(user_id, hint, name, role);
        let stored = StoredIdentity {
            party: party.clone(),
            credential,
        };
        self.record(env, stored)?;
        info!(id = %party.id, role = %role, "allocated identity");
        Ok(party)
    }

    // Persist first so a failed save leaves the in-memory map unchanged.
    fn record(&self, env: EnvironmentKey, stored: StoredIdentity) -> IdentityResult<()> {
        let mut active = self.write();
        if active.env == Some(env) {
            let mut next = active.dynamic.clone();
            next.push(stored);
            self.store.save(env, &next)?;
            active.dynamic = next;
        } else {
            // The session switched away while the allocation was in flight.
            drop(active);
            let mut list = self.store.load(env)?;
            list.push(stored);
            self.store.save(env, &list)?;
        }
        Ok(())
    }

    /// Map a ledger-native party id (`<name>::<fingerprint>`) back to a
    /// known identity. The name segment must match `raw_ledger_name`
    /// exactly, so one name being a prefix of another cannot collide.
    pub fn resolve_ledger_party(&self, native_id: &str) -> Option<Party> {
        let name = native_id.split("::").next().unwrap_or(native_id);
        if name.is_empty() {
            return None;
        }
        self.all().into_iter().find(|p| p.raw_ledger_name == name)
    }

    /// Presets followed by the active environment's dynamic identities.
    pub fn all(&self) -> Vec<Party> {
        let active = self.read();
        self.presets
            .iter()
            .cloned()
            .chain(active.dynamic.iter().map(|s| s.party.clone()))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Party> {
        if let Some(p) = self.presets.iter().find(|p| p.id == id) {
            return Some(p.clone());
        }
        self.read()
            .dynamic
            .iter()
            .find(|s| s.party.id == id)
            .map(|s| s.party.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn first_with_role(&self, role: RoleCategory) -> Option<Party> {
        self.all().into_iter().find(|p| p.role == role)
    }

    pub fn presets(&self) -> &[Party] {
        &self.presets
    }

    pub fn dynamic(&self) -> Vec<Party> {
        self.read().dynamic.iter().map(|s| s.party.clone()).collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ActiveIdentities> {
        self.active.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ActiveIdentities> {
        self.active.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// `<Role>_<AlphanumericName>_<6 hex>`, e.g. `Freelancer_RaviKumar_3fa9c1`.
fn party_hint(name: &str, role: RoleCategory) -> String {
    let compact: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
    let compact = if compact.is_empty() { "User".to_string() } else { compact };
    format!("{role}_{compact}_{}", random_hex(6))
}

// The tail of a v7 uuid is random; the head is a timestamp.
fn random_hex(len: usize) -> String {
    let simple = Uuid::now_v7().simple().to_string();
    simple[simple.len() - len..].to_string()
}
