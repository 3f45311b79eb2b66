//! Persistence for dynamically allocated identities.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use lance_env::EnvironmentKey;
use lance_types::{Party, PartyCredential};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{IdentityError, IdentityResult};

/// A dynamic identity together with the credential it acts with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    pub party: Party,
    pub credential: PartyCredential,
}

/// Storage backend for dynamic identities, one list per environment.
///
/// `save` replaces the whole list for the environment.
pub trait IdentityStore: Send + Sync {
    /// Returns an empty list if nothing was stored for `env`.
    fn load(&self, env: EnvironmentKey) -> IdentityResult<Vec<StoredIdentity>>;

    fn save(&self, env: EnvironmentKey, identities: &[StoredIdentity]) -> IdentityResult<()>;
}

/// One `identities-<env>.json` file per environment under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileIdentityStore {
    dir: PathBuf,
}

impl JsonFileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, env: EnvironmentKey) -> PathBuf {
        self.dir.join(format!("identities-{env}.json"))
    }
}

impl IdentityStore for JsonFileIdentityStore {
    fn load(&self, env: EnvironmentKey) -> IdentityResult<Vec<StoredIdentity>> {
        let path = self.path_for(env);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map_err(|e| IdentityError::Store(format!("{}: {e}", path.display())))
    }

    fn save(&self, env: EnvironmentKey, identities: &[StoredIdentity]) -> IdentityResult<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(identities)
            .map_err(|e| IdentityError::Store(e.to_string()))?;

        // Write beside the target, then rename over it.
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(env))
            .map_err(|e| IdentityError::Io(e.error))?;
        Ok(())
    }
}

/// Ephemeral store for tests and sessions that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    lists: RwLock<HashMap<EnvironmentKey, Vec<StoredIdentity>>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self, env: EnvironmentKey) -> IdentityResult<Vec<StoredIdentity>> {
        let lists = self
            .lists
            .read()
            .map_err(|e| IdentityError::Store(format!("lock poisoned: {e}")))?;
        Ok(lists.get(&env).cloned().unwrap_or_default())
    }

    fn save(&self, env: EnvironmentKey, identities: &[StoredIdentity]) -> IdentityResult<()> {
        let mut lists = self
            .lists
            .write()
            .map_err(|e| IdentityError::Store(format!("lock poisoned: {e}")))?;
        lists.insert(env, identities.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lance_types::RoleCategory;

    fn identity(id: &str) -> StoredIdentity {
        StoredIdentity {
            party: Party::dynamic(id, format!("Freelancer_Ravi_{id}"), "Ravi Kumar", RoleCategory::Freelancer),
            credential: PartyCredential::new(format!("Freelancer_Ravi_{id}::1220ff"), id, ""),
        }
    }

    #[test]
    fn file_store_round_trips_per_environment() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileIdentityStore::new(dir.path().join("data"));
        assert!(store.load(EnvironmentKey::Local).unwrap().is_empty());

        store
            .save(EnvironmentKey::Local, &[identity("user-1"), identity("user-2")])
            .unwrap();
        let loaded = store.load(EnvironmentKey::Local).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].party.id, "user-2");
        assert!(store.load(EnvironmentKey::Devnet).unwrap().is_empty());
        assert!(store.path_for(EnvironmentKey::Local).ends_with("identities-local.json"));
    }

    #[test]
    fn file_store_replaces_whole_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileIdentityStore::new(dir.path());
        store.save(EnvironmentKey::Local, &[identity("user-1")]).unwrap();
        store.save(EnvironmentKey::Local, &[identity("user-9")]).unwrap();
        let loaded = store.load(EnvironmentKey::Local).unwrap();
        assert_eq!(loaded, vec![identity("user-9")]);
    }

    #[test]
    fn corrupt_file_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileIdentityStore::new(dir.path());
        fs::write(store.path_for(EnvironmentKey::Local), "[{").unwrap();
        assert!(matches!(
            store.load(EnvironmentKey::Local),
            Err(IdentityError::Store(_))
        ));
    }

    #[test]
    fn memory_store_scopes_by_environment() {
        let store = MemoryIdentityStore::new();
        store.save(EnvironmentKey::Devnet, &[identity("user-3")]).unwrap();
        assert!(store.load(EnvironmentKey::Local).unwrap().is_empty());
        assert_eq!(store.load(EnvironmentKey::Devnet).unwrap().len(), 1);
    }
}
