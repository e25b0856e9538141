//! Passphrase session cache
//!
//! Remembers passphrases that successfully decrypted a keystore, keyed by the
//! credential role and the keystore's [`KeyHash`]. Entries are only written
//! after a successful decryption and are never trusted blindly: the vault
//! re-verifies every cached passphrase and falls back to prompting.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::hash::KeyHash;
use crate::redact::Passphrase;
use crate::state::write_atomic;

use super::CredentialRole;

pub trait SessionCache: Send + Sync {
    fn get(&self, role: CredentialRole, hash: &KeyHash) -> Option<Passphrase>;

    fn put(
        &self,
        role: CredentialRole,
        hash: KeyHash,
        passphrase: Passphrase,
    ) -> Result<(), PersistenceError>;
}

fn entry_key(role: CredentialRole, hash: &KeyHash) -> String {
    format!("{}:{}", role.as_str(), hash.to_hex())
}

/// Durable cache stored as a JSON object of `"<role>:<hash>" -> passphrase`.
///
/// Passphrases are stored in plaintext with no expiry. The file is replaced
/// atomically on every write; on Unix the temp file is created owner-only and
/// that mode carries over to the renamed file.
pub struct FileSessionCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileSessionCache {
    /// Open the cache at `path`. A missing file is an empty cache; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Session cache is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Session cache unreadable, starting empty");
                BTreeMap::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "Session cache opened");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionCache for FileSessionCache {
    fn get(&self, role: CredentialRole, hash: &KeyHash) -> Option<Passphrase> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&entry_key(role, hash))
            .map(|p| Passphrase::new(p.clone()))
    }

    fn put(
        &self,
        role: CredentialRole,
        hash: KeyHash,
        passphrase: Passphrase,
    ) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(entry_key(role, &hash), passphrase.into_inner());

        let mut json =
            serde_json::to_string_pretty(&*entries).map_err(|source| PersistenceError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Cache that lives as long as the process.
#[derive(Default)]
pub struct MemorySessionCache {
    entries: Mutex<HashMap<(CredentialRole, KeyHash), Passphrase>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, role: CredentialRole, hash: &KeyHash) -> Option<Passphrase> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&(role, *hash)).cloned()
    }

    fn put(
        &self,
        role: CredentialRole,
        hash: KeyHash,
        passphrase: Passphrase,
    ) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert((role, hash), passphrase);
        Ok(())
    }
}

/// Remembers nothing.
pub struct DisabledSessionCache;

impl SessionCache for DisabledSessionCache {
    fn get(&self, _role: CredentialRole, _hash: &KeyHash) -> Option<Passphrase> {
        None
    }

    fn put(
        &self,
        _role: CredentialRole,
        _hash: KeyHash,
        _passphrase: Passphrase,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
}
