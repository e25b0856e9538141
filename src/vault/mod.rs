//! Credential vault
//!
//! Turns a keystore path into a signing key. A file holding at most 64 hex
//! characters (after trimming whitespace and an optional `0x`) is a raw
//! private key. Anything longer is a Web3 secret-storage keystore, opened with
//! a cached passphrase, the empty passphrase, or one typed at the prompt, in
//! that order.

pub mod cache;
pub mod prompt;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use tracing::{debug, info, warn};

use crate::config::CachePolicy;
use crate::error::CredentialError;
use crate::hash::KeyHash;
use crate::redact::Passphrase;

pub use cache::{DisabledSessionCache, FileSessionCache, MemorySessionCache, SessionCache};
pub use prompt::{PassphrasePrompt, ScriptedPrompt, TerminalPrompt};

/// Upper bound on interactive passphrase attempts per keystore.
pub const MAX_PASSPHRASE_ATTEMPTS: u32 = 20;

/// Longest hex string still treated as a raw private key.
const RAW_KEY_HEX_LEN: usize = 64;

/// Which identity a credential signs for. Scopes session cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialRole {
    SourceAdmin,
    TargetAdmin,
    RelayValidator,
}

impl CredentialRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialRole::SourceAdmin => "source-admin",
            CredentialRole::TargetAdmin => "target-admin",
            CredentialRole::RelayValidator => "relay-validator",
        }
    }
}

impl fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key file and the role it is used for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub path: PathBuf,
    pub role: CredentialRole,
}

impl CredentialRecord {
    pub fn new(path: impl Into<PathBuf>, role: CredentialRole) -> Self {
        Self {
            path: path.into(),
            role,
        }
    }
}

/// Keystore decryption.
pub trait KeyDecryptor: Send + Sync {
    fn decrypt(&self, path: &Path, passphrase: &str) -> eyre::Result<PrivateKeySigner>;
}

/// Web3 secret-storage decryption through alloy.
pub struct KeystoreDecryptor;

impl KeyDecryptor for KeystoreDecryptor {
    fn decrypt(&self, path: &Path, passphrase: &str) -> eyre::Result<PrivateKeySigner> {
        Ok(PrivateKeySigner::decrypt_keystore(path, passphrase)?)
    }
}

pub struct Vault {
    decryptor: Arc<dyn KeyDecryptor>,
    prompt: Arc<dyn PassphrasePrompt>,
    cache: Arc<dyn SessionCache>,
}

impl Vault {
    pub fn new(
        decryptor: Arc<dyn KeyDecryptor>,
        prompt: Arc<dyn PassphrasePrompt>,
        cache: Arc<dyn SessionCache>,
    ) -> Self {
        Self {
            decryptor,
            prompt,
            cache,
        }
    }

    /// Interactive vault with the cache selected by `policy`.
    pub fn interactive(policy: CachePolicy, cache_path: &Path) -> Self {
        let cache: Arc<dyn SessionCache> = match policy {
            CachePolicy::Persist => {
                warn!(
                    path = %cache_path.display(),
                    "Keystore passphrases are cached in plaintext on disk; set DEPLOYER_PASSPHRASE_CACHE=session or off to avoid this"
                );
                Arc::new(FileSessionCache::open(cache_path))
            }
            CachePolicy::Session => Arc::new(MemorySessionCache::new()),
            CachePolicy::Disabled => Arc::new(DisabledSessionCache),
        };
        Self::new(Arc::new(KeystoreDecryptor), Arc::new(TerminalPrompt), cache)
    }

    /// Resolve a credential into a signer.
    pub fn resolve(&self, record: &CredentialRecord) -> Result<PrivateKeySigner, CredentialError> {
        let path = record.path.as_path();
        let data = std::fs::read(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(signer) = parse_raw_key(&data, path)? {
            debug!(path = %path.display(), role = %record.role, "Loaded raw private key");
            return Ok(signer);
        }

        ensure_keystore(&data, path)?;
        self.unlock(record)
    }

    fn unlock(&self, record: &CredentialRecord) -> Result<PrivateKeySigner, CredentialError> {
        let path = record.path.as_path();
        let hash = KeyHash::of_path(&path.to_string_lossy());

        if let Some(cached) = self.cache.get(record.role, &hash) {
            match self.decryptor.decrypt(path, cached.expose()) {
                Ok(signer) => {
                    debug!(path = %path.display(), role = %record.role, "Unlocked keystore with cached passphrase");
                    return Ok(signer);
                }
                Err(e) => {
                    warn!(path = %path.display(), role = %record.role, error = %e, "Cached passphrase rejected, prompting");
                }
            }
        }

        if let Ok(signer) = self.decryptor.decrypt(path, "") {
            debug!(path = %path.display(), "Keystore has no passphrase");
            self.remember(record, hash, Passphrase::default());
            return Ok(signer);
        }

        for attempt in 1..=MAX_PASSPHRASE_ATTEMPTS {
            let message = format!(
                "Passphrase for {} ({}) [{}/{}]: ",
                path.display(),
                record.role,
                attempt,
                MAX_PASSPHRASE_ATTEMPTS
            );
            let passphrase = match self.prompt.read_passphrase(&message) {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %path.display(), attempt = attempt, error = %e, "Failed to read passphrase");
                    continue;
                }
            };

            match self.decryptor.decrypt(path, passphrase.expose()) {
                Ok(signer) => {
                    info!(path = %path.display(), role = %record.role, address = %signer.address(), "Keystore unlocked");
                    self.remember(record, hash, passphrase);
                    return Ok(signer);
                }
                Err(e) => {
                    warn!(path = %path.display(), attempt = attempt, error = %e, "Wrong passphrase");
                }
            }
        }

        Err(CredentialError::AttemptsExhausted {
            path: path.to_path_buf(),
            attempts: MAX_PASSPHRASE_ATTEMPTS,
        })
    }

    fn remember(&self, record: &CredentialRecord, hash: KeyHash, passphrase: Passphrase) {
        if let Err(e) = self.cache.put(record.role, hash, passphrase) {
            warn!(path = %record.path.display(), error = %e, "Failed to cache passphrase");
        }
    }
}

/// `Some(signer)` when `data` is a raw hex key, `None` when it is too long to
/// be one.
fn parse_raw_key(data: &[u8], path: &Path) -> Result<Option<PrivateKeySigner>, CredentialError> {
    let text = String::from_utf8_lossy(data);
    let trimmed = text.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() > RAW_KEY_HEX_LEN {
        return Ok(None);
    }

    let malformed = |reason: String| CredentialError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    if hex_part.len() != RAW_KEY_HEX_LEN {
        return Err(malformed(format!(
            "raw key must be {RAW_KEY_HEX_LEN} hex characters, found {}",
            hex_part.len()
        )));
    }

    hex_part
        .parse::<PrivateKeySigner>()
        .map(Some)
        .map_err(|e| malformed(e.to_string()))
}

/// Reject files that cannot be keystores before spending prompts on them.
fn ensure_keystore(data: &[u8], path: &Path) -> Result<(), CredentialError> {
    let value: serde_json::Value =
        serde_json::from_slice(data).map_err(|e| CredentialError::Malformed {
            path: path.to_path_buf(),
            reason: format!("neither a raw key nor keystore JSON: {e}"),
        })?;

    if value.get("crypto").is_none() && value.get("Crypto").is_none() {
        return Err(CredentialError::Malformed {
            path: path.to_path_buf(),
            reason: "keystore JSON has no crypto section".to_string(),
        });
    }
    Ok(())
}
