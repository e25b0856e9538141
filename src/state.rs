//! Provisioning state store
//!
//! A flat JSON record of endpoints, chain identifiers and the address bound to
//! every contract role. It is loaded once at startup and written back after
//! every mutation. Writes go through a temp file in the same directory that is
//! renamed over the target, so an interrupted run never leaves a truncated
//! record behind.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, OperationError, PersistenceError};

/// Default session cache file name, resolved next to the state file.
const DEFAULT_SESSION_CACHE: &str = "session-cache.json";

/// One of the two bridged chains. The relay chain is addressed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }

    /// The chain on the other end of the bridge.
    pub fn counterpart(&self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }

    pub fn eccd(&self) -> Role {
        match self {
            Side::Source => Role::SourceEccd,
            Side::Target => Role::TargetEccd,
        }
    }

    pub fn eccm(&self) -> Role {
        match self {
            Side::Source => Role::SourceEccm,
            Side::Target => Role::TargetEccm,
        }
    }

    pub fn ccmp(&self) -> Role {
        match self {
            Side::Source => Role::SourceCcmp,
            Side::Target => Role::TargetCcmp,
        }
    }

    pub fn nft_proxy(&self) -> Role {
        match self {
            Side::Source => Role::SourceNftProxy,
            Side::Target => Role::TargetNftProxy,
        }
    }

    pub fn nft_asset(&self) -> Role {
        match self {
            Side::Source => Role::SourceNftAsset,
            Side::Target => Role::TargetNftAsset,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named address slot in the provisioning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    TargetNativeAsset,
    TargetEccd,
    TargetEccm,
    TargetCcmp,
    TargetNativeWrapper,
    TargetNftProxy,
    TargetNftWrapper,
    TargetNftQuery,
    TargetNftAsset,
    SourceEccd,
    SourceEccm,
    SourceCcmp,
    SourceNativeAsset,
    SourceNativeProxy,
    SourceNftProxy,
    SourceNftAsset,
}

impl Role {
    pub const ALL: [Role; 16] = [
        Role::TargetNativeAsset,
        Role::TargetEccd,
        Role::TargetEccm,
        Role::TargetCcmp,
        Role::TargetNativeWrapper,
        Role::TargetNftProxy,
        Role::TargetNftWrapper,
        Role::TargetNftQuery,
        Role::TargetNftAsset,
        Role::SourceEccd,
        Role::SourceEccm,
        Role::SourceCcmp,
        Role::SourceNativeAsset,
        Role::SourceNativeProxy,
        Role::SourceNftProxy,
        Role::SourceNftAsset,
    ];

    /// Field name of this role in the state file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TargetNativeAsset => "target_native_asset",
            Role::TargetEccd => "target_eccd",
            Role::TargetEccm => "target_eccm",
            Role::TargetCcmp => "target_ccmp",
            Role::TargetNativeWrapper => "target_native_wrapper",
            Role::TargetNftProxy => "target_nft_proxy",
            Role::TargetNftWrapper => "target_nft_wrapper",
            Role::TargetNftQuery => "target_nft_query",
            Role::TargetNftAsset => "target_nft_asset",
            Role::SourceEccd => "source_eccd",
            Role::SourceEccm => "source_eccm",
            Role::SourceCcmp => "source_ccmp",
            Role::SourceNativeAsset => "source_native_asset",
            Role::SourceNativeProxy => "source_native_proxy",
            Role::SourceNftProxy => "source_nft_proxy",
            Role::SourceNftAsset => "source_nft_asset",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted provisioning record.
///
/// Every field defaults to its zero value so a partially filled file loads.
/// Field order here is the on-disk order. Keys this tool does not know are
/// kept in `extra` and written back after the known ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningState {
    pub session_cache: String,
    pub artifacts_dir: String,

    pub relay_rpc_url: String,
    pub relay_validator_keystores: Vec<String>,
    pub relay_side_chain_manager: Address,
    pub relay_header_sync: Address,

    pub target_rpc_url: String,
    pub target_admin_keystore: String,
    pub target_side_chain_id: u64,
    pub target_side_chain_name: String,
    pub target_native_asset: Address,
    pub target_eccd: Address,
    pub target_eccm: Address,
    pub target_ccmp: Address,
    pub target_native_wrapper: Address,
    pub target_nft_proxy: Address,
    pub target_nft_wrapper: Address,
    pub target_nft_query: Address,
    pub target_nft_asset: Address,

    pub source_rpc_url: String,
    pub source_admin_keystore: String,
    pub source_side_chain_id: u64,
    pub source_side_chain_name: String,
    pub source_eccd: Address,
    pub source_eccm: Address,
    pub source_ccmp: Address,
    pub source_native_asset: Address,
    pub source_native_proxy: Address,
    pub source_nft_proxy: Address,
    pub source_nft_asset: Address,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProvisioningState {
    /// Canonical on-disk encoding.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn address(&self, role: Role) -> Address {
        match role {
            Role::TargetNativeAsset => self.target_native_asset,
            Role::TargetEccd => self.target_eccd,
            Role::TargetEccm => self.target_eccm,
            Role::TargetCcmp => self.target_ccmp,
            Role::TargetNativeWrapper => self.target_native_wrapper,
            Role::TargetNftProxy => self.target_nft_proxy,
            Role::TargetNftWrapper => self.target_nft_wrapper,
            Role::TargetNftQuery => self.target_nft_query,
            Role::TargetNftAsset => self.target_nft_asset,
            Role::SourceEccd => self.source_eccd,
            Role::SourceEccm => self.source_eccm,
            Role::SourceCcmp => self.source_ccmp,
            Role::SourceNativeAsset => self.source_native_asset,
            Role::SourceNativeProxy => self.source_native_proxy,
            Role::SourceNftProxy => self.source_nft_proxy,
            Role::SourceNftAsset => self.source_nft_asset,
        }
    }

    pub fn set_address(&mut self, role: Role, address: Address) {
        let slot = match role {
            Role::TargetNativeAsset => &mut self.target_native_asset,
            Role::TargetEccd => &mut self.target_eccd,
            Role::TargetEccm => &mut self.target_eccm,
            Role::TargetCcmp => &mut self.target_ccmp,
            Role::TargetNativeWrapper => &mut self.target_native_wrapper,
            Role::TargetNftProxy => &mut self.target_nft_proxy,
            Role::TargetNftWrapper => &mut self.target_nft_wrapper,
            Role::TargetNftQuery => &mut self.target_nft_query,
            Role::TargetNftAsset => &mut self.target_nft_asset,
            Role::SourceEccd => &mut self.source_eccd,
            Role::SourceEccm => &mut self.source_eccm,
            Role::SourceCcmp => &mut self.source_ccmp,
            Role::SourceNativeAsset => &mut self.source_native_asset,
            Role::SourceNativeProxy => &mut self.source_native_proxy,
            Role::SourceNftProxy => &mut self.source_nft_proxy,
            Role::SourceNftAsset => &mut self.source_nft_asset,
        };
        *slot = address;
    }

    /// Address of `role`, or `MissingInput` when it was never provisioned.
    pub fn require(&self, role: Role) -> Result<Address, OperationError> {
        let address = self.address(role);
        if address == Address::ZERO {
            return Err(OperationError::MissingInput {
                field: role.as_str(),
            });
        }
        Ok(address)
    }

    pub fn rpc_url(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_rpc_url,
            Side::Target => &self.target_rpc_url,
        }
    }

    pub fn admin_keystore(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_admin_keystore,
            Side::Target => &self.target_admin_keystore,
        }
    }

    pub fn side_chain_name(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_side_chain_name,
            Side::Target => &self.target_side_chain_name,
        }
    }

    /// Cross-chain id of `side`, or `MissingInput` when unset.
    pub fn side_chain_id(&self, side: Side) -> Result<u64, OperationError> {
        let (id, field) = match side {
            Side::Source => (self.source_side_chain_id, "source_side_chain_id"),
            Side::Target => (self.target_side_chain_id, "target_side_chain_id"),
        };
        if id == 0 {
            return Err(OperationError::MissingInput { field });
        }
        Ok(id)
    }
}

/// Owns the in-memory record and its backing file.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: ProvisioningState,
    /// File text as loaded, until the first mutation.
    loaded: Option<String>,
}

impl StateStore {
    /// Load the record at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let state: ProvisioningState =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), "Provisioning state loaded");
        Ok(Self {
            path,
            state,
            loaded: Some(data),
        })
    }

    /// Wrap an existing record; nothing is written until the first save.
    pub fn new(path: impl AsRef<Path>, state: ProvisioningState) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state,
            loaded: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &ProvisioningState {
        &self.state
    }

    /// Overwrite the backing file with the full record. An unmodified store
    /// writes back exactly the text it was loaded from.
    pub fn save(&self) -> Result<(), PersistenceError> {
        if let Some(text) = &self.loaded {
            write_atomic(&self.path, text.as_bytes())?;
            debug!(path = %self.path.display(), "Provisioning state unchanged, original text kept");
            return Ok(());
        }

        let json = self
            .state
            .to_json()
            .map_err(|source| PersistenceError::Serialize {
                path: self.path.clone(),
                source,
            })?;
        write_atomic(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), "Provisioning state saved");
        Ok(())
    }

    /// Record `address` for `role` and save immediately.
    pub fn store(&mut self, role: Role, address: Address) -> Result<(), PersistenceError> {
        self.state.set_address(role, address);
        self.loaded = None;
        self.save()
    }

    /// Location of the durable passphrase cache.
    pub fn session_cache_path(&self) -> PathBuf {
        let configured = self.state.session_cache.trim();
        if !configured.is_empty() {
            return PathBuf::from(configured);
        }
        self.path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(DEFAULT_SESSION_CACHE)
    }
}

/// Write `bytes` to `path` through a synced temp file renamed into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    temp_file.write_all(bytes).map_err(io_err)?;
    temp_file.as_file().sync_all().map_err(io_err)?;
    temp_file.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
