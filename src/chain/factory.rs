//! Signer-bound chain clients, built on first use
//!
//! The factory resolves each identity through the vault once and keeps the
//! resulting client for the rest of the run, so a keystore prompts at most
//! once per process. A failed resolution is not remembered; the next
//! operation that needs the identity tries again. Relay validators are
//! unlocked in order and only as far as the caller needs, and reads that need
//! no key go through keyless readers.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ConfirmationPolicy;
use crate::error::{ChainError, CredentialError, OperationError};
use crate::state::{ProvisioningState, Side};
use crate::vault::{CredentialRecord, CredentialRole, Vault};

use super::{ChainClient, ChainReader, EvmChainClient, EvmChainReader};

/// Opens clients for an endpoint.
pub trait ChainConnector: Send + Sync {
    /// Client signing with a resolved key.
    fn connect(
        &self,
        endpoint: &str,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn ChainClient>, ChainError>;

    /// Keyless access for calls and headers.
    fn reader(&self, endpoint: &str) -> Result<Arc<dyn ChainReader>, ChainError>;
}

pub struct EvmConnector {
    confirmation: ConfirmationPolicy,
    cancel: CancellationToken,
}

impl EvmConnector {
    pub fn new(confirmation: ConfirmationPolicy, cancel: CancellationToken) -> Self {
        Self {
            confirmation,
            cancel,
        }
    }
}

impl ChainConnector for EvmConnector {
    fn connect(
        &self,
        endpoint: &str,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn ChainClient>, ChainError> {
        let client =
            EvmChainClient::new(endpoint, signer, self.confirmation, self.cancel.clone())?;
        Ok(Arc::new(client))
    }

    fn reader(&self, endpoint: &str) -> Result<Arc<dyn ChainReader>, ChainError> {
        Ok(Arc::new(EvmChainReader::new(endpoint)?))
    }
}

pub struct ClientFactory {
    vault: Vault,
    connector: Arc<dyn ChainConnector>,
    admins: HashMap<Side, Arc<dyn ChainClient>>,
    /// Resolved prefix of the configured validator list.
    validators: Vec<Arc<dyn ChainClient>>,
    readers: HashMap<String, Arc<dyn ChainReader>>,
}

impl ClientFactory {
    pub fn new(vault: Vault, connector: Arc<dyn ChainConnector>) -> Self {
        Self {
            vault,
            connector,
            admins: HashMap::new(),
            validators: Vec::new(),
            readers: HashMap::new(),
        }
    }

    /// Client signing as the admin of `side`.
    pub fn admin(
        &mut self,
        state: &ProvisioningState,
        side: Side,
    ) -> Result<Arc<dyn ChainClient>, OperationError> {
        if let Some(client) = self.admins.get(&side) {
            return Ok(client.clone());
        }

        let (url_field, key_field, role) = match side {
            Side::Source => (
                "source_rpc_url",
                "source_admin_keystore",
                CredentialRole::SourceAdmin,
            ),
            Side::Target => (
                "target_rpc_url",
                "target_admin_keystore",
                CredentialRole::TargetAdmin,
            ),
        };
        let endpoint = non_empty(state.rpc_url(side), url_field)?;
        let keystore = non_empty(state.admin_keystore(side), key_field)?;

        let signer = self.resolve(&CredentialRecord::new(keystore, role))?;
        let client = self.connector.connect(endpoint, signer)?;
        info!(side = %side, endpoint = %endpoint, signer = %client.signer(), "Admin client ready");

        self.admins.insert(side, client.clone());
        Ok(client)
    }

    /// One client per relay validator, in configured order.
    pub fn relay_validators(
        &mut self,
        state: &ProvisioningState,
    ) -> Result<Vec<Arc<dyn ChainClient>>, OperationError> {
        self.resolve_validators(state, state.relay_validator_keystores.len())?;
        Ok(self.validators.clone())
    }

    /// Client for relay chain transactions sent once; signs as the first
    /// validator and leaves the others locked.
    pub fn relay(
        &mut self,
        state: &ProvisioningState,
    ) -> Result<Arc<dyn ChainClient>, OperationError> {
        self.resolve_validators(state, 1)?;
        self.validators
            .first()
            .cloned()
            .ok_or(OperationError::MissingInput {
                field: "relay_validator_keystores",
            })
    }

    /// Keyless access to the chain on `side`.
    pub fn side_reader(
        &mut self,
        state: &ProvisioningState,
        side: Side,
    ) -> Result<Arc<dyn ChainReader>, OperationError> {
        let field = match side {
            Side::Source => "source_rpc_url",
            Side::Target => "target_rpc_url",
        };
        let endpoint = non_empty(state.rpc_url(side), field)?;
        self.reader(endpoint)
    }

    /// Keyless access to the relay chain.
    pub fn relay_reader(
        &mut self,
        state: &ProvisioningState,
    ) -> Result<Arc<dyn ChainReader>, OperationError> {
        let endpoint = non_empty(&state.relay_rpc_url, "relay_rpc_url")?;
        self.reader(endpoint)
    }

    fn reader(&mut self, endpoint: &str) -> Result<Arc<dyn ChainReader>, OperationError> {
        if let Some(reader) = self.readers.get(endpoint) {
            return Ok(reader.clone());
        }
        let reader = self.connector.reader(endpoint)?;
        self.readers.insert(endpoint.to_string(), reader.clone());
        Ok(reader)
    }

    /// Unlock validators in configured order until `wanted` are available.
    fn resolve_validators(
        &mut self,
        state: &ProvisioningState,
        wanted: usize,
    ) -> Result<(), OperationError> {
        let endpoint = non_empty(&state.relay_rpc_url, "relay_rpc_url")?;
        let keystores = &state.relay_validator_keystores;
        if keystores.is_empty() {
            return Err(OperationError::MissingInput {
                field: "relay_validator_keystores",
            });
        }

        for keystore in keystores.iter().take(wanted).skip(self.validators.len()) {
            let signer = self.resolve(&CredentialRecord::new(
                keystore,
                CredentialRole::RelayValidator,
            ))?;
            let client = self.connector.connect(endpoint, signer)?;
            info!(endpoint = %endpoint, index = self.validators.len(), signer = %client.signer(), "Relay validator client ready");
            self.validators.push(client);
        }
        Ok(())
    }

    fn resolve(&self, record: &CredentialRecord) -> Result<PrivateKeySigner, CredentialError> {
        let vault = &self.vault;
        blocking(|| vault.resolve(record))
    }
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, OperationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OperationError::MissingInput { field });
    }
    Ok(trimmed)
}

/// Run a call that may sit on a terminal prompt. On the multi-threaded
/// runtime the worker is handed off first so timers keep running.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
