//! Cross-chain bridge provisioning
//!
//! Deploys the bridge contracts on a source and a target chain, wires them
//! together, and exchanges genesis headers through a relay chain. Work is
//! split into named operations run in sequence by [`runner::run`]; each
//! operation is idempotent where the chain lets it be and records every
//! deployed address in the [`state::StateStore`] as soon as it exists.
//!
//! ## Modules
//!
//! - `state`: provisioning record and its atomic file store
//! - `vault`: signing keys from raw hex or passphrase-protected keystores
//! - `chain`: chain client capability, alloy implementation, client factory
//! - `contracts`: Solidity interfaces and forge artifact loading
//! - `protocol`: deploy, bind and submit step shapes
//! - `operations`: the operation catalogue
//! - `runner`: registry and batch execution

pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod hash;
pub mod operations;
pub mod protocol;
pub mod redact;
pub mod runner;
pub mod state;
pub mod vault;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{
    BlockTag, ChainClient, ChainConnector, ChainReader, ClientFactory, HeaderSnapshot,
};
pub use config::{CachePolicy, ConfirmationPolicy, RuntimeConfig};
pub use error::{
    ChainError, ConfigError, CredentialError, OperationError, PersistenceError, RegistryError,
};
pub use operations::{registry, Provisioner};
pub use runner::{OperationKind, Outcome, Registry, RunReport};
pub use state::{ProvisioningState, Role, Side, StateStore};
pub use vault::{CredentialRecord, CredentialRole, Vault};
