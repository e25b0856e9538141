//! Error types for the deployer
//!
//! Each layer has its own enum; `OperationError` is what a provisioning
//! operation returns and what the runner inspects to decide whether the batch
//! may continue.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use thiserror::Error;

/// The state file could not be read or parsed. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A local durable write (state file or session cache) failed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key resolution failed for one identity.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to read credential {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed key material in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("no valid passphrase for {path} after {attempts} attempts")]
    AttemptsExhausted { path: PathBuf, attempts: u32 },
}

/// Transport, call or confirmation failure against one chain endpoint.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("rpc error at {endpoint}: {message}")]
    Rpc { endpoint: String, message: String },

    #[error("transaction {tx} reverted at {endpoint}")]
    Reverted { endpoint: String, tx: TxHash },

    #[error("transaction {tx} not confirmed at {endpoint} after {waited:?}")]
    Timeout {
        endpoint: String,
        tx: TxHash,
        waited: Duration,
    },

    #[error("wait for transaction {tx} cancelled")]
    Cancelled { tx: TxHash },

    #[error("deployment {tx} at {endpoint} produced no contract address")]
    MissingContractAddress { endpoint: String, tx: TxHash },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },
}

impl ChainError {
    pub fn rpc(endpoint: &str, err: impl std::fmt::Display) -> Self {
        Self::Rpc {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

/// Failure of a single provisioning operation.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("{label}: expected {expected}, got {actual}")]
    StateMismatch {
        label: String,
        expected: Address,
        actual: Address,
    },

    #[error("state field `{field}` is not set")]
    MissingInput { field: &'static str },

    #[error("contract artifact {contract}: {reason}")]
    Artifact { contract: String, reason: String },
}

/// The operation table was built inconsistently.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation `{0}` is already registered")]
    Duplicate(String),
}

impl OperationError {
    /// Errors after which later operations would run against stale local
    /// state or an abandoned run.
    pub fn halts_batch(&self) -> bool {
        matches!(
            self,
            OperationError::Persistence(_) | OperationError::Chain(ChainError::Cancelled { .. })
        )
    }
}
