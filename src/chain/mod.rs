//! Chain client capability
//!
//! Everything the provisioning protocol needs from a chain: deploy bytecode,
//! read-only calls at a block, signed sends, confirmation waits and raw block
//! headers for genesis sync. Reads and headers need no key and live on
//! [`ChainReader`]; [`ChainClient`] adds the signing half. [`evm`] holds the
//! alloy-backed implementations; tests substitute in-memory chains.

pub mod evm;
pub mod factory;

use std::future::Future;

use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::primitives::{Address, Bytes, TxHash, B256};
use alloy::rpc::types::TransactionReceipt;
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ConfirmationPolicy;
use crate::error::ChainError;

pub use evm::{EvmChainClient, EvmChainReader};
pub use factory::{ChainConnector, ClientFactory, EvmConnector};

/// Block selector for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Genesis,
    Number(u64),
}

impl From<BlockTag> for BlockId {
    fn from(tag: BlockTag) -> Self {
        match tag {
            BlockTag::Latest => BlockId::Number(BlockNumberOrTag::Latest),
            BlockTag::Genesis => BlockId::Number(BlockNumberOrTag::Earliest),
            BlockTag::Number(n) => BlockId::Number(BlockNumberOrTag::Number(n)),
        }
    }
}

/// A block header as submitted to another chain's light client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSnapshot {
    pub number: u64,
    pub hash: B256,
    /// Serialized header as returned by the node.
    pub raw: Bytes,
    /// Consensus payload carried in the header (the relay chain puts its
    /// bookkeeper set here). Opaque to this crate.
    pub extra: Bytes,
}

/// Unauthenticated access to one endpoint.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// RPC endpoint, for error context.
    fn endpoint(&self) -> &str;

    async fn call(&self, target: Address, payload: Bytes, block: BlockTag)
        -> Result<Bytes, ChainError>;

    async fn header(&self, block: BlockTag) -> Result<HeaderSnapshot, ChainError>;
}

#[async_trait]
pub trait ChainClient: ChainReader {
    /// Address transactions are signed with.
    fn signer(&self) -> Address;

    /// Submit a contract creation and wait for it to confirm.
    async fn deploy(&self, code: Bytes) -> Result<(Address, TxHash), ChainError>;

    /// Submit a signed transaction without waiting for it.
    async fn send(&self, target: Address, payload: Bytes) -> Result<TxHash, ChainError>;

    /// Wait until `tx` is mined; a reverted transaction is an error.
    async fn wait_for_confirmation(&self, tx: TxHash) -> Result<(), ChainError>;
}

/// Execution status of a mined transaction.
pub trait ReceiptStatus {
    fn succeeded(&self) -> bool;
}

impl ReceiptStatus for TransactionReceipt {
    fn succeeded(&self) -> bool {
        self.status()
    }
}

impl ReceiptStatus for bool {
    fn succeeded(&self) -> bool {
        *self
    }
}

/// Poll `fetch` until it yields a receipt, the policy's timeout passes, or
/// `cancel` fires.
///
/// Query errors are logged and polling continues; only the timeout and the
/// token end the wait early. A receipt with a failed status is `Reverted`.
pub async fn await_receipt<R, F, Fut>(
    endpoint: &str,
    tx: TxHash,
    policy: &ConfirmationPolicy,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<R, ChainError>
where
    R: ReceiptStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<R>, ChainError>>,
{
    let started = Instant::now();
    let mut polls: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(ChainError::Cancelled { tx });
        }

        polls += 1;
        match fetch().await {
            Ok(Some(receipt)) => {
                if !receipt.succeeded() {
                    return Err(ChainError::Reverted {
                        endpoint: endpoint.to_string(),
                        tx,
                    });
                }
                debug!(endpoint = endpoint, tx = %tx, polls = polls, "Transaction confirmed");
                return Ok(receipt);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(endpoint = endpoint, tx = %tx, error = %e, "Receipt query failed, will retry");
            }
        }

        if let Some(timeout) = policy.timeout {
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ChainError::Timeout {
                    endpoint: endpoint.to_string(),
                    tx,
                    waited,
                });
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ChainError::Cancelled { tx }),
            _ = tokio::time::sleep(policy.poll_interval) => {}
        }
    }
}
