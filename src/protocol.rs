//! Provisioning steps
//!
//! Three shapes, kept separate on purpose:
//!
//! - **deploy**: create a contract and record its address. No pre-check, so
//!   every run creates a fresh instance and the role moves to it.
//! - **bind**: read a setting, write it only when it differs, read it back.
//!   Re-running a completed bind sends nothing.
//! - **submit**: send one transaction and wait for it. Used for relay chain
//!   registration and genesis header hand-off, which expose no read-back.

use alloy::primitives::{Address, Bytes, TxHash};
use tracing::{debug, info, warn};

use crate::chain::{BlockTag, ChainClient, ChainReader};
use crate::error::{ChainError, OperationError};
use crate::state::{Role, StateStore};

/// Deploy `code` and store the new address under `role`.
pub async fn deploy(
    client: &dyn ChainClient,
    store: &mut StateStore,
    role: Role,
    code: Bytes,
) -> Result<Address, OperationError> {
    let previous = store.state().address(role);

    let (address, tx) = client.deploy(code).await?;
    info!(role = %role, address = %address, tx = %tx, endpoint = client.endpoint(), "Contract deployed");

    if previous != Address::ZERO && previous != address {
        warn!(role = %role, previous = %previous, current = %address, "Superseded previously recorded contract");
    }

    store.store(role, address)?;
    Ok(address)
}

/// Decodes the value a bind query returns.
pub type DecodeFn = fn(&[u8]) -> Result<Address, ChainError>;

/// A single on-chain setting and the value it should hold.
#[derive(Debug, Clone)]
pub struct BindStep {
    /// Names the setting in logs and errors, e.g. `target eccd owner`.
    pub label: String,
    pub contract: Address,
    /// Calldata reading the current value.
    pub query: Bytes,
    /// Calldata writing `expected`.
    pub update: Bytes,
    pub expected: Address,
    pub decode: DecodeFn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    AlreadyBound,
    Bound { tx: TxHash },
}

/// Check, act, verify.
pub async fn bind(client: &dyn ChainClient, step: &BindStep) -> Result<BindOutcome, OperationError> {
    // Unset mappings revert or return nothing, so a failed read means unbound.
    match read(client, step).await {
        Ok(current) if current == step.expected => {
            info!(label = %step.label, value = %current, "Already bound");
            return Ok(BindOutcome::AlreadyBound);
        }
        Ok(current) => {
            debug!(label = %step.label, current = %current, expected = %step.expected, "Binding");
        }
        Err(e) => {
            debug!(label = %step.label, error = %e, "Current value unreadable, treating as unbound");
        }
    }

    let tx = client.send(step.contract, step.update.clone()).await?;
    client.wait_for_confirmation(tx).await?;

    let actual = read(client, step).await?;
    if actual != step.expected {
        return Err(OperationError::StateMismatch {
            label: step.label.clone(),
            expected: step.expected,
            actual,
        });
    }

    info!(label = %step.label, value = %actual, tx = %tx, "Bound");
    Ok(BindOutcome::Bound { tx })
}

async fn read(client: &dyn ChainClient, step: &BindStep) -> Result<Address, ChainError> {
    let data = client
        .call(step.contract, step.query.clone(), BlockTag::Latest)
        .await?;
    (step.decode)(&data)
}

/// Send and confirm.
pub async fn submit(
    client: &dyn ChainClient,
    label: &str,
    target: Address,
    payload: Bytes,
) -> Result<TxHash, OperationError> {
    let tx = client.send(target, payload).await?;
    client.wait_for_confirmation(tx).await?;
    info!(label = label, tx = %tx, signer = %client.signer(), endpoint = client.endpoint(), "Submitted");
    Ok(tx)
}
