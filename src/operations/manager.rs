//! Cross-chain manager contracts, identical on both sides
//!
//! ECCD stores cross-chain state, ECCM verifies and dispatches, CCMP is the
//! stable address the asset contracts talk to. Ownership runs
//! ECCD -> ECCM -> CCMP once everything is deployed.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;

use crate::contracts::{decode_address, Artifact, IOwnable};
use crate::error::OperationError;
use crate::protocol::BindStep;
use crate::state::Side;

use super::Provisioner;

pub(super) async fn deploy_eccd(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let code = p.artifacts.bytecode(Artifact::CrossChainData)?;
    p.deploy(side, side.eccd(), code).await
}

pub(super) async fn deploy_eccm(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let state = p.store.state();
    let eccd = state.require(side.eccd())?;
    let chain_id = state.side_chain_id(side)?;

    let code = p
        .artifacts
        .creation_code(Artifact::CrossChainManager, (eccd, chain_id))?;
    p.deploy(side, side.eccm(), code).await
}

pub(super) async fn deploy_ccmp(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let eccm = p.store.state().require(side.eccm())?;
    let code = p
        .artifacts
        .creation_code(Artifact::CrossChainManagerProxy, (eccm,))?;
    p.deploy(side, side.ccmp(), code).await
}

pub(super) async fn eccd_ownership(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let state = p.store.state();
    let eccd = state.require(side.eccd())?;
    let eccm = state.require(side.eccm())?;
    p.bind(side, ownership_step(format!("{side} eccd owner"), eccd, eccm))
        .await
}

pub(super) async fn eccm_ownership(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let state = p.store.state();
    let eccm = state.require(side.eccm())?;
    let ccmp = state.require(side.ccmp())?;
    p.bind(side, ownership_step(format!("{side} eccm owner"), eccm, ccmp))
        .await
}

fn ownership_step(
    label: String,
    contract: Address,
    new_owner: Address,
) -> BindStep {
    BindStep {
        label,
        contract,
        query: IOwnable::ownerCall {}.abi_encode().into(),
        update: IOwnable::transferOwnershipCall {
            newOwner: new_owner,
        }
        .abi_encode()
        .into(),
        expected: new_owner,
        decode: decode_address,
    }
}
