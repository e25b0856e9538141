//! NFT lock proxies
//!
//! Both chains run an NFT lock proxy that points at its local CCMP and maps
//! the counterpart chain's proxy and asset. The target chain also hosts the
//! wrapper and query helpers.

use alloy::primitives::U256;

use crate::contracts::Artifact;
use crate::error::OperationError;
use crate::state::{Role, Side};

use super::native::{asset_hash_step, manager_proxy_step, proxy_hash_step};
use super::Provisioner;

pub(super) async fn deploy_proxy(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let code = p.artifacts.bytecode(Artifact::NftLockProxy)?;
    p.deploy(side, side.nft_proxy(), code).await
}

pub(super) async fn bind_proxy(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let remote_side = side.counterpart();
    let state = p.store.state();
    let proxy = state.require(side.nft_proxy())?;
    let remote = state.require(remote_side.nft_proxy())?;
    let chain_id = state.side_chain_id(remote_side)?;

    p.bind(
        side,
        proxy_hash_step(
            format!("{side} nft proxy peer on chain {chain_id}"),
            proxy,
            chain_id,
            remote,
        ),
    )
    .await
}

pub(super) async fn bind_asset(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let remote_side = side.counterpart();
    let state = p.store.state();
    let proxy = state.require(side.nft_proxy())?;
    let asset = state.require(side.nft_asset())?;
    let remote = state.require(remote_side.nft_asset())?;
    let chain_id = state.side_chain_id(remote_side)?;

    p.bind(
        side,
        asset_hash_step(
            format!("{side} nft asset {asset} on chain {chain_id}"),
            proxy,
            asset,
            chain_id,
            remote,
        ),
    )
    .await
}

pub(super) async fn set_ccmp(p: &mut Provisioner, side: Side) -> Result<(), OperationError> {
    let state = p.store.state();
    let proxy = state.require(side.nft_proxy())?;
    let ccmp = state.require(side.ccmp())?;
    p.bind(
        side,
        manager_proxy_step(format!("{side} nft proxy manager"), proxy, ccmp),
    )
    .await
}

pub(super) async fn target_deploy_wrapper(p: &mut Provisioner) -> Result<(), OperationError> {
    let chain_id = p.store.state().side_chain_id(Side::Target)?;
    let owner = p.admin(Side::Target)?.signer();
    let code = p
        .artifacts
        .creation_code(Artifact::NftWrapper, (owner, U256::from(chain_id)))?;
    p.deploy(Side::Target, Role::TargetNftWrapper, code).await
}

pub(super) async fn target_deploy_query(p: &mut Provisioner) -> Result<(), OperationError> {
    let owner = p.admin(Side::Target)?.signer();
    let code = p.artifacts.creation_code(Artifact::NftQuery, (owner,))?;
    p.deploy(Side::Target, Role::TargetNftQuery, code).await
}
