//! Native asset plumbing
//!
//! On the target chain the native asset contract is its own lock proxy: it
//! records the source chain's proxy and asset and trusts the target CCMP. On
//! the source chain a regular lock proxy maps the source asset to the target
//! native asset.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;

use crate::contracts::{
    address_hash, decode_address, decode_address_bytes, Artifact, ILockProxy, INativeAsset,
    IWrapper,
};
use crate::error::OperationError;
use crate::protocol::BindStep;
use crate::state::{Role, Side};

use super::Provisioner;

pub(super) async fn target_set_ccmp(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let asset = state.require(Role::TargetNativeAsset)?;
    let ccmp = state.require(Role::TargetCcmp)?;

    let step = BindStep {
        label: "target native asset manager proxy".to_string(),
        contract: asset,
        query: INativeAsset::managerProxyCall {}.abi_encode().into(),
        update: INativeAsset::setManagerProxyCall { ccmp }.abi_encode().into(),
        expected: ccmp,
        decode: decode_address,
    };
    p.bind(Side::Target, step).await
}

pub(super) async fn target_bind_proxy(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let asset = state.require(Role::TargetNativeAsset)?;
    let proxy = state.require(Role::SourceNativeProxy)?;
    let chain_id = state.side_chain_id(Side::Source)?;

    let step = BindStep {
        label: format!("target native asset proxy for chain {chain_id}"),
        contract: asset,
        query: INativeAsset::bindedProxyCall { chainId: chain_id }
            .abi_encode()
            .into(),
        update: INativeAsset::bindProxyCall {
            chainId: chain_id,
            proxy,
        }
        .abi_encode()
        .into(),
        expected: proxy,
        decode: decode_address,
    };
    p.bind(Side::Target, step).await
}

pub(super) async fn target_bind_asset(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let native = state.require(Role::TargetNativeAsset)?;
    let counterpart = state.require(Role::SourceNativeAsset)?;
    let chain_id = state.side_chain_id(Side::Source)?;

    let step = BindStep {
        label: format!("target native asset counterpart on chain {chain_id}"),
        contract: native,
        query: INativeAsset::bindedAssetCall { chainId: chain_id }
            .abi_encode()
            .into(),
        update: INativeAsset::bindAssetCall {
            chainId: chain_id,
            asset: counterpart,
        }
        .abi_encode()
        .into(),
        expected: counterpart,
        decode: decode_address,
    };
    p.bind(Side::Target, step).await
}

pub(super) async fn target_deploy_wrapper(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let fee_token = state.require(Role::TargetNativeAsset)?;
    let chain_id = state.side_chain_id(Side::Target)?;

    let owner = p.admin(Side::Target)?.signer();
    let code = p.artifacts.creation_code(
        Artifact::NativeWrapper,
        (owner, fee_token, U256::from(chain_id)),
    )?;
    p.deploy(Side::Target, Role::TargetNativeWrapper, code).await
}

pub(super) async fn target_wrapper_set_proxy(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let wrapper = state.require(Role::TargetNativeWrapper)?;
    let lock_proxy = state.require(Role::TargetNativeAsset)?;

    let step = BindStep {
        label: "target wrapper lock proxy".to_string(),
        contract: wrapper,
        query: IWrapper::lockProxyCall {}.abi_encode().into(),
        update: IWrapper::setLockProxyCall {
            lockProxy: lock_proxy,
        }
        .abi_encode()
        .into(),
        expected: lock_proxy,
        decode: decode_address,
    };
    p.bind(Side::Target, step).await
}

pub(super) async fn source_deploy_proxy(p: &mut Provisioner) -> Result<(), OperationError> {
    let code = p.artifacts.bytecode(Artifact::LockProxy)?;
    p.deploy(Side::Source, Role::SourceNativeProxy, code).await
}

pub(super) async fn source_proxy_ccmp(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let proxy = state.require(Role::SourceNativeProxy)?;
    let ccmp = state.require(Role::SourceCcmp)?;
    p.bind(
        Side::Source,
        manager_proxy_step("source native proxy manager".to_string(), proxy, ccmp),
    )
    .await
}

pub(super) async fn source_bind_proxy(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let proxy = state.require(Role::SourceNativeProxy)?;
    // The target native asset acts as its own lock proxy.
    let remote = state.require(Role::TargetNativeAsset)?;
    let chain_id = state.side_chain_id(Side::Target)?;

    p.bind(
        Side::Source,
        proxy_hash_step(
            format!("source native proxy peer on chain {chain_id}"),
            proxy,
            chain_id,
            remote,
        ),
    )
    .await
}

pub(super) async fn source_bind_asset(p: &mut Provisioner) -> Result<(), OperationError> {
    let state = p.store.state();
    let proxy = state.require(Role::SourceNativeProxy)?;
    let asset = state.require(Role::SourceNativeAsset)?;
    let remote = state.require(Role::TargetNativeAsset)?;
    let chain_id = state.side_chain_id(Side::Target)?;

    p.bind(
        Side::Source,
        asset_hash_step(
            format!("source native asset {asset} on chain {chain_id}"),
            proxy,
            asset,
            chain_id,
            remote,
        ),
    )
    .await
}

/// `setManagerProxy` on a lock proxy.
pub(super) fn manager_proxy_step(
    label: String,
    proxy: Address,
    ccmp: Address,
) -> BindStep {
    BindStep {
        label,
        contract: proxy,
        query: ILockProxy::managerProxyContractCall {}.abi_encode().into(),
        update: ILockProxy::setManagerProxyCall {
            ethCCMProxyAddr: ccmp,
        }
        .abi_encode()
        .into(),
        expected: ccmp,
        decode: decode_address,
    }
}

/// `bindProxyHash` on a lock proxy.
pub(super) fn proxy_hash_step(
    label: String,
    proxy: Address,
    chain_id: u64,
    remote: Address,
) -> BindStep {
    BindStep {
        label,
        contract: proxy,
        query: ILockProxy::proxyHashMapCall {
            toChainId: chain_id,
        }
        .abi_encode()
        .into(),
        update: ILockProxy::bindProxyHashCall {
            toChainId: chain_id,
            targetProxyHash: address_hash(remote),
        }
        .abi_encode()
        .into(),
        expected: remote,
        decode: decode_address_bytes,
    }
}

/// `bindAssetHash` on a lock proxy.
pub(super) fn asset_hash_step(
    label: String,
    proxy: Address,
    asset: Address,
    chain_id: u64,
    remote: Address,
) -> BindStep {
    BindStep {
        label,
        contract: proxy,
        query: ILockProxy::assetHashMapCall {
            fromAssetHash: asset,
            toChainId: chain_id,
        }
        .abi_encode()
        .into(),
        update: ILockProxy::bindAssetHashCall {
            fromAssetHash: asset,
            toChainId: chain_id,
            toAssetHash: address_hash(remote),
        }
        .abi_encode()
        .into(),
        expected: remote,
        decode: decode_address_bytes,
    }
}
