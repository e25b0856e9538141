//! Relay chain registration and genesis header exchange
//!
//! A side chain becomes usable once the relay chain knows it (register, then
//! approval by every validator) and each side holds the other's genesis:
//! the side chain's current header goes to the relay header store, the relay
//! chain's block 0 header and bookkeepers go to the side chain's ECCM.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use tracing::info;

use crate::chain::{BlockTag, ChainReader};
use crate::contracts::{
    address_hash, IEthCrossChainManager, IHeaderSync, ISideChainManager, BLOCKS_TO_WAIT,
    SIDE_CHAIN_ROUTER,
};
use crate::error::OperationError;
use crate::protocol;
use crate::state::Side;

use super::Provisioner;

fn require_contract(address: Address, field: &'static str) -> Result<Address, OperationError> {
    if address == Address::ZERO {
        return Err(OperationError::MissingInput { field });
    }
    Ok(address)
}

pub(super) async fn register_side_chain(
    p: &mut Provisioner,
    side: Side,
) -> Result<(), OperationError> {
    let state = p.store.state();
    let manager = require_contract(state.relay_side_chain_manager, "relay_side_chain_manager")?;
    let chain_id = state.side_chain_id(side)?;
    let eccd = state.require(side.eccd())?;
    let name = state.side_chain_name(side).trim().to_string();
    if name.is_empty() {
        return Err(OperationError::MissingInput {
            field: match side {
                Side::Source => "source_side_chain_name",
                Side::Target => "target_side_chain_name",
            },
        });
    }

    let payload = ISideChainManager::registerSideChainCall {
        chainID: chain_id,
        router: SIDE_CHAIN_ROUTER,
        name: name.clone(),
        blocksToWait: BLOCKS_TO_WAIT,
        CCMCAddress: address_hash(eccd),
    }
    .abi_encode();

    let relay = p.relay()?;
    protocol::submit(
        relay.as_ref(),
        &format!("register {side} side chain {chain_id} ({name})"),
        manager,
        payload.into(),
    )
    .await?;
    Ok(())
}

pub(super) async fn approve_side_chain(
    p: &mut Provisioner,
    side: Side,
) -> Result<(), OperationError> {
    let state = p.store.state();
    let manager = require_contract(state.relay_side_chain_manager, "relay_side_chain_manager")?;
    let chain_id = state.side_chain_id(side)?;

    let payload = ISideChainManager::approveRegisterSideChainCall { chainID: chain_id }.abi_encode();
    p.submit_from_validators(
        &format!("approve {side} side chain {chain_id}"),
        manager,
        payload.into(),
    )
    .await
}

pub(super) async fn sync_side_genesis(
    p: &mut Provisioner,
    side: Side,
) -> Result<(), OperationError> {
    let state = p.store.state();
    let header_sync = require_contract(state.relay_header_sync, "relay_header_sync")?;
    let chain_id = state.side_chain_id(side)?;

    let header = p.side_reader(side)?.header(BlockTag::Latest).await?;
    info!(side = %side, number = header.number, hash = %header.hash, "Fetched side chain header");

    let payload = IHeaderSync::syncGenesisHeaderCall {
        chainID: chain_id,
        genesisHeader: header.raw,
    }
    .abi_encode();
    p.submit_from_validators(
        &format!("sync {side} genesis header {}", header.number),
        header_sync,
        payload.into(),
    )
    .await
}

pub(super) async fn sync_relay_genesis(
    p: &mut Provisioner,
    side: Side,
) -> Result<(), OperationError> {
    let eccm = p.store.state().require(side.eccm())?;

    // Block 0 carries the initial bookkeeper set.
    let header = p.relay_reader()?.header(BlockTag::Number(0)).await?;
    info!(number = header.number, hash = %header.hash, bookkeepers_len = header.extra.len(), "Fetched relay genesis header");

    let payload = IEthCrossChainManager::initGenesisBlockCall {
        rawHeader: header.raw,
        pubKeyList: header.extra,
    }
    .abi_encode();

    let client = p.admin(side)?;
    protocol::submit(
        client.as_ref(),
        &format!("init {side} eccm with relay genesis"),
        eccm,
        payload.into(),
    )
    .await?;
    Ok(())
}
