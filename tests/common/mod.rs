//! Simulated chains for integration tests
//!
//! `SimNetwork` keeps one in-memory chain per endpoint. Every client
//! connected to the same endpoint sees the same contracts, so admin and
//! validator clients interact the way they would against real nodes. Calls
//! are decoded with the crate's own `sol!` bindings.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Address, Bytes, TxHash, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;

use deployer::chain::{BlockTag, ChainClient, ChainConnector, ChainReader, HeaderSnapshot};
use deployer::contracts::{
    Artifact, IEthCrossChainManager, IHeaderSync, ILockProxy, INativeAsset, IOwnable,
    ISideChainManager, IWrapper,
};
use deployer::vault::{DisabledSessionCache, KeystoreDecryptor, ScriptedPrompt, Vault};
use deployer::{ChainError, ClientFactory, Provisioner, ProvisioningState, StateStore};

pub const TARGET_RPC: &str = "http://target.local:8545";
pub const SOURCE_RPC: &str = "http://source.local:8545";
pub const RELAY_RPC: &str = "http://relay.local:20336";

pub const TARGET_CHAIN_ID: u64 = 107;
pub const SOURCE_CHAIN_ID: u64 = 2;

pub const TARGET_ADMIN_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const SOURCE_ADMIN_KEY: &str =
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const VALIDATOR_KEYS: [&str; 3] = [
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
    "47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926a",
];

#[derive(Default)]
pub struct Contract {
    pub code: Bytes,
    pub owner: Address,
    pub manager: Address,
    pub lock_proxy: Address,
    pub proxy_hashes: HashMap<u64, Bytes>,
    pub asset_hashes: HashMap<(Address, u64), Bytes>,
    pub bound_proxies: HashMap<u64, Address>,
    pub bound_assets: HashMap<u64, Address>,
    /// Accepts writes without applying them.
    pub frozen: bool,
    /// Raw calldata of every transaction received, with its sender.
    pub received: Vec<(Address, Bytes)>,
}

#[derive(Default)]
pub struct SimChain {
    tag: u8,
    created: u64,
    pub contracts: HashMap<Address, Contract>,
    pub sends: Vec<(Address, Address, Bytes)>,
    receipts: HashMap<TxHash, bool>,
    pub headers: Vec<HeaderSnapshot>,
}

impl SimChain {
    fn new(tag: u8) -> Self {
        let headers = (0..6u64)
            .map(|n| HeaderSnapshot {
                number: n,
                hash: B256::repeat_byte(tag.wrapping_add(n as u8)),
                raw: Bytes::from(format!("{{\"chain\":{tag},\"number\":\"{n:#x}\"}}").into_bytes()),
                extra: Bytes::from(vec![tag, 0xbb, n as u8]),
            })
            .collect();
        Self {
            tag,
            headers,
            ..Default::default()
        }
    }

    fn next_address(&mut self) -> Address {
        self.created += 1;
        let mut bytes = [0u8; 20];
        bytes[0] = self.tag;
        bytes[12..].copy_from_slice(&self.created.to_be_bytes());
        Address::from(bytes)
    }

    /// Place a contract at a fresh address, as if it existed from genesis.
    pub fn install(&mut self, owner: Address) -> Address {
        let address = self.next_address();
        self.contracts.insert(
            address,
            Contract {
                owner,
                ..Default::default()
            },
        );
        address
    }

    fn record_tx(&mut self, ok: bool) -> TxHash {
        let hash = keccak256(format!("{}:{}", self.tag, self.receipts.len()));
        self.receipts.insert(hash, ok);
        hash
    }

    fn read(&self, target: Address, data: &[u8]) -> Result<Bytes, String> {
        let contract = self
            .contracts
            .get(&target)
            .ok_or_else(|| format!("no contract at {target}"))?;
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or("calldata too short")?;

        let encoded = match selector {
            IOwnable::ownerCall::SELECTOR => contract.owner.abi_encode(),
            ILockProxy::managerProxyContractCall::SELECTOR
            | INativeAsset::managerProxyCall::SELECTOR => contract.manager.abi_encode(),
            IWrapper::lockProxyCall::SELECTOR => contract.lock_proxy.abi_encode(),
            ILockProxy::proxyHashMapCall::SELECTOR => {
                let call = ILockProxy::proxyHashMapCall::abi_decode(data, true)
                    .map_err(|e| e.to_string())?;
                let value = contract
                    .proxy_hashes
                    .get(&call.toChainId)
                    .cloned()
                    .unwrap_or_default();
                ILockProxy::proxyHashMapCall::abi_encode_returns(&(value,))
            }
            ILockProxy::assetHashMapCall::SELECTOR => {
                let call = ILockProxy::assetHashMapCall::abi_decode(data, true)
                    .map_err(|e| e.to_string())?;
                let value = contract
                    .asset_hashes
                    .get(&(call.fromAssetHash, call.toChainId))
                    .cloned()
                    .unwrap_or_default();
                ILockProxy::assetHashMapCall::abi_encode_returns(&(value,))
            }
            INativeAsset::bindedProxyCall::SELECTOR => {
                let call = INativeAsset::bindedProxyCall::abi_decode(data, true)
                    .map_err(|e| e.to_string())?;
                contract
                    .bound_proxies
                    .get(&call.chainId)
                    .copied()
                    .unwrap_or_default()
                    .abi_encode()
            }
            INativeAsset::bindedAssetCall::SELECTOR => {
                let call = INativeAsset::bindedAssetCall::abi_decode(data, true)
                    .map_err(|e| e.to_string())?;
                contract
                    .bound_assets
                    .get(&call.chainId)
                    .copied()
                    .unwrap_or_default()
                    .abi_encode()
            }
            _ => return Err("execution reverted".to_string()),
        };
        Ok(encoded.into())
    }

    /// Apply a transaction; `false` means it reverted.
    fn execute(&mut self, from: Address, target: Address, data: &[u8]) -> bool {
        let Some(contract) = self.contracts.get_mut(&target) else {
            return false;
        };
        contract.received.push((from, Bytes::copy_from_slice(data)));
        let Some(selector) = data.get(..4).and_then(|s| <[u8; 4]>::try_from(s).ok()) else {
            return false;
        };
        let frozen = contract.frozen;

        match selector {
            IOwnable::transferOwnershipCall::SELECTOR => {
                let Ok(call) = IOwnable::transferOwnershipCall::abi_decode(data, true) else {
                    return false;
                };
                if from != contract.owner {
                    return false;
                }
                if !frozen {
                    contract.owner = call.newOwner;
                }
                true
            }
            ILockProxy::setManagerProxyCall::SELECTOR => {
                let Ok(call) = ILockProxy::setManagerProxyCall::abi_decode(data, true) else {
                    return false;
                };
                if !frozen {
                    contract.manager = call.ethCCMProxyAddr;
                }
                true
            }
            IWrapper::setLockProxyCall::SELECTOR => {
                let Ok(call) = IWrapper::setLockProxyCall::abi_decode(data, true) else {
                    return false;
                };
                if !frozen {
                    contract.lock_proxy = call.lockProxy;
                }
                true
            }
            ILockProxy::bindProxyHashCall::SELECTOR => {
                let Ok(call) = ILockProxy::bindProxyHashCall::abi_decode(data, true) else {
                    return false;
                };
                if !frozen {
                    contract
                        .proxy_hashes
                        .insert(call.toChainId, call.targetProxyHash);
                }
                true
            }
            ILockProxy::bindAssetHashCall::SELECTOR => {
                let Ok(call) = ILockProxy::bindAssetHashCall::abi_decode(data, true) else {
                    return false;
                };
                if !frozen {
                    contract
                        .asset_hashes
                        .insert((call.fromAssetHash, call.toChainId), call.toAssetHash);
                }
                true
            }
            INativeAsset::bindProxyCall::SELECTOR => {
                let Ok(call) = INativeAsset::bindProxyCall::abi_decode(data, true) else {
                    return false;
                };
                if !frozen {
                    contract.bound_proxies.insert(call.chainId, call.proxy);
                }
                true
            }
            INativeAsset::bindAssetCall::SELECTOR => {
                let Ok(call) = INativeAsset::bindAssetCall::abi_decode(data, true) else {
                    return false;
                };
                if !frozen {
                    contract.bound_assets.insert(call.chainId, call.asset);
                }
                true
            }
            ISideChainManager::registerSideChainCall::SELECTOR
            | ISideChainManager::approveRegisterSideChainCall::SELECTOR
            | IHeaderSync::syncGenesisHeaderCall::SELECTOR
            | IEthCrossChainManager::initGenesisBlockCall::SELECTOR => true,
            _ => false,
        }
    }
}

/// All simulated chains, keyed by endpoint.
#[derive(Default)]
pub struct SimNetwork {
    chains: Mutex<HashMap<String, Arc<Mutex<SimChain>>>>,
}

impl SimNetwork {
    pub fn new() -> Arc<Self> {
        let network = Self::default();
        for (i, endpoint) in [TARGET_RPC, SOURCE_RPC, RELAY_RPC].iter().enumerate() {
            network.chains.lock().unwrap().insert(
                endpoint.to_string(),
                Arc::new(Mutex::new(SimChain::new(0x10 * (i as u8 + 1)))),
            );
        }
        Arc::new(network)
    }

    pub fn chain(&self, endpoint: &str) -> Arc<Mutex<SimChain>> {
        self.chains.lock().unwrap()[endpoint].clone()
    }

    pub fn send_count(&self) -> usize {
        self.chains
            .lock()
            .unwrap()
            .values()
            .map(|c| c.lock().unwrap().sends.len())
            .sum()
    }

    pub fn deploy_count(&self, endpoint: &str) -> usize {
        self.chain(endpoint)
            .lock()
            .unwrap()
            .contracts
            .values()
            .filter(|c| !c.code.is_empty())
            .count()
    }
}

pub struct SimClient {
    endpoint: String,
    signer: Address,
    chain: Arc<Mutex<SimChain>>,
}

#[async_trait]
impl ChainReader for SimClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(
        &self,
        target: Address,
        payload: Bytes,
        _block: BlockTag,
    ) -> Result<Bytes, ChainError> {
        self.chain
            .lock()
            .unwrap()
            .read(target, &payload)
            .map_err(|e| ChainError::rpc(&self.endpoint, e))
    }

    async fn header(&self, block: BlockTag) -> Result<HeaderSnapshot, ChainError> {
        let chain = self.chain.lock().unwrap();
        let header = match block {
            BlockTag::Latest => chain.headers.last(),
            BlockTag::Genesis => chain.headers.first(),
            BlockTag::Number(n) => chain.headers.get(n as usize),
        };
        header
            .cloned()
            .ok_or_else(|| ChainError::rpc(&self.endpoint, "unknown block"))
    }
}

#[async_trait]
impl ChainClient for SimClient {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn deploy(&self, code: Bytes) -> Result<(Address, TxHash), ChainError> {
        let mut chain = self.chain.lock().unwrap();
        let address = chain.next_address();
        chain.contracts.insert(
            address,
            Contract {
                code,
                owner: self.signer,
                ..Default::default()
            },
        );
        let tx = chain.record_tx(true);
        Ok((address, tx))
    }

    async fn send(&self, target: Address, payload: Bytes) -> Result<TxHash, ChainError> {
        let mut chain = self.chain.lock().unwrap();
        chain.sends.push((self.signer, target, payload.clone()));
        let ok = chain.execute(self.signer, target, &payload);
        Ok(chain.record_tx(ok))
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> Result<(), ChainError> {
        match self.chain.lock().unwrap().receipts.get(&tx) {
            Some(true) => Ok(()),
            Some(false) => Err(ChainError::Reverted {
                endpoint: self.endpoint.clone(),
                tx,
            }),
            None => Err(ChainError::rpc(&self.endpoint, "unknown transaction")),
        }
    }
}

pub struct SimConnector {
    network: Arc<SimNetwork>,
}

impl SimConnector {
    pub fn new(network: Arc<SimNetwork>) -> Self {
        Self { network }
    }

    fn open(&self, endpoint: &str, signer: Address) -> Result<SimClient, ChainError> {
        let chain = self
            .network
            .chains
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| ChainError::rpc(endpoint, "connection refused"))?;
        Ok(SimClient {
            endpoint: endpoint.to_string(),
            signer,
            chain,
        })
    }
}

impl ChainConnector for SimConnector {
    fn connect(
        &self,
        endpoint: &str,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn ChainClient>, ChainError> {
        Ok(Arc::new(self.open(endpoint, signer.address())?))
    }

    fn reader(&self, endpoint: &str) -> Result<Arc<dyn ChainReader>, ChainError> {
        Ok(Arc::new(self.open(endpoint, Address::ZERO)?))
    }
}

pub fn address_of(key: &str) -> Address {
    key.parse::<PrivateKeySigner>().unwrap().address()
}

/// A provisioning workspace: key files, forge artifacts, state file and the
/// simulated network they point at.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub network: Arc<SimNetwork>,
    pub state_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let network = SimNetwork::new();

        let key_file = |name: &str, key: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("{key}\n")).unwrap();
            path.display().to_string()
        };

        let artifacts = dir.path().join("out");
        for (i, artifact) in [
            Artifact::CrossChainData,
            Artifact::CrossChainManager,
            Artifact::CrossChainManagerProxy,
            Artifact::LockProxy,
            Artifact::NativeWrapper,
            Artifact::NftLockProxy,
            Artifact::NftWrapper,
            Artifact::NftQuery,
        ]
        .iter()
        .enumerate()
        {
            let name = artifact.contract_name();
            let nested = artifacts.join(format!("{name}.sol"));
            std::fs::create_dir_all(&nested).unwrap();
            std::fs::write(
                nested.join(format!("{name}.json")),
                format!(r#"{{"bytecode": {{"object": "0x6080{i:02x}"}}}}"#),
            )
            .unwrap();
        }

        let target_admin = address_of(TARGET_ADMIN_KEY);
        let source_admin = address_of(SOURCE_ADMIN_KEY);
        let relay_admin = address_of(VALIDATOR_KEYS[0]);

        let (target_native, target_nft_asset) = {
            let chain = network.chain(TARGET_RPC);
            let mut chain = chain.lock().unwrap();
            (chain.install(target_admin), chain.install(target_admin))
        };
        let (source_native, source_nft_asset) = {
            let chain = network.chain(SOURCE_RPC);
            let mut chain = chain.lock().unwrap();
            (chain.install(source_admin), chain.install(source_admin))
        };
        let (side_chain_manager, header_sync) = {
            let chain = network.chain(RELAY_RPC);
            let mut chain = chain.lock().unwrap();
            (chain.install(relay_admin), chain.install(relay_admin))
        };

        let state = ProvisioningState {
            session_cache: dir.path().join("session-cache.json").display().to_string(),
            artifacts_dir: artifacts.display().to_string(),
            relay_rpc_url: RELAY_RPC.to_string(),
            relay_validator_keystores: VALIDATOR_KEYS
                .iter()
                .enumerate()
                .map(|(i, key)| key_file(&format!("validator-{i}.key"), key))
                .collect(),
            relay_side_chain_manager: side_chain_manager,
            relay_header_sync: header_sync,
            target_rpc_url: TARGET_RPC.to_string(),
            target_admin_keystore: key_file("target-admin.key", TARGET_ADMIN_KEY),
            target_side_chain_id: TARGET_CHAIN_ID,
            target_side_chain_name: "target".to_string(),
            target_native_asset: target_native,
            target_nft_asset,
            source_rpc_url: SOURCE_RPC.to_string(),
            source_admin_keystore: key_file("source-admin.key", SOURCE_ADMIN_KEY),
            source_side_chain_id: SOURCE_CHAIN_ID,
            source_side_chain_name: "source".to_string(),
            source_native_asset: source_native,
            source_nft_asset,
            ..Default::default()
        };

        let state_path = dir.path().join("config.json");
        StateStore::new(&state_path, state).save().unwrap();

        Self {
            dir,
            network,
            state_path,
        }
    }

    /// A provisioner over the state file as it is on disk now.
    pub fn provisioner(&self) -> Provisioner {
        self.provisioner_with_vault(Vault::new(
            Arc::new(KeystoreDecryptor),
            Arc::new(ScriptedPrompt::default()),
            Arc::new(DisabledSessionCache),
        ))
    }

    pub fn provisioner_with_vault(&self, vault: Vault) -> Provisioner {
        let store = StateStore::load(&self.state_path).unwrap();
        let connector = Arc::new(SimConnector::new(self.network.clone()));
        Provisioner::new(store, ClientFactory::new(vault, connector))
    }

    pub fn saved_state(&self) -> ProvisioningState {
        StateStore::load(&self.state_path).unwrap().state().clone()
    }

    pub fn rewrite_state(&self, edit: impl FnOnce(&mut ProvisioningState)) {
        let mut state = self.saved_state();
        edit(&mut state);
        StateStore::new(&self.state_path, state).save().unwrap();
    }
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
