//! Contract ABI glue
//!
//! Solidity interfaces for every call the provisioning operations make, plus
//! a loader for creation bytecode from a forge `out/` directory.

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::abi::TokenSeq;
use alloy::sol_types::{SolType, SolValue};
use serde::Deserialize;

use crate::error::{ChainError, OperationError};

/// Router id registered for EVM side chains on the relay chain.
pub const SIDE_CHAIN_ROUTER: u64 = 2;

/// Relay blocks a side chain waits before treating a header as final.
pub const BLOCKS_TO_WAIT: u64 = 1;

sol! {
    #[derive(Debug)]
    interface IOwnable {
        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
    }

    /// Lock proxy holding per-chain proxy and asset hashes.
    #[derive(Debug)]
    interface ILockProxy {
        function managerProxyContract() external view returns (address);
        function setManagerProxy(address ethCCMProxyAddr) external;
        function proxyHashMap(uint64 toChainId) external view returns (bytes);
        function bindProxyHash(uint64 toChainId, bytes targetProxyHash) external;
        function assetHashMap(address fromAssetHash, uint64 toChainId) external view returns (bytes);
        function bindAssetHash(address fromAssetHash, uint64 toChainId, bytes toAssetHash) external;
    }

    /// Native asset contract on the target chain; doubles as its lock proxy.
    #[derive(Debug)]
    interface INativeAsset {
        function managerProxy() external view returns (address);
        function setManagerProxy(address ccmp) external;
        function bindedProxy(uint64 chainId) external view returns (address);
        function bindProxy(uint64 chainId, address proxy) external;
        function bindedAsset(uint64 chainId) external view returns (address);
        function bindAsset(uint64 chainId, address asset) external;
    }

    #[derive(Debug)]
    interface IWrapper {
        function lockProxy() external view returns (address);
        function setLockProxy(address lockProxy) external;
    }

    #[derive(Debug)]
    interface IEthCrossChainManager {
        function initGenesisBlock(bytes rawHeader, bytes pubKeyList) external returns (bool);
    }

    /// Relay chain side chain registry.
    #[derive(Debug)]
    interface ISideChainManager {
        function registerSideChain(uint64 chainID, uint64 router, string name, uint64 blocksToWait, bytes CCMCAddress) external returns (bool);
        function approveRegisterSideChain(uint64 chainID) external returns (bool);
    }

    /// Relay chain header store for side chains.
    #[derive(Debug)]
    interface IHeaderSync {
        function syncGenesisHeader(uint64 chainID, bytes genesisHeader) external returns (bool);
    }
}

/// Contracts deployed from forge artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    CrossChainData,
    CrossChainManager,
    CrossChainManagerProxy,
    LockProxy,
    NativeWrapper,
    NftLockProxy,
    NftWrapper,
    NftQuery,
}

impl Artifact {
    /// Solidity contract name, which is also the artifact file stem.
    pub fn contract_name(&self) -> &'static str {
        match self {
            Artifact::CrossChainData => "EthCrossChainData",
            Artifact::CrossChainManager => "EthCrossChainManager",
            Artifact::CrossChainManagerProxy => "EthCrossChainManagerProxy",
            Artifact::LockProxy => "LockProxy",
            Artifact::NativeWrapper => "NativeWrapper",
            Artifact::NftLockProxy => "NFTLockProxy",
            Artifact::NftWrapper => "NFTWrapper",
            Artifact::NftQuery => "NFTQuery",
        }
    }
}

#[derive(Deserialize)]
struct ArtifactFile {
    bytecode: BytecodeField,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Forge { object: String },
    Plain(String),
}

/// Reads creation bytecode from a forge build output directory.
#[derive(Debug, Clone)]
pub struct ForgeArtifacts {
    dir: PathBuf,
}

impl ForgeArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<Name>.sol/<Name>.json`, or `<dir>/<Name>.json` for flat layouts.
    fn locate(&self, name: &str) -> PathBuf {
        let nested = self.dir.join(format!("{name}.sol")).join(format!("{name}.json"));
        if nested.exists() {
            nested
        } else {
            self.dir.join(format!("{name}.json"))
        }
    }

    pub fn bytecode(&self, artifact: Artifact) -> Result<Bytes, OperationError> {
        let name = artifact.contract_name();
        let failed = |reason: String| OperationError::Artifact {
            contract: name.to_string(),
            reason,
        };

        let path = self.locate(name);
        let data = std::fs::read_to_string(&path)
            .map_err(|e| failed(format!("{}: {e}", path.display())))?;
        let file: ArtifactFile =
            serde_json::from_str(&data).map_err(|e| failed(format!("{}: {e}", path.display())))?;

        let hex_code = match file.bytecode {
            BytecodeField::Forge { object } => object,
            BytecodeField::Plain(code) => code,
        };
        let code = hex::decode(hex_code.trim().trim_start_matches("0x"))
            .map_err(|e| failed(format!("bytecode is not hex: {e}")))?;
        if code.is_empty() {
            return Err(failed("bytecode is empty (abstract contract or interface?)".to_string()));
        }
        Ok(code.into())
    }

    /// Bytecode followed by ABI-encoded constructor arguments.
    pub fn creation_code<A: SolValue>(
        &self,
        artifact: Artifact,
        args: A,
    ) -> Result<Bytes, OperationError>
    where
        for<'a> <A::SolType as SolType>::Token<'a>: TokenSeq<'a>,
    {
        let mut code = self.bytecode(artifact)?.to_vec();
        code.extend_from_slice(&args.abi_encode_params());
        Ok(code.into())
    }
}

/// Decode a single `address` return value.
pub fn decode_address(data: &[u8]) -> Result<Address, ChainError> {
    Address::abi_decode(data, true).map_err(|e| ChainError::Decode {
        what: "address return value".to_string(),
        reason: e.to_string(),
    })
}

/// Decode a `bytes` return value holding a packed address. Empty bytes mean
/// the mapping is unset.
pub fn decode_address_bytes(data: &[u8]) -> Result<Address, ChainError> {
    let raw = Bytes::abi_decode(data, true).map_err(|e| ChainError::Decode {
        what: "bytes return value".to_string(),
        reason: e.to_string(),
    })?;
    match raw.len() {
        0 => Ok(Address::ZERO),
        20 => Ok(Address::from_slice(&raw)),
        n => Err(ChainError::Decode {
            what: "address hash".to_string(),
            reason: format!("expected 20 bytes, got {n}"),
        }),
    }
}

/// Packed form stored in lock proxy hash maps.
pub fn address_hash(address: Address) -> Bytes {
    Bytes::copy_from_slice(address.as_slice())
}
