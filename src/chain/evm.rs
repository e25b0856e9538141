//! alloy-backed chain access

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash},
    providers::{Provider, ProviderBuilder},
    rpc::types::{BlockTransactionsKind, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConfirmationPolicy;
use crate::error::ChainError;

use super::{await_receipt, BlockTag, ChainClient, ChainReader, HeaderSnapshot};

/// Build a filling, signing HTTP provider. The recommended fillers supply
/// nonce, gas and chain id so the wallet filler can sign.
macro_rules! signing_provider {
    ($client:expr) => {
        ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet($client.wallet.clone())
            .on_http($client.reader.url.clone())
    };
}

/// Read-only access to one endpoint; holds no key.
#[derive(Debug, Clone)]
pub struct EvmChainReader {
    endpoint: String,
    url: Url,
}

impl EvmChainReader {
    pub fn new(endpoint: &str) -> Result<Self, ChainError> {
        let url: Url = endpoint
            .parse()
            .map_err(|e| ChainError::rpc(endpoint, format!("invalid RPC URL: {e}")))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            url,
        })
    }
}

#[async_trait]
impl ChainReader for EvmChainReader {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(
        &self,
        target: Address,
        payload: Bytes,
        block: BlockTag,
    ) -> Result<Bytes, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let tx = TransactionRequest::default()
            .with_to(target)
            .with_input(payload);

        provider
            .call(&tx)
            .block(block.into())
            .await
            .map_err(|e| ChainError::rpc(&self.endpoint, e))
    }

    async fn header(&self, block: BlockTag) -> Result<HeaderSnapshot, ChainError> {
        let provider = ProviderBuilder::new().on_http(self.url.clone());
        let block_data = provider
            .get_block(block.into(), BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| ChainError::rpc(&self.endpoint, e))?
            .ok_or_else(|| ChainError::rpc(&self.endpoint, format!("block {block:?} not found")))?;

        let header = block_data.header;
        let raw = serde_json::to_vec(&header).map_err(|e| ChainError::Decode {
            what: format!("header of block {}", header.number),
            reason: e.to_string(),
        })?;

        Ok(HeaderSnapshot {
            number: header.number,
            hash: header.hash,
            raw: raw.into(),
            extra: header.extra_data.clone(),
        })
    }
}

/// Chain client bound to one endpoint and one signing key.
pub struct EvmChainClient {
    reader: EvmChainReader,
    wallet: EthereumWallet,
    address: Address,
    confirmation: ConfirmationPolicy,
    cancel: CancellationToken,
}

impl EvmChainClient {
    pub fn new(
        endpoint: &str,
        signer: PrivateKeySigner,
        confirmation: ConfirmationPolicy,
        cancel: CancellationToken,
    ) -> Result<Self, ChainError> {
        let reader = EvmChainReader::new(endpoint)?;
        let address = signer.address();

        info!(endpoint = %endpoint, address = %address, "Created EVM client with signer");

        Ok(Self {
            reader,
            wallet: EthereumWallet::from(signer),
            address,
            confirmation,
            cancel,
        })
    }
}

#[async_trait]
impl ChainReader for EvmChainClient {
    fn endpoint(&self) -> &str {
        self.reader.endpoint()
    }

    async fn call(
        &self,
        target: Address,
        payload: Bytes,
        block: BlockTag,
    ) -> Result<Bytes, ChainError> {
        self.reader.call(target, payload, block).await
    }

    async fn header(&self, block: BlockTag) -> Result<HeaderSnapshot, ChainError> {
        self.reader.header(block).await
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn signer(&self) -> Address {
        self.address
    }

    async fn deploy(&self, code: Bytes) -> Result<(Address, TxHash), ChainError> {
        let provider = signing_provider!(self);
        let tx = TransactionRequest::default().with_deploy_code(code);
        let endpoint = self.endpoint();

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::rpc(endpoint, e))?;
        let tx_hash = *pending.tx_hash();
        debug!(endpoint = %endpoint, tx = %tx_hash, "Deployment submitted");

        let provider = &provider;
        let receipt = await_receipt(
            endpoint,
            tx_hash,
            &self.confirmation,
            &self.cancel,
            move || async move {
                provider
                    .get_transaction_receipt(tx_hash)
                    .await
                    .map_err(|e| ChainError::rpc(endpoint, e))
            },
        )
        .await?;

        let address = receipt
            .contract_address
            .ok_or_else(|| ChainError::MissingContractAddress {
                endpoint: endpoint.to_string(),
                tx: tx_hash,
            })?;
        Ok((address, tx_hash))
    }

    async fn send(&self, target: Address, payload: Bytes) -> Result<TxHash, ChainError> {
        let provider = signing_provider!(self);
        let tx = TransactionRequest::default()
            .with_to(target)
            .with_input(payload);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::rpc(self.endpoint(), e))?;
        let tx_hash = *pending.tx_hash();
        debug!(endpoint = %self.endpoint(), to = %target, tx = %tx_hash, "Transaction submitted");
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> Result<(), ChainError> {
        let provider = signing_provider!(self);
        let provider = &provider;
        let endpoint = self.endpoint();
        await_receipt(endpoint, tx, &self.confirmation, &self.cancel, move || async move {
            provider
                .get_transaction_receipt(tx)
                .await
                .map_err(|e| ChainError::rpc(endpoint, e))
        })
        .await
        .map(|_| ())
    }
}
