//! In-memory chain double for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, TxHash, B256};
use async_trait::async_trait;

use alloy::signers::local::PrivateKeySigner;

use crate::chain::{BlockTag, ChainClient, ChainConnector, ChainReader, HeaderSnapshot};
use crate::error::ChainError;

pub const MOCK_ENDPOINT: &str = "mock://chain";

/// Reads are served from a `(contract, calldata) -> return data` table.
/// A send whose calldata has a registered effect rewrites one table entry.
#[derive(Default)]
pub struct MockChain {
    signer: Address,
    reads: Mutex<HashMap<(Address, Bytes), Bytes>>,
    effects: Mutex<HashMap<(Address, Bytes), ((Address, Bytes), Bytes)>>,
    sends: Mutex<Vec<(Address, Bytes)>>,
    deploys: Mutex<Vec<Bytes>>,
    failing_reads: Mutex<bool>,
    reverting: Mutex<bool>,
    headers: Mutex<HashMap<u64, HeaderSnapshot>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            signer: Address::repeat_byte(0xad),
            ..Default::default()
        }
    }

    pub fn with_signer(signer: Address) -> Self {
        Self {
            signer,
            ..Default::default()
        }
    }

    pub fn set_read(&self, contract: Address, query: Bytes, value: Bytes) {
        self.reads.lock().unwrap().insert((contract, query), value);
    }

    /// When `update` is sent to `contract`, `query` starts returning `value`.
    pub fn on_send(&self, contract: Address, update: Bytes, query: Bytes, value: Bytes) {
        self.effects
            .lock()
            .unwrap()
            .insert((contract, update), ((contract, query), value));
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.failing_reads.lock().unwrap() = fail;
    }

    pub fn revert_sends(&self, revert: bool) {
        *self.reverting.lock().unwrap() = revert;
    }

    pub fn set_header(&self, header: HeaderSnapshot) {
        self.headers.lock().unwrap().insert(header.number, header);
    }

    pub fn sends(&self) -> Vec<(Address, Bytes)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn deploys(&self) -> Vec<Bytes> {
        self.deploys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for MockChain {
    fn endpoint(&self) -> &str {
        MOCK_ENDPOINT
    }

    async fn call(
        &self,
        target: Address,
        payload: Bytes,
        _block: BlockTag,
    ) -> Result<Bytes, ChainError> {
        if *self.failing_reads.lock().unwrap() {
            return Err(ChainError::rpc(MOCK_ENDPOINT, "execution reverted"));
        }
        self.reads
            .lock()
            .unwrap()
            .get(&(target, payload))
            .cloned()
            .ok_or_else(|| ChainError::rpc(MOCK_ENDPOINT, "execution reverted"))
    }

    async fn header(&self, block: BlockTag) -> Result<HeaderSnapshot, ChainError> {
        let headers = self.headers.lock().unwrap();
        let found = match block {
            BlockTag::Latest => headers.values().max_by_key(|h| h.number).cloned(),
            BlockTag::Genesis => headers.get(&0).cloned(),
            BlockTag::Number(n) => headers.get(&n).cloned(),
        };
        found.ok_or_else(|| ChainError::rpc(MOCK_ENDPOINT, format!("no header for {block:?}")))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn deploy(&self, code: Bytes) -> Result<(Address, TxHash), ChainError> {
        let mut deploys = self.deploys.lock().unwrap();
        deploys.push(code);
        let n = deploys.len() as u8;
        Ok((Address::repeat_byte(0xc0 + n), TxHash::repeat_byte(n)))
    }

    async fn send(&self, target: Address, payload: Bytes) -> Result<TxHash, ChainError> {
        let mut sends = self.sends.lock().unwrap();
        sends.push((target, payload.clone()));
        let tx = TxHash::repeat_byte(0x80 + sends.len() as u8);

        if !*self.reverting.lock().unwrap() {
            if let Some((key, value)) = self.effects.lock().unwrap().get(&(target, payload)) {
                self.reads.lock().unwrap().insert(key.clone(), value.clone());
            }
        }
        Ok(tx)
    }

    async fn wait_for_confirmation(&self, tx: TxHash) -> Result<(), ChainError> {
        if *self.reverting.lock().unwrap() {
            return Err(ChainError::Reverted {
                endpoint: MOCK_ENDPOINT.to_string(),
                tx,
            });
        }
        Ok(())
    }
}

pub fn header(number: u64) -> HeaderSnapshot {
    HeaderSnapshot {
        number,
        hash: B256::repeat_byte(number as u8 + 1),
        raw: Bytes::from(format!("{{\"number\":\"{number:#x}\"}}").into_bytes()),
        extra: Bytes::from(vec![0xbe, 0xef, number as u8]),
    }
}

/// Hands out a fresh [`MockChain`] per connection and records each one.
/// Readers serve headers 0 to 2.
#[derive(Default)]
pub struct MockConnector {
    pub connections: Mutex<Vec<(String, Address)>>,
    pub readers: Mutex<usize>,
}

impl ChainConnector for MockConnector {
    fn connect(
        &self,
        endpoint: &str,
        signer: PrivateKeySigner,
    ) -> Result<Arc<dyn ChainClient>, ChainError> {
        self.connections
            .lock()
            .unwrap()
            .push((endpoint.to_string(), signer.address()));
        Ok(Arc::new(MockChain::with_signer(signer.address())))
    }

    fn reader(&self, _endpoint: &str) -> Result<Arc<dyn ChainReader>, ChainError> {
        *self.readers.lock().unwrap() += 1;
        let chain = MockChain::new();
        for number in 0..=2 {
            chain.set_header(header(number));
        }
        Ok(Arc::new(chain))
    }
}
