//! In-memory wallet and registry used by the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use aadhaar_proof_registry::config::RegistryConfig;
use aadhaar_proof_registry::contracts::abi::{
    allProofsCall, getUserProofsCall, submitProofCall, ProofRecord,
};
use aadhaar_proof_registry::contracts::ContractGateway;
use aadhaar_proof_registry::error::{ProofError, ProviderError};
use aadhaar_proof_registry::proof::{Proof, ProofGenerator, ProofRequest};
use aadhaar_proof_registry::wallet::provider::methods;
use aadhaar_proof_registry::wallet::{
    EventKind, Listener, ListenerId, ProviderEvent, WalletGateway, WalletProvider,
};
use aadhaar_proof_registry::{Address, ChainId};
use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Value};

pub const SEPOLIA: ChainId = ChainId(11_155_111);
pub const MAINNET: ChainId = ChainId(1);

pub fn account() -> Address { Address::with_last_byte(0xa1) }

pub fn other_account() -> Address { Address::with_last_byte(0xb2) }

/// Fast polling so receipt waits stay short.
pub fn test_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.receipt_poll_interval_ms = 1;
    config
}

pub struct MockWallet {
    pub accounts: RefCell<Vec<Address>>,
    /// Whether `eth_accounts` reports the accounts without a prompt.
    pub authorized: Cell<bool>,
    pub chain: Cell<ChainId>,
    pub known_chains: RefCell<HashSet<u64>>,
    pub reject_accounts: Cell<bool>,
    pub reject_switch: Cell<bool>,
    pub reject_transactions: Cell<bool>,
    /// Runtime code at the registry address; `"0x"` means nothing deployed.
    pub code: RefCell<String>,
    /// When false, every `eth_call` returns empty data.
    pub implements_interface: Cell<bool>,
    /// Receipt polls answered with `null` before the receipt shows up.
    pub pending_polls: Cell<u32>,
    /// Clears the accounts as soon as a transaction is sent.
    pub disconnect_on_send: Cell<bool>,
    registry: RefCell<HashSet<B256>>,
    user_proofs: RefCell<HashMap<Address, Vec<ProofRecord>>>,
    receipts: RefCell<HashMap<B256, bool>>,
    sent: Cell<u64>,
    log: RefCell<Vec<String>>,
    listeners: RefCell<Vec<(ListenerId, EventKind, Listener)>>,
    next_listener: Cell<ListenerId>,
}

impl MockWallet {
    /// One account, on Sepolia, with a working registry deployed.
    pub fn new() -> Self {
        Self {
            accounts: RefCell::new(vec![account()]),
            authorized: Cell::new(false),
            chain: Cell::new(SEPOLIA),
            known_chains: RefCell::new([MAINNET.0, SEPOLIA.0].into_iter().collect()),
            reject_accounts: Cell::new(false),
            reject_switch: Cell::new(false),
            reject_transactions: Cell::new(false),
            code: RefCell::new("0x6080604052".to_string()),
            implements_interface: Cell::new(true),
            pending_polls: Cell::new(0),
            disconnect_on_send: Cell::new(false),
            registry: RefCell::new(HashSet::new()),
            user_proofs: RefCell::new(HashMap::new()),
            receipts: RefCell::new(HashMap::new()),
            sent: Cell::new(0),
            log: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
        }
    }

    pub fn on_chain(self, chain: ChainId) -> Self {
        self.chain.set(chain);
        self
    }

    pub fn requests(&self) -> Vec<String> { self.log.borrow().clone() }

    pub fn count(&self, method: &str) -> usize {
        self.log.borrow().iter().filter(|m| m.as_str() == method).count()
    }

    pub fn clear_log(&self) { self.log.borrow_mut().clear(); }

    pub fn registered(&self) -> usize { self.registry.borrow().len() }

    pub fn listener_count(&self) -> usize { self.listeners.borrow().len() }

    /// Delivers `event` to every matching listener, as the wallet would.
    pub fn emit(&self, event: ProviderEvent) {
        if let ProviderEvent::AccountsChanged(accounts) = &event {
            *self.accounts.borrow_mut() = accounts.clone();
        }
        let targets: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, kind, _)| *kind == event.kind())
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        for listener in targets {
            listener(&event);
        }
    }

    fn accounts_json(&self) -> Value {
        json!(self.accounts.borrow().iter().map(|a| a.to_string()).collect::<Vec<_>>())
    }

    fn call(&self, params: &Value) -> Result<Value, ProviderError> {
        if !self.implements_interface.get() {
            return Ok(json!("0x"));
        }
        let data = calldata(params)?;
        let output = if data.starts_with(&allProofsCall::SELECTOR) {
            let call = allProofsCall::abi_decode(&data, true).map_err(revert)?;
            let exists = self.registry.borrow().contains(&call.proofHash);
            allProofsCall::abi_encode_returns(&(exists,))
        } else if data.starts_with(&getUserProofsCall::SELECTOR) {
            let call = getUserProofsCall::abi_decode(&data, true).map_err(revert)?;
            let records = self.user_proofs.borrow().get(&call.user).cloned().unwrap_or_default();
            getUserProofsCall::abi_encode_returns(&(records,))
        } else {
            return Err(ProviderError::new(-32000, "execution reverted"));
        };
        Ok(json!(format!("0x{}", hex::encode(output))))
    }

    fn send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        if self.reject_transactions.get() {
            return Err(ProviderError::new(
                4001,
                "MetaMask Tx Signature: User denied transaction signature.",
            ));
        }
        let from: Address = params[0]["from"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ProviderError::new(-32602, "missing from"))?;
        let call = submitProofCall::abi_decode(&calldata(params)?, true).map_err(revert)?;

        let nonce = self.sent.get() + 1;
        self.sent.set(nonce);
        let tx_hash = keccak256(nonce.to_be_bytes());

        let fresh = self.registry.borrow_mut().insert(call.proofHash);
        if fresh {
            self.user_proofs.borrow_mut().entry(from).or_default().push(ProofRecord {
                proofHash: call.proofHash,
                timestamp: U256::from(1_700_000_000u64 + nonce),
                isValid: true,
            });
        }
        // resubmitting a known hash reverts on chain
        self.receipts.borrow_mut().insert(tx_hash, fresh);

        if self.disconnect_on_send.get() {
            self.emit(ProviderEvent::AccountsChanged(Vec::new()));
        }
        Ok(json!(tx_hash.to_string()))
    }

    fn receipt(&self, params: &Value) -> Result<Value, ProviderError> {
        let pending = self.pending_polls.get();
        if pending > 0 {
            self.pending_polls.set(pending - 1);
            return Ok(Value::Null);
        }
        let tx_hash: B256 = params[0]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ProviderError::new(-32602, "invalid transaction hash"))?;
        Ok(match self.receipts.borrow().get(&tx_hash) {
            Some(success) => json!({
                "transactionHash": tx_hash.to_string(),
                "status": if *success { "0x1" } else { "0x0" },
            }),
            None => Value::Null,
        })
    }

    fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        if self.reject_switch.get() {
            return Err(ProviderError::user_rejected());
        }
        let requested = params[0]["chainId"].as_str().unwrap_or_default().to_string();
        let chain = ChainId::from_hex_quantity(&requested)
            .ok_or_else(|| ProviderError::new(-32602, "invalid chain id"))?;
        if !self.known_chains.borrow().contains(&chain.0) {
            return Err(ProviderError::unrecognized_chain(&requested));
        }
        self.chain.set(chain);
        self.emit(ProviderEvent::ChainChanged(chain));
        Ok(Value::Null)
    }

    fn add_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        if self.reject_switch.get() {
            return Err(ProviderError::user_rejected());
        }
        let chain = params[0]["chainId"]
            .as_str()
            .and_then(ChainId::from_hex_quantity)
            .ok_or_else(|| ProviderError::new(-32602, "invalid chain id"))?;
        self.known_chains.borrow_mut().insert(chain.0);
        Ok(Value::Null)
    }
}

#[async_trait(?Send)]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.log.borrow_mut().push(method.to_string());
        match method {
            methods::REQUEST_ACCOUNTS => {
                if self.reject_accounts.get() {
                    return Err(ProviderError::user_rejected());
                }
                self.authorized.set(true);
                Ok(self.accounts_json())
            }
            methods::ACCOUNTS if self.authorized.get() => Ok(self.accounts_json()),
            methods::ACCOUNTS => Ok(json!([])),
            methods::CHAIN_ID => Ok(json!(self.chain.get().to_hex_quantity())),
            methods::SWITCH_CHAIN => self.switch_chain(&params),
            methods::ADD_CHAIN => self.add_chain(&params),
            methods::GET_CODE => Ok(json!(self.code.borrow().clone())),
            methods::CALL => self.call(&params),
            methods::SEND_TRANSACTION => self.send_transaction(&params),
            methods::TRANSACTION_RECEIPT => self.receipt(&params),
            other => Err(ProviderError::new(-32601, format!("method {other} not supported"))),
        }
    }

    fn on(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push((id, kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(existing, _, _)| *existing != id);
    }

    async fn pause(&self, _interval: Duration) { tokio::task::yield_now().await; }
}

fn calldata(params: &Value) -> Result<Vec<u8>, ProviderError> {
    let data = params[0]["data"].as_str().unwrap_or_default();
    hex::decode(data.trim_start_matches("0x")).map_err(|e| ProviderError::new(-32602, e.to_string()))
}

fn revert(err: alloy_sol_types::Error) -> ProviderError {
    ProviderError::new(-32000, format!("execution reverted: {err}"))
}

pub fn proof_value(nullifier: &str) -> Value {
    let pcd = json!({
        "type": "anon-aadhaar",
        "id": "c0ffee",
        "claim": { "pubKey": ["1", "2"], "signalHash": "7", "nullifierSeed": "1234" },
        "proof": {
            "nullifier": nullifier,
            "ageAbove18": "1",
            "gender": "77",
            "state": "0",
            "pincode": "0",
        },
    });
    json!({ "type": "anon-aadhaar", "pcd": pcd.to_string() })
}

pub fn sample_proof(nullifier: &str) -> Proof {
    Proof::try_from(proof_value(nullifier)).expect("sample proof is valid")
}

/// Prover double: answers with a fixed proof or a fixed failure.
pub struct StaticGenerator {
    pub outcome: RefCell<Result<Proof, ProofError>>,
    pub requests: RefCell<Vec<ProofRequest>>,
    /// Emitted on the wallet while "generating", to simulate the user
    /// disconnecting mid-flight.
    pub interrupt: RefCell<Option<(Rc<MockWallet>, ProviderEvent)>>,
}

impl StaticGenerator {
    pub fn succeeding(proof: Proof) -> Self {
        Self {
            outcome: RefCell::new(Ok(proof)),
            requests: RefCell::new(Vec::new()),
            interrupt: RefCell::new(None),
        }
    }

    pub fn failing(reason: &str) -> Self {
        let gen = Self::succeeding(sample_proof("0"));
        *gen.outcome.borrow_mut() = Err(ProofError::GenerationFailed(reason.to_string()));
        gen
    }
}

#[async_trait(?Send)]
impl ProofGenerator for StaticGenerator {
    async fn generate(&self, request: &ProofRequest) -> Result<Proof, ProofError> {
        self.requests.borrow_mut().push(request.clone());
        tokio::task::yield_now().await;
        let interrupt = self.interrupt.borrow_mut().take();
        if let Some((wallet, event)) = interrupt {
            wallet.emit(event);
        }
        self.outcome.borrow().clone()
    }
}

pub struct Harness {
    pub mock: Rc<MockWallet>,
    pub wallet: Rc<WalletGateway<MockWallet>>,
    pub contract: Rc<ContractGateway<MockWallet>>,
}

impl Harness {
    pub fn new(mock: MockWallet) -> Self {
        let config = test_config();
        let mock = Rc::new(mock);
        let wallet = Rc::new(WalletGateway::new(Some(Rc::clone(&mock)), config.network.clone()));
        let contract = Rc::new(ContractGateway::from_config(Rc::clone(&wallet), &config));
        Self { mock, wallet, contract }
    }
}
