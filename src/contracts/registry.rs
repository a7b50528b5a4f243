//! Contract gateway for the proof registry.
//!
//! Binds the fixed ABI to the configured address through the wallet
//! gateway, which already owns the provider and the network assertion.

use std::rc::Rc;
use std::time::Duration;

use alloy_sol_types::SolCall;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::contracts::abi::{allProofsCall, getUserProofsCall, submitProofCall, StoredProof};
use crate::error::{ContractError, WalletError};
use crate::types::{Address, ProofHash, TxHash, B256};
use crate::wallet::provider::{methods, WalletProvider};
use crate::wallet::WalletGateway;

/// Outcome of a submission. `transaction_hash` is `None` when the hash was
/// already registered and nothing was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionResult {
    pub proof_hash: ProofHash,
    pub transaction_hash: Option<TxHash>,
}

impl SubmissionResult {
    pub fn already_existed(&self) -> bool { self.transaction_hash.is_none() }
}

/// A contract bound to a signer after a successful initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractHandle {
    pub address: Address,
    pub signer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Receipt {
    transaction_hash: TxHash,
    success: bool,
}

pub struct ContractGateway<P: WalletProvider> {
    wallet: Rc<WalletGateway<P>>,
    address: Address,
    poll_interval: Duration,
    handle: OnceCell<ContractHandle>,
}

impl<P: WalletProvider + 'static> ContractGateway<P> {
    pub fn new(wallet: Rc<WalletGateway<P>>, address: Address, poll_interval: Duration) -> Self {
        Self { wallet, address, poll_interval, handle: OnceCell::new() }
    }

    pub fn from_config(wallet: Rc<WalletGateway<P>>, config: &RegistryConfig) -> Self {
        Self::new(wallet, config.contract_address, config.receipt_poll_interval())
    }

    pub fn address(&self) -> Address { self.address }

    pub fn wallet(&self) -> &Rc<WalletGateway<P>> { &self.wallet }

    pub fn handle(&self) -> Option<&ContractHandle> { self.handle.get() }

    /// Asserts the network, checks that code is deployed at the address
    /// and probes the interface. Concurrent callers share one attempt; a
    /// failed attempt can be retried.
    pub async fn initialize(&self) -> Result<&ContractHandle, ContractError> {
        self.handle.get_or_try_init(|| self.bind()).await
    }

    /// The bound handle, with the wallet back on the registry network. The
    /// chain can change at any time after binding, so every contract access
    /// checks it again.
    async fn ready(&self) -> Result<ContractHandle, ContractError> {
        let bound = self.handle.get().is_some();
        let handle = *self.initialize().await?;
        if bound {
            self.wallet.assert_network().await?;
        }
        Ok(handle)
    }

    async fn bind(&self) -> Result<ContractHandle, ContractError> {
        let signer = match self.wallet.address() {
            Some(address) => {
                self.wallet.assert_network().await?;
                address
            }
            None => self.wallet.connect().await?,
        };

        let code = self
            .wallet
            .request(methods::GET_CODE, json!([self.address, "latest"]))
            .await?;
        let code = code.as_str().unwrap_or_default();
        if code.is_empty() || code == "0x" {
            warn!(address = %self.address, "no contract code at address");
            return Err(ContractError::ContractNotFound(self.address));
        }

        let probe = allProofsCall { proofHash: B256::ZERO }.abi_encode();
        let output = self
            .call(probe)
            .await
            .map_err(|e| ContractError::InvalidContractInterface(e.to_string()))?;
        allProofsCall::abi_decode_returns(&output, true)
            .map_err(|e| ContractError::InvalidContractInterface(e.to_string()))?;

        info!(address = %self.address, %signer, "registry contract bound");
        Ok(ContractHandle { address: self.address, signer })
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, ContractError> {
        let params = json!([
            { "to": self.address, "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let output = self.wallet.request(methods::CALL, params).await.map_err(call_failure)?;
        decode_hex_bytes(&output).map_err(ContractError::Call)
    }

    /// Whether `hash` is registered. Read-only.
    pub async fn exists_proof(&self, hash: &ProofHash) -> Result<bool, ContractError> {
        self.ready().await?;
        self.lookup(hash).await
    }

    async fn lookup(&self, hash: &ProofHash) -> Result<bool, ContractError> {
        let output = self.call(allProofsCall { proofHash: hash.to_b256() }.abi_encode()).await?;
        let exists = allProofsCall::abi_decode_returns(&output, true)
            .map_err(|e| ContractError::Call(e.to_string()))?
            ._0;
        debug!(%hash, exists, "proof existence checked");
        Ok(exists)
    }

    /// Registers `hash` unless it is already known, then waits for the
    /// transaction to be mined.
    pub async fn submit_proof(&self, hash: &ProofHash) -> Result<SubmissionResult, ContractError> {
        let handle = self.ready().await?;

        if self.lookup(hash).await? {
            info!(%hash, "proof already registered, nothing to submit");
            return Ok(SubmissionResult { proof_hash: *hash, transaction_hash: None });
        }

        // the session may have switched accounts since the handle was bound
        let from = self.wallet.address().unwrap_or(handle.signer);
        let data = submitProofCall { proofHash: hash.to_b256() }.abi_encode();
        let params = json!([{
            "from": from,
            "to": handle.address,
            "data": format!("0x{}", hex::encode(data)),
        }]);
        let sent = self
            .wallet
            .request(methods::SEND_TRANSACTION, params)
            .await
            .map_err(submission_failure)?;
        let tx_hash: TxHash = sent
            .as_str()
            .ok_or_else(|| ContractError::SubmissionFailed(format!("unexpected response {sent}")))?
            .parse()
            .map_err(ContractError::SubmissionFailed)?;
        info!(%hash, %tx_hash, "proof submission sent");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.success {
            warn!(%tx_hash, "proof submission reverted");
            return Err(ContractError::SubmissionFailed(format!(
                "transaction {tx_hash} reverted"
            )));
        }

        info!(%hash, tx_hash = %receipt.transaction_hash, "proof registered");
        Ok(SubmissionResult { proof_hash: *hash, transaction_hash: Some(receipt.transaction_hash) })
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, ContractError> {
        loop {
            let value = self
                .wallet
                .request(methods::TRANSACTION_RECEIPT, json!([tx_hash]))
                .await
                .map_err(submission_failure)?;
            if let Some(receipt) = parse_receipt(&value, tx_hash)? {
                return Ok(receipt);
            }
            debug!(%tx_hash, "transaction pending");
            self.wallet.pause(self.poll_interval).await;
        }
    }

    /// All proofs registered by `user`, in contract order.
    pub async fn list_user_proofs(&self, user: Address) -> Result<Vec<StoredProof>, ContractError> {
        self.ready().await?;
        let output = self.call(getUserProofsCall { user }.abi_encode()).await?;
        let records = getUserProofsCall::abi_decode_returns(&output, true)
            .map_err(|e| ContractError::Call(e.to_string()))?
            ._0;
        Ok(records.into_iter().map(StoredProof::from).collect())
    }
}

fn call_failure(err: WalletError) -> ContractError {
    match err {
        WalletError::Provider(e) => ContractError::Call(e.message),
        other => ContractError::Wallet(other),
    }
}

fn submission_failure(err: WalletError) -> ContractError {
    match err {
        WalletError::Provider(e) if e.is_user_rejection() => ContractError::TransactionRejected,
        WalletError::Provider(e) => ContractError::SubmissionFailed(e.message),
        other => ContractError::Wallet(other),
    }
}

fn decode_hex_bytes(value: &Value) -> Result<Vec<u8>, String> {
    let s = value.as_str().ok_or_else(|| format!("expected hex data, got {value}"))?;
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| format!("invalid hex data: {e}"))
}

/// `None` while the transaction is pending.
fn parse_receipt(value: &Value, requested: TxHash) -> Result<Option<Receipt>, ContractError> {
    if value.is_null() {
        return Ok(None);
    }
    let transaction_hash = match value.get("transactionHash").and_then(Value::as_str) {
        Some(s) => s.parse().map_err(ContractError::SubmissionFailed)?,
        None => requested,
    };
    // Pre-Byzantium receipts carry no status; treat them as successful.
    let success = match value.get("status").and_then(Value::as_str) {
        Some(status) => status != "0x0",
        None => true,
    };
    Ok(Some(Receipt { transaction_hash, success }))
}
