//! The injected wallet provider seam (EIP-1193).
//!
//! The registry never implements a provider; hosts hand one in. In the
//! browser that is `window.ethereum`, in tests an in-memory double.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ProviderError, WalletError};
use crate::types::{Address, ChainId};

/// JSON-RPC methods the gateways issue.
pub mod methods {
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const CHAIN_ID: &str = "eth_chainId";
    pub const SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
    pub const ADD_CHAIN: &str = "wallet_addEthereumChain";
    pub const GET_CODE: &str = "eth_getCode";
    pub const CALL: &str = "eth_call";
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
}

pub type ListenerId = u64;

/// Callback registered with the provider for one event kind.
pub type Listener = Rc<dyn Fn(&ProviderEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
}

impl EventKind {
    /// Event name as used by `provider.on(...)`.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::AccountsChanged => "accountsChanged",
            EventKind::ChainChanged => "chainChanged",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::AccountsChanged(_) => EventKind::AccountsChanged,
            ProviderEvent::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

#[async_trait(?Send)]
pub trait WalletProvider {
    /// Issues one JSON-RPC request; `params` is the positional array.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn on(&self, kind: EventKind, listener: Listener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Waits between receipt polls. Browser providers override this with a
    /// timer of their own.
    async fn pause(&self, interval: Duration) {
        #[cfg(not(target_arch = "wasm32"))]
        tokio::time::sleep(interval).await;
        #[cfg(target_arch = "wasm32")]
        let _ = interval;
    }
}

/// Parses the account list returned by `eth_accounts`/`eth_requestAccounts`
/// or carried by `accountsChanged`.
pub fn parse_accounts(value: &Value) -> Result<Vec<Address>, WalletError> {
    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        other => {
            return Err(WalletError::InvalidResponse(format!("expected account list, got {other}")))
        }
    };
    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| WalletError::InvalidResponse(format!("invalid account {entry}")))
        })
        .collect()
}

pub fn parse_chain_id(value: &Value) -> Result<ChainId, WalletError> {
    match value {
        Value::String(s) => ChainId::from_hex_quantity(s)
            .ok_or_else(|| WalletError::InvalidResponse(format!("invalid chain id {s:?}"))),
        Value::Number(n) => n
            .as_u64()
            .map(ChainId)
            .ok_or_else(|| WalletError::InvalidResponse(format!("invalid chain id {n}"))),
        other => Err(WalletError::InvalidResponse(format!("invalid chain id {other}"))),
    }
}
