//! Error types for the proof registry
//!
//! Failures are grouped by the component that raises them. The `Display`
//! text of every variant is the message shown to the user, so each one is
//! distinct and readable on its own.

use thiserror::Error;

use crate::logging::LoggingError;
use crate::types::Address;

/// Error code an EIP-1193 provider returns when the user declines a request.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Error code returned by `wallet_switchEthereumChain` for a chain the wallet
/// does not know yet.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// The main error type for the registry library
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Wallet-related errors
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Contract-related errors
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Proof parsing, hashing and generation errors
    #[error(transparent)]
    Proof(#[from] ProofError),

    /// State machine misuse
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Subscriber setup errors
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// A raw failure reported by the injected provider.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn unrecognized_chain(chain_id_hex: &str) -> Self {
        Self::new(
            UNRECOGNIZED_CHAIN_CODE,
            format!("Unrecognized chain ID \"{chain_id_hex}\"."),
        )
    }

    /// Whether the user declined the request, by code or by message for
    /// providers that only report text.
    pub fn is_user_rejection(&self) -> bool {
        if self.code == USER_REJECTED_CODE {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("user rejected") || message.contains("user denied")
    }

    pub fn is_unrecognized_chain(&self) -> bool { self.code == UNRECOGNIZED_CHAIN_CODE }
}

/// Errors raised by the wallet gateway
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum WalletError {
    #[error("MetaMask is not installed")]
    NotInstalled,

    #[error("User rejected the connection request")]
    UserRejected,

    #[error("No accounts found")]
    NoAccounts,

    #[error("Please switch to {0} network in your wallet")]
    WrongNetwork(String),

    #[error("User rejected network switch to {0}")]
    NetworkSwitchRejected(String),

    /// The provider answered with something the gateway cannot interpret
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors raised by the contract gateway
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ContractError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("Smart contract not found at {0}. Please verify contract deployment.")]
    ContractNotFound(Address),

    #[error("Invalid contract interface. Please verify contract address and deployment: {0}")]
    InvalidContractInterface(String),

    #[error("Transaction was rejected. Please approve the transaction to submit your proof.")]
    TransactionRejected,

    #[error("Failed to submit proof: {0}")]
    SubmissionFailed(String),

    /// A read call failed or returned undecodable data
    #[error("Contract call failed: {0}")]
    Call(String),
}

/// Errors about proofs and proof files
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProofError {
    #[error("Invalid proof format. Must be an Anon Aadhaar proof.{}", detail_suffix(.0))]
    InvalidFormat(String),

    #[error("This proof has not been submitted to the blockchain yet.")]
    NotFoundOnChain,

    #[error("Failed to verify identity: {0}")]
    GenerationFailed(String),

    #[error("Proof serialization failed: {0}")]
    Serialization(String),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}

impl From<serde_json::Error> for ProofError {
    fn from(err: serde_json::Error) -> Self { ProofError::Serialization(err.to_string()) }
}

/// Errors raised when a flow action does not fit the current state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlowError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: String, action: &'static str },

    #[error("No stored proof with a transaction is available to export")]
    NothingToExport,

    /// The wallet disconnected while the action was in flight
    #[error("Wallet disconnected before {0} finished")]
    Interrupted(&'static str),
}

/// Errors raised while loading or saving configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self { ConfigError::Io(err.to_string()) }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self { ConfigError::Parse(err.to_string()) }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
