// ./src/lib.rs

pub mod config;
pub mod contracts;
pub mod error;
pub mod flow;
pub mod logging;
pub mod proof;
pub mod types;
pub mod wallet;

pub use config::{NetworkDescriptor, RegistryConfig};
pub use contracts::{ContractGateway, StoredProof, SubmissionResult};
pub use error::{Error, Result};
pub use flow::{SubmissionFlow, SubmissionState, VerificationFlow, VerificationStatus};
pub use logging::{init_logging, LogConfig};
pub use proof::{compute_hash, Proof, ProofGenerator, ProofRequest};
pub use types::{Address, ChainId, ProofHash, TxHash};
pub use wallet::{WalletGateway, WalletProvider};
