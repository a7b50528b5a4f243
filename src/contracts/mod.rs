pub mod abi;
pub mod registry;

pub use abi::StoredProof;
pub use registry::{ContractGateway, ContractHandle, SubmissionResult};
