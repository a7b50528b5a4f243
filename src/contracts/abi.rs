//! Solidity interface of the deployed proof registry.

use alloy_sol_types::sol;

use crate::types::ProofHash;

sol! {
    /// One stored entry as returned by `getUserProofs`.
    #[derive(Debug, PartialEq, Eq)]
    struct ProofRecord {
        bytes32 proofHash;
        uint256 timestamp;
        bool isValid;
    }

    function allProofs(bytes32 proofHash) external view returns (bool);
    function submitProof(bytes32 proofHash) external;
    function getUserProofs(address user) external view returns (ProofRecord[] memory);
}

/// A proof registered on-chain for some account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredProof {
    pub proof_hash: ProofHash,
    /// Block timestamp of the submission, in seconds.
    pub timestamp: u64,
    pub is_valid: bool,
}

impl From<ProofRecord> for StoredProof {
    fn from(record: ProofRecord) -> Self {
        Self {
            proof_hash: ProofHash(record.proofHash),
            timestamp: u64::try_from(record.timestamp).unwrap_or(u64::MAX),
            is_valid: record.isValid,
        }
    }
}
