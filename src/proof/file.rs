//! Exported and imported proof files.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProofError;
use crate::proof::Proof;
use crate::types::{Address, TxHash};

/// Downloadable record of a stored proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofExport {
    pub proof: Proof,
    pub transaction_hash: TxHash,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub network: String,
    pub contract: Address,
}

impl ProofExport {
    pub fn new(proof: Proof, transaction_hash: TxHash, network: String, contract: Address) -> Self {
        Self {
            proof,
            transaction_hash,
            timestamp: Utc::now().timestamp_millis(),
            network,
            contract,
        }
    }

    pub fn file_name(&self) -> String { format!("anon-aadhaar-proof-{}.json", self.timestamp) }

    /// Two-space indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, ProofError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// An uploaded proof file. Only `proof` is required; the rest is whatever
/// metadata the exporter wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofFile {
    pub proof: Proof,
    pub transaction_hash: Option<String>,
    pub timestamp: Option<i64>,
    pub network: Option<String>,
    pub contract: Option<String>,
}

/// Validates an uploaded file before anything else looks at it.
pub fn parse_proof_file(bytes: &[u8]) -> Result<ProofFile, ProofError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ProofError::InvalidFormat(format!("not valid JSON: {e}")))?;
    let Value::Object(mut fields) = value else {
        return Err(ProofError::InvalidFormat("file is not a JSON object".into()));
    };
    let proof = fields
        .remove("proof")
        .ok_or_else(|| ProofError::InvalidFormat("missing proof".into()))?;
    let proof = Proof::try_from(proof)?;

    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);
    Ok(ProofFile {
        proof,
        transaction_hash: text("transactionHash"),
        timestamp: fields.get("timestamp").and_then(Value::as_i64),
        network: text("network"),
        contract: text("contract"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::compute_hash;
    use crate::proof::tests::sample_proof;

    fn sample_export() -> ProofExport {
        ProofExport {
            proof: sample_proof(),
            transaction_hash: TxHash::from([0x5au8; 32]),
            timestamp: 1_700_000_000_123,
            network: "sepolia".to_string(),
            contract: Address::with_last_byte(0x60),
        }
    }

    #[test]
    fn test_export_layout() {
        let export = sample_export();
        let json = export.to_json_pretty().unwrap();
        assert!(json.starts_with("{\n  \"proof\": {"));
        assert!(json.contains("\"transactionHash\": \"0x5a5a"));
        assert!(json.contains("\"timestamp\": 1700000000123"));
        assert_eq!(export.file_name(), "anon-aadhaar-proof-1700000000123.json");
    }

    #[test]
    fn test_exported_file_reimports_with_same_hash() {
        let export = sample_export();
        let file = parse_proof_file(export.to_json_pretty().unwrap().as_bytes()).unwrap();
        assert_eq!(compute_hash(&file.proof), compute_hash(&export.proof));
        assert_eq!(file.transaction_hash, Some(export.transaction_hash.to_string()));
        assert_eq!(file.timestamp, Some(export.timestamp));
        assert_eq!(file.network.as_deref(), Some("sepolia"));
    }

    #[test]
    fn test_minimal_file() {
        let file = parse_proof_file(br#"{"proof":{"type":"anon-aadhaar","pcd":"{}"}}"#).unwrap();
        assert_eq!(file.transaction_hash, None);
        assert_eq!(file.contract, None);
    }

    #[test]
    fn test_rejects_bad_files() {
        let cases: [&[u8]; 5] = [
            b"not json",
            b"[1,2,3]",
            br#"{"transactionHash":"0x01"}"#,
            br#"{"proof":{"type":"groth16"}}"#,
            br#"{"type":"anon-aadhaar","pcd":"{}"}"#,
        ];
        for case in cases {
            let err = parse_proof_file(case).unwrap_err();
            assert!(matches!(err, ProofError::InvalidFormat(_)), "{err:?}");
        }
    }

    #[test]
    fn test_new_stamps_current_time() {
        let before = Utc::now().timestamp_millis();
        let export = ProofExport::new(
            sample_proof(),
            TxHash::from([1u8; 32]),
            "sepolia".into(),
            Address::ZERO,
        );
        assert!(export.timestamp >= before);
    }
}
