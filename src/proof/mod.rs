//! Proof model.
//!
//! Proofs come from the external prover as JSON. They are validated once,
//! here, and then carried as an opaque, immutable body.

pub mod file;
pub mod generator;
pub mod hash;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProofError;

pub use file::{parse_proof_file, ProofExport, ProofFile};
pub use generator::{DisclosureField, ProofGenerator, ProofRequest};
pub use hash::compute_hash;

/// Discriminator carried in the `type` field of an Anon Aadhaar proof.
pub const ANON_AADHAAR_TYPE: &str = "anon-aadhaar";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Proof {
    AnonAadhaar(AnonAadhaarProof),
}

impl Proof {
    pub fn kind(&self) -> &'static str {
        match self {
            Proof::AnonAadhaar(_) => ANON_AADHAAR_TYPE,
        }
    }

    /// The proof exactly as the producer emitted it.
    pub fn body(&self) -> &Map<String, Value> {
        match self {
            Proof::AnonAadhaar(proof) => &proof.body,
        }
    }
}

impl TryFrom<Value> for Proof {
    type Error = ProofError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(body) = value else {
            return Err(ProofError::InvalidFormat("proof is not an object".into()));
        };
        match body.get("type").and_then(Value::as_str) {
            Some(ANON_AADHAAR_TYPE) => Ok(Proof::AnonAadhaar(AnonAadhaarProof { body })),
            Some(other) => Err(ProofError::InvalidFormat(format!("unexpected proof type {other:?}"))),
            None => Err(ProofError::InvalidFormat("missing proof type".into())),
        }
    }
}

impl From<Proof> for Value {
    fn from(proof: Proof) -> Self {
        match proof {
            Proof::AnonAadhaar(proof) => Value::Object(proof.body),
        }
    }
}

/// Attributes an Anon Aadhaar proof may disclose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disclosure {
    pub age_above_18: Option<bool>,
    pub gender: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnonAadhaarProof {
    body: Map<String, Value>,
}

impl AnonAadhaarProof {
    /// The serialized proof-carrying data, when present.
    pub fn pcd(&self) -> Option<&str> { self.body.get("pcd").and_then(Value::as_str) }

    fn pcd_proof(&self) -> Option<Map<String, Value>> {
        let pcd: Value = serde_json::from_str(self.pcd()?).ok()?;
        match pcd.get("proof")? {
            Value::Object(proof) => Some(proof.clone()),
            _ => None,
        }
    }

    pub fn nullifier(&self) -> Option<String> {
        self.pcd_proof()?.get("nullifier").map(value_text)
    }

    /// Revealed attributes. The prover encodes a hidden attribute as `"0"`.
    pub fn disclosure(&self) -> Disclosure {
        let Some(proof) = self.pcd_proof() else { return Disclosure::default() };
        let revealed = |key: &str| {
            proof.get(key).map(value_text).filter(|text| !text.is_empty() && text != "0")
        };
        Disclosure {
            age_above_18: revealed("ageAbove18").map(|text| text == "1"),
            gender: revealed("gender"),
            state: revealed("state"),
            pincode: revealed("pincode"),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
