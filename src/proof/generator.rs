//! Seam to the external prover.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProofError;
use crate::proof::Proof;

/// Attributes the user chose to reveal in the proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisclosureField {
    #[serde(rename = "revealAgeAbove18")]
    AgeAbove18,
    #[serde(rename = "revealGender")]
    Gender,
    #[serde(rename = "revealState")]
    State,
    #[serde(rename = "revealPinCode")]
    Pincode,
}

impl DisclosureField {
    pub const ALL: [DisclosureField; 4] = [
        DisclosureField::AgeAbove18,
        DisclosureField::Gender,
        DisclosureField::State,
        DisclosureField::Pincode,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DisclosureField::AgeAbove18 => "Age Verification",
            DisclosureField::Gender => "Gender",
            DisclosureField::State => "State/Region",
            DisclosureField::Pincode => "Pincode",
        }
    }
}

/// What the prover is asked to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    /// App-specific seed the prover derives the nullifier from.
    pub nullifier_seed: u64,
    /// Optional message bound into the proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(default, rename = "fieldsToReveal")]
    pub reveal: Vec<DisclosureField>,
}

impl ProofRequest {
    pub fn new(nullifier_seed: u64) -> Self {
        Self { nullifier_seed, ..Self::default() }
    }

    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    /// Adds `field` once; repeated selections are ignored.
    pub fn reveal(mut self, field: DisclosureField) -> Self {
        if !self.reveal.contains(&field) {
            self.reveal.push(field);
        }
        self
    }
}

/// Generates a proof, possibly for minutes. Callers must not block on it;
/// there is no progress or cancellation, only the final outcome.
#[async_trait(?Send)]
pub trait ProofGenerator {
    async fn generate(&self, request: &ProofRequest) -> Result<Proof, ProofError>;
}
