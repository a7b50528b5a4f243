//! Content hash of a proof, used as its on-chain key.

use alloy_primitives::keccak256;
use serde_json::Value;

use crate::proof::Proof;
use crate::types::ProofHash;

/// Compact JSON form of the proof, keys in the producer's order.
pub fn canonical_json(proof: &Proof) -> String { Value::Object(proof.body().clone()).to_string() }

/// keccak-256 over the UTF-8 bytes of [`canonical_json`].
///
/// The digest follows the producer's key order: the same fields in a
/// different order hash differently.
///
/// Numbers are written the way serde_json writes them, which is not always
/// how a JS `JSON.stringify` producer writes them. `1.0` stays `1.0` where JS
/// writes `1`, and integers beyond `u64` come out in float exponent form
/// without the `+` sign. A proof carrying such numbers can hash differently
/// here than in the producer. Anon Aadhaar proofs keep their numeric data
/// inside the `pcd` string, so they are not affected.
pub fn compute_hash(proof: &Proof) -> ProofHash {
    ProofHash(keccak256(canonical_json(proof).as_bytes()))
}
