// registry_wasm/src/generator.rs

use aadhaar_proof_registry::error::ProofError;
use aadhaar_proof_registry::proof::{Proof, ProofGenerator, ProofRequest};
use async_trait::async_trait;
use js_sys::{Function, Promise};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// Delegates proving to a JS callback: `(request) => proof | Promise<proof>`.
/// The proof may come back as an object or as its JSON text.
pub struct JsProofGenerator {
    prove: Function,
}

impl JsProofGenerator {
    pub fn new(prove: Function) -> Self { Self { prove } }
}

fn js_message(err: &JsValue) -> String {
    err.dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| "prover failed".to_string())
}

#[async_trait(?Send)]
impl ProofGenerator for JsProofGenerator {
    async fn generate(&self, request: &ProofRequest) -> Result<Proof, ProofError> {
        let arg = request
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        let returned = self
            .prove
            .call1(&JsValue::NULL, &arg)
            .map_err(|e| ProofError::GenerationFailed(js_message(&e)))?;

        let resolved = match returned.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise)
                .await
                .map_err(|e| ProofError::GenerationFailed(js_message(&e)))?,
            Err(value) => value,
        };

        let value: Value = match resolved.as_string() {
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| ProofError::InvalidFormat(e.to_string()))?,
            None => serde_wasm_bindgen::from_value(resolved)
                .map_err(|e| ProofError::InvalidFormat(e.to_string()))?,
        };
        Proof::try_from(value)
    }
}
