// registry_wasm/src/app.rs

use std::fmt::Display;
use std::future::Future;
use std::rc::Rc;

use aadhaar_proof_registry::error::FlowError;
use aadhaar_proof_registry::flow::{
    SubmissionFlow, SubmissionState, VerificationErrorKind, VerificationFlow, VerificationStatus,
};
use aadhaar_proof_registry::proof::ProofRequest;
use aadhaar_proof_registry::{Error as RegistryError, RegistryConfig};
use js_sys::{Function, Promise};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::generator::JsProofGenerator;
use crate::provider::InjectedProvider;

type Flow = SubmissionFlow<InjectedProvider, JsProofGenerator>;

fn js_error(err: impl Display) -> JsValue { JsValue::from_str(&err.to_string()) }

fn to_value<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// What the page renders for the submission wizard.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowSnapshot {
    state: &'static str,
    step: u8,
    total_steps: u8,
    busy: bool,
    error: Option<String>,
    notice: Option<String>,
    account: Option<String>,
    network: Option<String>,
    proof_hash: Option<String>,
    transaction_hash: Option<String>,
    transaction_url: Option<String>,
    stored_proofs: usize,
}

fn state_tag(state: &SubmissionState) -> &'static str {
    match state {
        SubmissionState::NoWallet => "noWallet",
        SubmissionState::WalletPresent => "walletPresent",
        SubmissionState::Connected => "connected",
        SubmissionState::ProofGenerating => "proofGenerating",
        SubmissionState::ProofReady => "proofReady",
        SubmissionState::Submitting => "submitting",
        SubmissionState::Stored => "stored",
        SubmissionState::Error { .. } => "error",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificationSnapshot {
    status: &'static str,
    error_kind: Option<&'static str>,
    message: Option<String>,
    proof_hash: Option<String>,
    transaction_hash: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Download {
    file_name: String,
    contents: String,
}

#[wasm_bindgen]
pub struct RegistryApp {
    flow: Rc<Flow>,
    verifier: Rc<VerificationFlow<InjectedProvider>>,
}

impl RegistryApp {
    fn snapshot(flow: &Flow) -> FlowSnapshot {
        let state = flow.state();
        let progress = flow.progress();
        let error = match &state {
            SubmissionState::Error { message, .. } => Some(message.clone()),
            _ => flow.last_error().map(|e| e.to_string()),
        };
        FlowSnapshot {
            state: state_tag(&state),
            step: progress.step.number(),
            total_steps: progress.total,
            busy: progress.indeterminate,
            error,
            notice: flow.notice(),
            account: flow.wallet().address().map(|a| a.to_string()),
            network: flow.wallet().network_name(),
            proof_hash: flow.proof_hash().map(|h| h.to_string()),
            transaction_hash: flow.transaction_hash().map(|h| h.to_string()),
            transaction_url: flow.transaction_url(),
            stored_proofs: flow.history().len(),
        }
    }

    fn verification_snapshot(verifier: &VerificationFlow<InjectedProvider>) -> VerificationSnapshot {
        let (status, error_kind, message) = match verifier.status() {
            VerificationStatus::Idle => ("idle", None, None),
            VerificationStatus::Loading => ("loading", None, None),
            VerificationStatus::Submitting => ("submitting", None, None),
            VerificationStatus::Success => ("success", None, None),
            VerificationStatus::Error { kind, message } => {
                let kind = match kind {
                    VerificationErrorKind::InvalidFormat => "invalidFormat",
                    VerificationErrorKind::NotFoundOnChain => "notFoundOnChain",
                    VerificationErrorKind::Failure => "failure",
                };
                ("error", Some(kind), Some(message))
            }
        };
        VerificationSnapshot {
            status,
            error_kind,
            message,
            proof_hash: verifier.proof_hash().map(|h| h.to_string()),
            transaction_hash: verifier.transaction_hash().map(|h| h.to_string()),
        }
    }

    /// Runs a flow action and resolves with the resulting snapshot. Failures
    /// are already on the snapshot, so the promise only rejects on misuse.
    fn run_flow<F, Fut, T>(&self, action: F) -> Promise
    where
        F: FnOnce(Rc<Flow>) -> Fut + 'static,
        Fut: Future<Output = Result<T, RegistryError>> + 'static,
    {
        let flow = Rc::clone(&self.flow);
        future_to_promise(async move {
            if let Err(err) = action(Rc::clone(&flow)).await {
                console_log!("Submission step failed: {}", err);
                if let RegistryError::Flow(FlowError::InvalidTransition { .. }) = err {
                    return Err(js_error(err));
                }
            }
            to_value(&Self::snapshot(&flow))
        })
    }
}

#[wasm_bindgen]
impl RegistryApp {
    /// `prove` is the prover callback; `config_toml` overrides the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(prove: Function, config_toml: Option<String>) -> Result<RegistryApp, JsValue> {
        console_error_panic_hook::set_once();

        let config = match config_toml {
            Some(text) => RegistryConfig::from_toml_str(&text).map_err(js_error)?,
            None => RegistryConfig::default(),
        };
        let provider = InjectedProvider::detect().map(Rc::new);
        let flow = SubmissionFlow::from_config(
            provider,
            Rc::new(JsProofGenerator::new(prove)),
            &config,
        );
        if flow.wallet().is_installed() {
            flow.attach().map_err(js_error)?;
        } else {
            console_log!("No injected wallet found");
        }
        let verifier = VerificationFlow::new(Rc::clone(flow.contract()));
        console_log!("Registry app ready for contract {}", config.contract_address);

        Ok(RegistryApp { flow: Rc::new(flow), verifier: Rc::new(verifier) })
    }

    pub fn state(&self) -> Result<JsValue, JsValue> { to_value(&Self::snapshot(&self.flow)) }

    pub fn connect(&self) -> Promise {
        self.run_flow(|flow| async move { flow.connect().await })
    }

    #[wasm_bindgen(js_name = restoreSession)]
    pub fn restore_session(&self) -> Promise {
        self.run_flow(|flow| async move { flow.restore_session().await })
    }

    #[wasm_bindgen(js_name = generateProof)]
    pub fn generate_proof(&self, request: JsValue) -> Result<Promise, JsValue> {
        let request: ProofRequest = serde_wasm_bindgen::from_value(request)
            .map_err(|e| JsValue::from_str(&format!("Invalid proof request: {}", e)))?;
        Ok(self.run_flow(move |flow| async move { flow.generate_proof(&request).await }))
    }

    pub fn submit(&self) -> Promise {
        self.run_flow(|flow| async move { flow.submit().await })
    }

    #[wasm_bindgen(js_name = generateAndSubmit)]
    pub fn generate_and_submit(&self, request: JsValue) -> Result<Promise, JsValue> {
        let request: ProofRequest = serde_wasm_bindgen::from_value(request)
            .map_err(|e| JsValue::from_str(&format!("Invalid proof request: {}", e)))?;
        Ok(self.run_flow(move |flow| async move { flow.generate_and_submit(&request).await }))
    }

    pub fn restart(&self) -> Result<JsValue, JsValue> {
        self.flow.restart().map_err(js_error)?;
        self.state()
    }

    #[wasm_bindgen(js_name = startNewVerification)]
    pub fn start_new_verification(&self) -> Result<JsValue, JsValue> {
        self.flow.start_new_verification();
        self.state()
    }

    pub fn logout(&self) -> Result<JsValue, JsValue> {
        self.flow.logout();
        console_log!("Logged out");
        self.state()
    }

    /// `{ fileName, contents }` for the download link.
    #[wasm_bindgen(js_name = exportProof)]
    pub fn export_proof(&self) -> Result<JsValue, JsValue> {
        let export = self.flow.export().map_err(js_error)?;
        let contents = export.to_json_pretty().map_err(js_error)?;
        to_value(&Download { file_name: export.file_name(), contents })
    }

    #[wasm_bindgen(js_name = verifyFile)]
    pub fn verify_file(&self, bytes: Vec<u8>) -> Promise {
        let verifier = Rc::clone(&self.verifier);
        future_to_promise(async move {
            verifier.verify_file(&bytes).await.map_err(js_error)?;
            to_value(&Self::verification_snapshot(&verifier))
        })
    }

    #[wasm_bindgen(js_name = submitUnregistered)]
    pub fn submit_unregistered(&self) -> Promise {
        let verifier = Rc::clone(&self.verifier);
        future_to_promise(async move {
            verifier.submit_unregistered().await.map_err(js_error)?;
            to_value(&Self::verification_snapshot(&verifier))
        })
    }

    #[wasm_bindgen(js_name = verificationState)]
    pub fn verification_state(&self) -> Result<JsValue, JsValue> {
        to_value(&Self::verification_snapshot(&self.verifier))
    }

    #[wasm_bindgen(js_name = resetVerification)]
    pub fn reset_verification(&self) { self.verifier.reset(); }
}
