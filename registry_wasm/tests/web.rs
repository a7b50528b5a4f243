use std::rc::Rc;

use aadhaar_proof_registry::error::{ProofError, WalletError};
use aadhaar_proof_registry::proof::{ProofGenerator, ProofRequest};
use aadhaar_proof_registry::wallet::WalletGateway;
use aadhaar_proof_registry::{Address, ChainId, NetworkDescriptor};
use js_sys::Function;
use registry_wasm::provider::provider_error;
use registry_wasm::{InjectedProvider, JsProofGenerator};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

/// A minimal `window.ethereum` stand-in on Sepolia with one account.
fn fake_ethereum(reject_accounts: bool) -> JsValue {
    let body = format!(
        "return {{
            listeners: [],
            request(args) {{
                switch (args.method) {{
                    case 'eth_requestAccounts':
                        return {reject}
                            ? Promise.reject({{ code: 4001, message: 'User rejected the request.' }})
                            : Promise.resolve(['0x00000000000000000000000000000000000000a1']);
                    case 'eth_chainId':
                        return Promise.resolve('0xaa36a7');
                    default:
                        return Promise.reject({{ code: -32601, message: 'unsupported' }});
                }}
            }},
            on(name, cb) {{ this.listeners.push([name, cb]); }},
            removeListener(name, cb) {{
                this.listeners = this.listeners.filter(([n, c]) => n !== name || c !== cb);
            }},
        }};",
        reject = reject_accounts
    );
    Function::new_no_args(&body).call0(&JsValue::NULL).expect("fake provider")
}

fn gateway(ethereum: JsValue) -> WalletGateway<InjectedProvider> {
    WalletGateway::new(Some(Rc::new(InjectedProvider::new(ethereum))), NetworkDescriptor::sepolia())
}

#[wasm_bindgen_test]
async fn test_connect_through_injected_provider() {
    let wallet = gateway(fake_ethereum(false));

    let address = wallet.connect().await.expect("connect should succeed");

    assert_eq!(address, Address::with_last_byte(0xa1));
    assert_eq!(wallet.connection().chain_id, Some(ChainId(11_155_111)));
}

#[wasm_bindgen_test]
async fn test_rejection_code_survives_the_bridge() {
    let wallet = gateway(fake_ethereum(true));

    let err = wallet.connect().await.unwrap_err();

    assert_eq!(err, WalletError::UserRejected);
}

#[wasm_bindgen_test]
fn test_listeners_are_removed_with_the_subscription() {
    let ethereum = fake_ethereum(false);
    let wallet = gateway(ethereum.clone());
    let count = || {
        let listeners = js_sys::Reflect::get(&ethereum, &JsValue::from_str("listeners")).unwrap();
        js_sys::Array::from(&listeners).length()
    };

    let subscription = wallet.subscribe(|_| {}).expect("subscribe");
    assert_eq!(count(), 2);

    drop(subscription);
    assert_eq!(count(), 0);
}

#[wasm_bindgen_test]
fn test_provider_error_fields() {
    let err = Function::new_no_args("return { code: 4902, message: 'Unrecognized chain ID' };")
        .call0(&JsValue::NULL)
        .unwrap();
    let converted = provider_error(err);
    assert!(converted.is_unrecognized_chain());

    let bare = provider_error(JsValue::from_str("boom"));
    assert_eq!(bare.message, "boom");
}

#[wasm_bindgen_test]
async fn test_js_prover_returns_proof() {
    let prove = Function::new_with_args(
        "request",
        "return Promise.resolve({ type: 'anon-aadhaar', pcd: JSON.stringify({ seed: request.nullifierSeed }) });",
    );
    let generator = JsProofGenerator::new(prove);

    let proof = generator.generate(&ProofRequest::new(42)).await.expect("proof");

    assert_eq!(proof.kind(), "anon-aadhaar");
}

#[wasm_bindgen_test]
async fn test_js_prover_failure() {
    let prove = Function::new_with_args("request", "return Promise.reject(new Error('no QR code'));");
    let generator = JsProofGenerator::new(prove);

    let err = generator.generate(&ProofRequest::new(42)).await.unwrap_err();

    assert_eq!(err, ProofError::GenerationFailed("no QR code".into()));
}
