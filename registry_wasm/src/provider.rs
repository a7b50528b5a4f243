// registry_wasm/src/provider.rs

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use aadhaar_proof_registry::error::ProviderError;
use aadhaar_proof_registry::wallet::provider::parse_accounts;
use aadhaar_proof_registry::wallet::{
    EventKind, Listener, ListenerId, ProviderEvent, WalletProvider,
};
use aadhaar_proof_registry::ChainId;
use async_trait::async_trait;
use js_sys::{Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// Code used when a JS failure carries no numeric code.
const INTERNAL_ERROR: i64 = -32603;

/// The EIP-1193 provider a wallet extension injects as `window.ethereum`.
pub struct InjectedProvider {
    ethereum: JsValue,
    listeners: RefCell<HashMap<ListenerId, (EventKind, Closure<dyn FnMut(JsValue)>)>>,
    next_id: Cell<ListenerId>,
}

impl InjectedProvider {
    /// `None` when no wallet extension is installed.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            return None;
        }
        Some(Self::new(ethereum))
    }

    pub fn new(ethereum: JsValue) -> Self {
        Self { ethereum, listeners: RefCell::new(HashMap::new()), next_id: Cell::new(1) }
    }

    fn method(&self, name: &str) -> Result<Function, ProviderError> {
        Reflect::get(&self.ethereum, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| ProviderError::new(INTERNAL_ERROR, format!("provider has no {name}()")))
    }
}

/// Converts a rejected provider promise into a `ProviderError`.
pub fn provider_error(err: JsValue) -> ProviderError {
    let code = Reflect::get(&err, &JsValue::from_str("code"))
        .ok()
        .and_then(|c| c.as_f64())
        .map(|c| c as i64)
        .unwrap_or(INTERNAL_ERROR);
    let message = Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| "provider request failed".to_string());
    ProviderError::new(code, message)
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, ProviderError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| ProviderError::new(INTERNAL_ERROR, e.to_string()))
}

fn event_from_js(kind: EventKind, payload: JsValue) -> Option<ProviderEvent> {
    match kind {
        EventKind::AccountsChanged => {
            let value: Value = serde_wasm_bindgen::from_value(payload).ok()?;
            parse_accounts(&value).ok().map(ProviderEvent::AccountsChanged)
        }
        EventKind::ChainChanged => payload
            .as_string()
            .and_then(|s| ChainId::from_hex_quantity(&s))
            .map(ProviderEvent::ChainChanged),
    }
}

#[async_trait(?Send)]
impl WalletProvider for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let args = Object::new();
        Reflect::set(&args, &JsValue::from_str("method"), &JsValue::from_str(method))
            .map_err(provider_error)?;
        Reflect::set(&args, &JsValue::from_str("params"), &to_js(&params)?)
            .map_err(provider_error)?;

        let returned = self.method("request")?.call1(&self.ethereum, &args).map_err(provider_error)?;
        let promise: Promise = returned
            .dyn_into()
            .map_err(|_| ProviderError::new(INTERNAL_ERROR, "request() did not return a promise"))?;
        let result = JsFuture::from(promise).await.map_err(provider_error)?;
        serde_wasm_bindgen::from_value(result)
            .map_err(|e| ProviderError::new(INTERNAL_ERROR, e.to_string()))
    }

    fn on(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let callback = Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
            if let Some(event) = event_from_js(kind, payload) {
                listener(&event);
            }
        });
        if let Ok(on) = self.method("on") {
            let _ = on.call2(&self.ethereum, &JsValue::from_str(kind.name()), callback.as_ref());
        }
        self.listeners.borrow_mut().insert(id, (kind, callback));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let Some((kind, callback)) = self.listeners.borrow_mut().remove(&id) else { return };
        if let Ok(remove) = self.method("removeListener") {
            let _ = remove.call2(&self.ethereum, &JsValue::from_str(kind.name()), callback.as_ref());
        }
    }

    async fn pause(&self, interval: Duration) {
        let ms = interval.as_millis().min(i32::MAX as u128) as i32;
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window().map(|window| {
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            });
            if !matches!(scheduled, Some(Ok(_))) {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}
