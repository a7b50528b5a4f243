// registry_wasm/src/lib.rs

use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => ($crate::log(&format_args!($($t)*).to_string()))
}

pub mod app;
pub mod generator;
pub mod provider;

pub use app::RegistryApp;
pub use generator::JsProofGenerator;
pub use provider::InjectedProvider;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    console_log!("Anon Aadhaar registry module initialized");
}
