mod api;
mod app;
mod auth;
mod components;
mod config;
mod drafts;
mod editor;
mod logging;
mod models;
mod pages;
mod state;
mod storage;
mod util;

pub use app::App;

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init(&config::EnvConfig::new().log_filter);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");
    mount_to_body(App);
}
