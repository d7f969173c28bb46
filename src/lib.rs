pub mod app;
#[cfg(feature = "ssr")]
pub mod cancellable_sse;
pub mod components;
pub mod config;
pub mod error;
pub mod generation;
#[cfg(feature = "ssr")]
pub mod handlers;
#[cfg(feature = "ssr")]
pub mod middleware;
pub mod models;
pub mod pages;
pub mod parsing;
#[cfg(feature = "ssr")]
pub mod services;
pub mod state;
pub mod stream_parser;
pub mod transport;
pub mod types;
pub mod widgets;

#[cfg(feature = "hydrate")]
#[wasm_bindgen::prelude::wasm_bindgen]
pub fn hydrate() {
    use crate::app::*;
    console_error_panic_hook::set_once();
    leptos::mount::hydrate_body(App);
}
