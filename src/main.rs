#![allow(non_snake_case)]

use dioxus::prelude::*;
use stores::transactions_store;

// Modules
mod components;
mod hooks;
mod routes;
mod services;
mod stores;
mod utils;
mod virtual_list;

fn main() {
    // Initialize panic hook for better error messages in browser console
    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        // Per-pass diagnostics are logged at DEBUG
        wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
    }

    log::info!("Starting ledgerscroll");

    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    // Initialize stores on mount
    use_effect(move || {
        transactions_store::init_filters();
    });

    rsx! {
        Router::<routes::Route> {}
    }
}
