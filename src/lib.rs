//! riscbridge - browser-hosted emulation bridge, compiled to WASM
//!
//! Lets a page upload one executable image, run it through a pre-built
//! emulation engine inside a dedicated worker, and read the emulated
//! program's output as display-safe text. The engine itself is an opaque
//! external module; this crate is only the bridge around it:
//!
//! - [`protocol`]: the envelope vocabulary the page and worker exchange
//! - [`bridge`]: staging, stream capture, the run sequence, and request
//!   serialization inside the worker
//! - [`engine`]: the contract the embedded module is held to, its web
//!   adapter, and an in-memory stub for tests and native development
//! - [`page`]: the trigger-side selection rule and worker client
//!
//! Everything except the web adapters compiles natively, so the whole
//! bridge is exercised by plain `cargo test`.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod engine;
pub mod page;
pub mod protocol;

#[cfg(target_arch = "wasm32")]
mod boot;

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WASM entry point. Boots the bridge when loaded inside a worker.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    init_panic_hook();
    boot::boot();
}

/// Console logging helper
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::log(&format!($($t)*))
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
