//! Worker boot sequence
//!
//! Runs once when the wasm module comes up inside the dedicated worker:
//! build the bridge over the web engine factory, kick off engine warm-up
//! so the module instance is coming up before the first upload arrives,
//! and hook message dispatch into the worker's global scope.

use crate::bridge::{ResponseSink, RunInvoker, WorkerBridge};
use crate::console_log;
use crate::engine;
use crate::protocol::{Envelope, Response};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::DedicatedWorkerGlobalScope;

/// Posts responses back through the worker's global scope.
struct ScopeSink {
    scope: DedicatedWorkerGlobalScope,
}

impl ResponseSink for ScopeSink {
    fn send(&mut self, response: Response) {
        let text = response.encode().to_json();
        if let Err(err) = self.scope.post_message(&JsValue::from_str(&text)) {
            console_log!("[worker] post_message failed: {:?}", err);
        }
    }
}

/// Boot the bridge. A no-op outside a dedicated worker; the page side
/// wires its own [`crate::page::PageClient`] instead.
pub fn boot() {
    let Ok(scope) = js_sys::global().dyn_into::<DedicatedWorkerGlobalScope>() else {
        return;
    };

    let invoker = RunInvoker::new(engine::web::create());
    let bridge = WorkerBridge::new(invoker.clone());

    // Module instance comes up with the context; requests await the same
    // one-shot readiness
    spawn_local(async move {
        if let Err(err) = invoker.warm_up().await {
            console_log!("[worker] {}", err);
        }
    });

    let onmessage = {
        let bridge = bridge.clone();
        let scope = scope.clone();
        Closure::wrap(Box::new(move |event: web_sys::MessageEvent| {
            let envelope = event.data().as_string().and_then(|t| Envelope::parse(&t));
            if bridge.accept(envelope) {
                let bridge = bridge.clone();
                let mut sink = ScopeSink {
                    scope: scope.clone(),
                };
                spawn_local(async move { bridge.drain(&mut sink).await });
            }
        }) as Box<dyn FnMut(_)>)
    };
    scope.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // lives for the worker lifetime

    console_log!("[worker] bridge ready");
}
