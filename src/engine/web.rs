//! Adapter for the pre-built emulator module
//!
//! The real engine is an opaque wasm blob whose loader script runs in the
//! worker before this crate boots. The loader installs one global,
//! `createEngine()`, returning a promise that resolves to the module
//! instance once it is ready. The instance exposes the narrow surface the
//! bridge needs: stream/abort callback installation, `createFile` /
//! `removeFile` on its virtual filesystem, and the `emulate(path)` run
//! entry point.

use super::{AbortHook, Engine, EngineFault, FileFlags, InitError, InputHook, OutputHook, VfsError};
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    /// Opaque instance of the pre-built emulator module.
    pub type EngineModule;

    /// Async factory installed on the worker global scope by the engine's
    /// loader script.
    #[wasm_bindgen(catch, js_name = createEngine)]
    fn create_engine() -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, js_name = initStreams)]
    fn init_streams(this: &EngineModule, stdin: &JsValue, stdout: &JsValue, stderr: &JsValue);

    #[wasm_bindgen(method, js_name = onAbort)]
    fn on_abort(this: &EngineModule, hook: &JsValue);

    #[wasm_bindgen(method, catch, js_name = createFile)]
    fn create_file(
        this: &EngineModule,
        dir: &str,
        name: &str,
        bytes: &js_sys::Uint8Array,
        readable: bool,
        writable: bool,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = removeFile)]
    fn remove_file(this: &EngineModule, path: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch)]
    fn emulate(this: &EngineModule, path: &str) -> Result<(), JsValue>;
}

/// [`Engine`] implementation over the JS module instance.
pub struct WebEngine {
    module: EngineModule,
    /// Set by the abort closure so a throw out of `emulate` can be told
    /// apart from an ordinary raised error.
    aborted: Rc<Cell<bool>>,
    // The installed closures must stay alive as long as the module keeps
    // calling into them.
    _stdin: Option<Closure<dyn FnMut() -> JsValue>>,
    _stdout: Option<Closure<dyn FnMut(JsValue)>>,
    _stderr: Option<Closure<dyn FnMut(JsValue)>>,
    _abort: Option<Closure<dyn FnMut(String)>>,
}

/// Wait for the loader's factory and wrap the resulting instance.
pub async fn create() -> Result<Box<dyn Engine>, InitError> {
    let promise =
        create_engine().map_err(|err| InitError::new(format!("no engine loader: {:?}", err)))?;
    let module = JsFuture::from(promise)
        .await
        .map_err(|err| InitError::new(fault_message(&err)))?;
    Ok(Box::new(WebEngine {
        module: module.unchecked_into(),
        aborted: Rc::new(Cell::new(false)),
        _stdin: None,
        _stdout: None,
        _stderr: None,
        _abort: None,
    }))
}

impl Engine for WebEngine {
    fn install_streams(&mut self, mut stdin: InputHook, mut stdout: OutputHook, mut stderr: OutputHook) {
        let stdin = Closure::wrap(Box::new(move || match stdin() {
            Some(byte) => JsValue::from_f64(f64::from(byte)),
            // End-of-input sentinel
            None => JsValue::NULL,
        }) as Box<dyn FnMut() -> JsValue>);
        let stdout = Closure::wrap(
            Box::new(move |value: JsValue| stdout(js_byte(&value))) as Box<dyn FnMut(JsValue)>
        );
        let stderr = Closure::wrap(
            Box::new(move |value: JsValue| stderr(js_byte(&value))) as Box<dyn FnMut(JsValue)>
        );

        self.module
            .init_streams(stdin.as_ref(), stdout.as_ref(), stderr.as_ref());
        self._stdin = Some(stdin);
        self._stdout = Some(stdout);
        self._stderr = Some(stderr);
    }

    fn install_abort_hook(&mut self, mut abort: AbortHook) {
        let aborted = self.aborted.clone();
        let hook = Closure::wrap(Box::new(move |reason: String| {
            aborted.set(true);
            abort(&reason);
        }) as Box<dyn FnMut(String)>);
        self.module.on_abort(hook.as_ref());
        self._abort = Some(hook);
    }

    fn create_file(
        &mut self,
        dir: &str,
        name: &str,
        bytes: &[u8],
        flags: FileFlags,
    ) -> Result<(), VfsError> {
        let data = js_sys::Uint8Array::from(bytes);
        self.module
            .create_file(dir, name, &data, flags.readable, flags.writable)
            .map_err(|err| VfsError::Backend {
                message: fault_message(&err),
            })
    }

    fn remove(&mut self, path: &str) -> Result<(), VfsError> {
        self.module
            .remove_file(path)
            .map_err(|err| VfsError::Backend {
                message: fault_message(&err),
            })
    }

    fn run(&mut self, path: &str) -> Result<(), EngineFault> {
        self.aborted.set(false);
        match self.module.emulate(path) {
            Ok(()) => Ok(()),
            Err(_) if self.aborted.get() => Err(EngineFault::Aborted),
            Err(err) => Err(EngineFault::Raised {
                message: fault_message(&err),
            }),
        }
    }
}

/// `null`/`undefined` is the flush sentinel; anything numeric is one byte.
fn js_byte(value: &JsValue) -> Option<u8> {
    value.as_f64().map(|n| n as u8)
}

fn fault_message(err: &JsValue) -> String {
    match err.dyn_ref::<js_sys::Error>() {
        Some(error) => String::from(error.message()),
        None => format!("{:?}", err),
    }
}
