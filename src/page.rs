//! Page-side trigger glue
//!
//! The page owns the file picker and the display areas; both are trivial
//! DOM wiring and stay outside the bridge. What lives here is the one rule
//! with protocol weight: a submission turns into a request envelope only
//! when exactly one file is selected. Zero or many selected files is a
//! silent no-op - nothing is sent and nothing is reported.

use crate::protocol::{Envelope, Request};

#[cfg(target_arch = "wasm32")]
use crate::protocol::Response;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Build the request envelope for the current file selection, if the
/// selection is valid.
pub fn request_for_selection(files: &[Vec<u8>]) -> Option<Envelope> {
    let [file] = files else {
        return None;
    };
    Some(
        Request::EmulateFile {
            binary: file.clone(),
        }
        .encode(),
    )
}

/// Thin client over the worker hosting the bridge.
///
/// Posts request envelopes as JSON strings and hands decoded results to
/// the callback; rendering them is the caller's business.
#[cfg(target_arch = "wasm32")]
pub struct PageClient {
    worker: web_sys::Worker,
    // Keeps the onmessage closure alive for the worker's lifetime
    _on_message: Closure<dyn FnMut(web_sys::MessageEvent)>,
}

#[cfg(target_arch = "wasm32")]
impl PageClient {
    /// Spawn the worker and start listening for result envelopes.
    pub fn new(
        script_url: &str,
        mut on_results: impl FnMut(String, String) + 'static,
    ) -> Result<Self, JsValue> {
        let worker = web_sys::Worker::new(script_url)?;

        let on_message = Closure::wrap(Box::new(move |event: web_sys::MessageEvent| {
            let Some(text) = event.data().as_string() else {
                return;
            };
            let Some(envelope) = Envelope::parse(&text) else {
                return;
            };
            if let Some(Response::EmulateFileResults { stdout, stderr }) =
                Response::decode(&envelope)
            {
                on_results(stdout, stderr);
            }
        }) as Box<dyn FnMut(_)>);
        worker.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        Ok(Self {
            worker,
            _on_message: on_message,
        })
    }

    /// Submit the current selection. Returns whether a request was sent.
    pub fn submit(&self, files: &[Vec<u8>]) -> bool {
        let Some(envelope) = request_for_selection(files) else {
            return false;
        };
        if let Err(err) = self
            .worker
            .post_message(&JsValue::from_str(&envelope.to_json()))
        {
            crate::console_log!("[page] post_message failed: {:?}", err);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CMD_EMULATE_FILE;

    #[test]
    fn test_single_file_becomes_a_request() {
        let files = vec![vec![1u8, 2, 3]];
        let envelope = request_for_selection(&files).unwrap();
        assert_eq!(envelope.command, CMD_EMULATE_FILE);
        assert_eq!(
            Request::decode(&envelope),
            Some(Request::EmulateFile {
                binary: vec![1, 2, 3]
            })
        );
    }

    #[test]
    fn test_empty_selection_sends_nothing() {
        assert_eq!(request_for_selection(&[]), None);
    }

    #[test]
    fn test_multi_selection_sends_nothing() {
        let files = vec![vec![1u8], vec![2u8]];
        assert_eq!(request_for_selection(&files), None);
    }
}
