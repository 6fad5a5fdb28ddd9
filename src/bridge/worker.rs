//! Worker-side bridge state
//!
//! The isolated context holds one module instance, one set of capture
//! buffers and one staging path, so requests must not overlap. Instead of
//! trusting the page to serialize its submissions, accepted requests go
//! into a bounded FIFO queue and a single drain task works through them
//! one at a time, sending exactly one response per accepted request.
//!
//! Everything that does not decode into a recognized request - falsy
//! messages, unknown commands, malformed arguments - is silently ignored:
//! no error, no response.

use super::invoker::RunInvoker;
use crate::console_log;
use crate::protocol::{Envelope, Request, Response};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Upper bound on queued requests. Submissions beyond this are dropped;
/// a serialized client never gets near it.
const QUEUE_LIMIT: usize = 8;

/// Where responses go. The wasm worker posts them back through its global
/// scope; tests collect them in a vector.
pub trait ResponseSink {
    fn send(&mut self, response: Response);
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Vec<u8>>,
    draining: bool,
    dead: bool,
}

/// Message dispatch and request serialization for one worker context.
#[derive(Clone)]
pub struct WorkerBridge {
    invoker: RunInvoker,
    state: Rc<RefCell<QueueState>>,
}

impl WorkerBridge {
    pub fn new(invoker: RunInvoker) -> Self {
        Self {
            invoker,
            state: Rc::new(RefCell::new(QueueState::default())),
        }
    }

    /// Offer an incoming envelope to the bridge. Returns whether a request
    /// was queued (and a drain is therefore worth starting). Anything
    /// unrecognized is dropped without a response.
    pub fn accept(&self, envelope: Option<Envelope>) -> bool {
        let Some(envelope) = envelope else {
            return false;
        };
        let Some(request) = Request::decode(&envelope) else {
            return false;
        };

        let mut state = self.state.borrow_mut();
        if state.dead {
            console_log!("[worker] engine is down, dropping request");
            return false;
        }
        if state.pending.len() >= QUEUE_LIMIT {
            console_log!("[worker] request queue full, dropping request");
            return false;
        }
        match request {
            Request::EmulateFile { binary } => state.pending.push_back(binary),
        }
        true
    }

    /// Work through the queue, one request at a time. Re-entrant calls
    /// return immediately; the drain already in flight will pick up
    /// whatever was queued meanwhile.
    pub async fn drain<S: ResponseSink>(&self, sink: &mut S) {
        {
            let mut state = self.state.borrow_mut();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let next = self.state.borrow_mut().pending.pop_front();
            let Some(binary) = next else {
                break;
            };
            match self.invoker.run(&binary).await {
                Ok(output) => sink.send(Response::EmulateFileResults {
                    stdout: output.stdout,
                    stderr: output.stderr,
                }),
                Err(err) => {
                    // Fatal for the whole context: nothing queued can ever
                    // complete, and no response is sent.
                    console_log!("[worker] {}", err);
                    let mut state = self.state.borrow_mut();
                    state.pending.clear();
                    state.dead = true;
                    break;
                }
            }
        }

        self.state.borrow_mut().draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::StubEngine;
    use crate::engine::{Engine, InitError};
    use futures::executor::block_on;
    use serde_json::json;

    struct VecSink(Vec<Response>);

    impl ResponseSink for VecSink {
        fn send(&mut self, response: Response) {
            self.0.push(response);
        }
    }

    fn stub_bridge() -> WorkerBridge {
        let engine = StubEngine::new();
        WorkerBridge::new(RunInvoker::new(async move {
            Ok(Box::new(engine) as Box<dyn Engine>)
        }))
    }

    fn emulate_envelope(script: &[u8]) -> Envelope {
        Request::EmulateFile {
            binary: script.to_vec(),
        }
        .encode()
    }

    #[test]
    fn test_falsy_message_is_ignored() {
        let bridge = stub_bridge();
        assert!(!bridge.accept(None));
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        let bridge = stub_bridge();
        let envelope = Envelope {
            command: "selfDestruct".to_string(),
            arguments: vec![json!([1, 2, 3])],
        };
        assert!(!bridge.accept(Some(envelope)));

        let mut sink = VecSink(Vec::new());
        block_on(bridge.drain(&mut sink));
        assert!(sink.0.is_empty());
    }

    #[test]
    fn test_one_response_per_request() {
        let bridge = stub_bridge();
        assert!(bridge.accept(Some(emulate_envelope(b"outln hi"))));

        let mut sink = VecSink(Vec::new());
        block_on(bridge.drain(&mut sink));
        assert_eq!(
            sink.0,
            vec![Response::EmulateFileResults {
                stdout: "hi&#10;".to_string(),
                stderr: String::new(),
            }]
        );
    }

    #[test]
    fn test_back_to_back_requests_are_serialized_in_order() {
        let bridge = stub_bridge();
        // Both submitted before any response exists
        assert!(bridge.accept(Some(emulate_envelope(b"outln first"))));
        assert!(bridge.accept(Some(emulate_envelope(b"outln second"))));

        let mut sink = VecSink(Vec::new());
        block_on(bridge.drain(&mut sink));

        assert_eq!(sink.0.len(), 2);
        let texts: Vec<&str> = sink
            .0
            .iter()
            .map(|r| match r {
                Response::EmulateFileResults { stdout, .. } => stdout.as_str(),
            })
            .collect();
        // No interleaving: each response holds exactly one run's output
        assert_eq!(texts, vec!["first&#10;", "second&#10;"]);
    }

    #[test]
    fn test_queue_limit_drops_excess() {
        let bridge = stub_bridge();
        for _ in 0..QUEUE_LIMIT {
            assert!(bridge.accept(Some(emulate_envelope(b"outln x"))));
        }
        assert!(!bridge.accept(Some(emulate_envelope(b"outln x"))));
    }

    #[test]
    fn test_init_failure_sends_nothing_and_kills_the_bridge() {
        let bridge = WorkerBridge::new(RunInvoker::new(async {
            Err(InitError::new("module did not load"))
        }));
        assert!(bridge.accept(Some(emulate_envelope(b"outln hi"))));

        let mut sink = VecSink(Vec::new());
        block_on(bridge.drain(&mut sink));
        assert!(sink.0.is_empty());

        // Later requests cannot complete either
        assert!(!bridge.accept(Some(emulate_envelope(b"outln hi"))));
    }
}
