//! Bridge protocol
//!
//! The page and the worker exchange one-shot JSON envelopes of the shape
//! `{ "command": ..., "arguments": [...] }`. Dispatch happens solely on
//! the command field; anything unrecognized or malformed decodes to `None`
//! and is dropped silently, never surfaced as an error.
//!
//! The protocol is fire-and-forget: there are no request identifiers, so
//! the worker guarantees exactly one response per accepted request and the
//! worker-side queue keeps responses in submission order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command carrying one uploaded binary to the worker.
pub const CMD_EMULATE_FILE: &str = "emulateFile";
/// Command carrying the two captured streams back to the page.
pub const CMD_EMULATE_FILE_RESULTS: &str = "emulateFileResults";

/// Wire shape of every message in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl Envelope {
    /// Parse a raw message. Malformed JSON, a non-object, or a missing or
    /// empty command all yield `None`.
    pub fn parse(text: &str) -> Option<Envelope> {
        serde_json::from_str::<Envelope>(text)
            .ok()
            .filter(|envelope| !envelope.command.is_empty())
    }

    pub fn to_json(&self) -> String {
        // Strings and numbers only; this cannot fail to serialize
        serde_json::to_string(self).expect("envelope serialization")
    }
}

/// A recognized page-to-worker request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Run the uploaded binary. Exactly one binary payload per request.
    EmulateFile { binary: Vec<u8> },
}

impl Request {
    /// Dispatch on the command field. Unrecognized commands and malformed
    /// arguments yield `None`.
    pub fn decode(envelope: &Envelope) -> Option<Request> {
        match envelope.command.as_str() {
            CMD_EMULATE_FILE => {
                let bytes = envelope.arguments.first()?.as_array()?;
                let binary = bytes
                    .iter()
                    .map(|value| value.as_u64().and_then(|n| u8::try_from(n).ok()))
                    .collect::<Option<Vec<u8>>>()?;
                Some(Request::EmulateFile { binary })
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> Envelope {
        match self {
            Request::EmulateFile { binary } => Envelope {
                command: CMD_EMULATE_FILE.to_string(),
                arguments: vec![Value::Array(
                    binary.iter().map(|byte| Value::from(*byte)).collect(),
                )],
            },
        }
    }
}

/// A recognized worker-to-page response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The two captured streams of one run, display-safe.
    EmulateFileResults { stdout: String, stderr: String },
}

impl Response {
    pub fn decode(envelope: &Envelope) -> Option<Response> {
        match envelope.command.as_str() {
            CMD_EMULATE_FILE_RESULTS => {
                let stdout = envelope.arguments.first()?.as_str()?.to_string();
                let stderr = envelope.arguments.get(1)?.as_str()?.to_string();
                Some(Response::EmulateFileResults { stdout, stderr })
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> Envelope {
        match self {
            Response::EmulateFileResults { stdout, stderr } => Envelope {
                command: CMD_EMULATE_FILE_RESULTS.to_string(),
                arguments: vec![Value::from(stdout.as_str()), Value::from(stderr.as_str())],
            },
        }
    }
}
