//! Stream capture shim
//!
//! The embedded module only exposes character-oriented stream hooks, one
//! code unit at a time, so capture happens at byte granularity. Captured
//! output is kept display-safe: a newline byte becomes the `&#10;` marker
//! so the text can be inserted straight into a markup surface.
//!
//! Buffers live in a [`CaptureContext`], a shared run-state record injected
//! into the hooks when they are installed. The hooks stay wired to the
//! module for its whole lifetime; the invoker resets the context at the
//! start of each run and takes the buffers out at the end.

use crate::engine::Engine;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Markup-compatible replacement for a literal newline byte.
pub const LINE_BREAK: &str = "&#10;";

#[derive(Default)]
struct RunBuffers {
    input: VecDeque<u8>,
    stdout: String,
    stderr: String,
}

/// Per-context run-state record shared between the stream hooks and the
/// run invoker.
#[derive(Clone, Default)]
pub struct CaptureContext {
    inner: Rc<RefCell<RunBuffers>>,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all buffers. Called at the start of every run so nothing
    /// carries over from the previous one.
    pub fn reset(&self) {
        let mut buffers = self.inner.borrow_mut();
        buffers.input.clear();
        buffers.stdout.clear();
        buffers.stderr.clear();
    }

    /// Queue bytes for the program's standard input.
    pub fn feed_input(&self, bytes: &[u8]) {
        self.inner.borrow_mut().input.extend(bytes);
    }

    /// Append a diagnostic line to the captured stderr.
    pub fn push_stderr_line(&self, text: &str) {
        let mut buffers = self.inner.borrow_mut();
        buffers.stderr.push_str(text);
        buffers.stderr.push_str(LINE_BREAK);
    }

    /// Move the captured output out, leaving the buffers empty.
    pub fn take_output(&self) -> (String, String) {
        let mut buffers = self.inner.borrow_mut();
        (
            std::mem::take(&mut buffers.stdout),
            std::mem::take(&mut buffers.stderr),
        )
    }

    fn pop_input(&self) -> Option<u8> {
        self.inner.borrow_mut().input.pop_front()
    }

    fn write_stdout(&self, byte: Option<u8>) {
        append_byte(&mut self.inner.borrow_mut().stdout, byte);
    }

    fn write_stderr(&self, byte: Option<u8>) {
        append_byte(&mut self.inner.borrow_mut().stderr, byte);
    }
}

/// Translate one captured byte into display-safe text.
fn append_byte(buffer: &mut String, byte: Option<u8>) {
    match byte {
        Some(b'\n') => buffer.push_str(LINE_BREAK),
        // Flush sentinel carries no payload
        None => {}
        Some(byte) => buffer.push(byte as char),
    }
}

/// Wire the context into the engine's stream and abort hooks. Done once,
/// before the first run.
pub fn install(engine: &mut dyn Engine, ctx: &CaptureContext) {
    let stdin = ctx.clone();
    let stdout = ctx.clone();
    let stderr = ctx.clone();
    engine.install_streams(
        Box::new(move || stdin.pop_input()),
        Box::new(move |byte| stdout.write_stdout(byte)),
        Box::new(move |byte| stderr.write_stderr(byte)),
    );

    let abort = ctx.clone();
    engine.install_abort_hook(Box::new(move |reason| {
        abort.push_stderr_line(&format!("aborted: {}", reason));
    }));
}
