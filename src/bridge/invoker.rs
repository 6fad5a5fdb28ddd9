//! Run invoker
//!
//! Owns the module readiness and sequences one run end to end: wait for
//! the engine, reset the capture buffers, stage the binary, invoke the run
//! entry point, capture any failure in-band, unstage unconditionally, and
//! hand back the two display-safe buffers.
//!
//! A run never rejects for per-run reasons; faults become diagnostic text
//! in the stderr buffer. The only error path out of [`RunInvoker::run`] is
//! [`InitError`], which is fatal for the whole execution context.

use super::staging;
use super::streams::{self, CaptureContext};
use crate::console_log;
use crate::engine::{Engine, EngineCell, EngineFault, InitError};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// The two captured streams of one completed run, display-safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Sequences runs against the lazily initialized module instance.
#[derive(Clone)]
pub struct RunInvoker {
    cell: EngineCell,
    ctx: CaptureContext,
}

impl RunInvoker {
    /// Build an invoker over an engine factory. The factory future is
    /// polled lazily and at most once; the stream and abort hooks are
    /// wired in as soon as it resolves, before any run.
    pub fn new<F>(factory: F) -> Self
    where
        F: Future<Output = Result<Box<dyn Engine>, InitError>> + 'static,
    {
        let ctx = CaptureContext::new();
        let hooks = ctx.clone();
        let cell = EngineCell::new(async move {
            let mut engine = factory.await?;
            streams::install(engine.as_mut(), &hooks);
            Ok(Rc::new(RefCell::new(engine)))
        });
        Self { cell, ctx }
    }

    /// Drive engine initialization without running anything. Used at boot
    /// so the module comes up as soon as the context loads.
    pub async fn warm_up(&self) -> Result<(), InitError> {
        self.cell.ready().await.map(|_| ())
    }

    /// Run one uploaded binary through the engine.
    ///
    /// Always produces a [`RunOutput`] once the engine is up: staging
    /// errors and run faults are rendered into the stderr buffer instead
    /// of being propagated. The staged file is removed on every exit path.
    pub async fn run(&self, binary: &[u8]) -> Result<RunOutput, InitError> {
        let handle = self.cell.ready().await?;
        let mut engine = handle.borrow_mut();

        self.ctx.reset();

        let outcome = match staging::stage(engine.as_mut(), binary) {
            Ok(()) => engine.run(staging::STAGE_PATH),
            Err(err) => Err(EngineFault::Raised {
                message: err.to_string(),
            }),
        };
        match outcome {
            Ok(()) => {}
            Err(EngineFault::Raised { message }) => {
                self.ctx.push_stderr_line(&format!("error: {}", message));
            }
            // The abort hook already wrote the "aborted: ..." line
            Err(EngineFault::Aborted) => {}
        }

        // The staged file must never outlive the run, failed runs included
        if let Err(err) = staging::unstage(engine.as_mut()) {
            console_log!("[invoker] unstage failed: {}", err);
        }

        let (stdout, stderr) = self.ctx.take_output();
        Ok(RunOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::{StubEngine, StubFiles};
    use futures::executor::block_on;

    fn invoker_with_files() -> (RunInvoker, StubFiles) {
        let engine = StubEngine::new();
        let files = engine.files();
        let invoker = RunInvoker::new(async move { Ok(Box::new(engine) as Box<dyn Engine>) });
        (invoker, files)
    }

    #[test]
    fn test_successful_run_captures_stdout() {
        let (invoker, _) = invoker_with_files();
        let output = block_on(invoker.run(b"outln hi")).unwrap();
        assert_eq!(output.stdout, "hi&#10;");
        assert_eq!(output.stderr, "");
    }

    #[test]
    fn test_fault_is_rendered_not_raised() {
        let (invoker, _) = invoker_with_files();
        let output = block_on(invoker.run(b"fault bad opcode")).unwrap();
        assert_eq!(output.stdout, "");
        assert!(output.stderr.contains("bad opcode"));
        assert!(output.stderr.starts_with("error: "));
    }

    #[test]
    fn test_abort_is_rendered_with_its_own_prefix() {
        let (invoker, _) = invoker_with_files();
        let output = block_on(invoker.run(b"outln partial\nabort out of memory")).unwrap();
        assert_eq!(output.stdout, "partial&#10;");
        assert_eq!(output.stderr, "aborted: out of memory&#10;");
    }

    #[test]
    fn test_buffers_do_not_carry_over_between_runs() {
        let (invoker, _) = invoker_with_files();
        let first = block_on(invoker.run(b"outln one\nerrln oops")).unwrap();
        let second = block_on(invoker.run(b"outln two")).unwrap();
        assert_eq!(first.stdout, "one&#10;");
        assert_eq!(second.stdout, "two&#10;");
        assert_eq!(second.stderr, "");
    }

    #[test]
    fn test_staged_file_is_gone_after_success_and_failure() {
        let (invoker, files) = invoker_with_files();

        block_on(invoker.run(b"outln ok")).unwrap();
        assert!(!files.borrow().contains_key(staging::STAGE_PATH));

        block_on(invoker.run(b"fault crash")).unwrap();
        assert!(!files.borrow().contains_key(staging::STAGE_PATH));
    }

    #[test]
    fn test_init_failure_is_fatal_and_cached() {
        let invoker = RunInvoker::new(async { Err(InitError::new("no engine")) });
        let first = block_on(invoker.run(b"outln hi")).unwrap_err();
        let second = block_on(invoker.run(b"outln hi")).unwrap_err();
        assert_eq!(first, second);
        assert_eq!(first.message, "no engine");
    }
}
