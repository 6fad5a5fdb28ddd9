//! Embedded emulation engine contract
//!
//! The emulation engine itself (instruction decoding, CPU state, OS
//! emulation) is a pre-built, opaque module. The bridge only relies on the
//! narrow surface modeled by the [`Engine`] trait:
//!
//! - a virtual filesystem that can create and remove a single file
//! - a `run(path)` entry point that drives one binary to completion
//! - byte-level stdin/stdout/stderr hooks installed before the first run
//! - an abort callback for unrecoverable internal failures
//!
//! Engine construction is asynchronous and happens at most once per
//! execution context. [`EngineCell`] wraps the init future so that every
//! request awaits the same readiness, and an init failure is cached and
//! permanent for the context.

#[cfg(target_arch = "wasm32")]
pub mod web;

pub mod stub;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Supplies one byte of program input. `None` signals end-of-input; the
/// hook must never block.
pub type InputHook = Box<dyn FnMut() -> Option<u8>>;

/// Receives one byte of program output. `None` is the flush sentinel and
/// carries no payload.
pub type OutputHook = Box<dyn FnMut(Option<u8>)>;

/// Invoked when the module aborts with an unrecoverable internal failure.
pub type AbortHook = Box<dyn FnMut(&str)>;

/// Permission flags for a file created in the engine's virtual filesystem.
///
/// The staged binary is readable and nothing else; the engine interprets
/// the bytes as an executable image regardless of filesystem-level flags.
#[derive(Debug, Clone, Copy)]
pub struct FileFlags {
    pub readable: bool,
    pub writable: bool,
}

impl Default for FileFlags {
    fn default() -> Self {
        Self {
            readable: true,
            writable: false,
        }
    }
}

/// Errors from the engine's virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    /// No entry at the given path
    NotFound { path: String },
    /// An entry already exists at the given path
    AlreadyExists { path: String },
    /// Anything else the opaque backend reports
    Backend { message: String },
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(f, "no such file: {}", path),
            Self::AlreadyExists { path } => write!(f, "file already exists: {}", path),
            Self::Backend { message } => write!(f, "filesystem error: {}", message),
        }
    }
}

impl std::error::Error for VfsError {}

/// Failure of one run of the engine's entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineFault {
    /// The run entry point raised an internal error.
    Raised { message: String },
    /// The module aborted; the abort hook has already reported the reason.
    Aborted,
}

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raised { message } => write!(f, "{}", message),
            Self::Aborted => write!(f, "module aborted"),
        }
    }
}

impl std::error::Error for EngineFault {}

/// The engine failed to come up. Fatal for the whole execution context: no
/// request can ever complete, and the failure is never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitError {
    pub message: String,
}

impl InitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine initialization failed: {}", self.message)
    }
}

impl std::error::Error for InitError {}

/// The embedded module surface the bridge depends on.
///
/// Hooks are installed once, right after construction, and stay wired for
/// the engine's whole lifetime; only the buffers behind them are reset
/// between runs.
pub trait Engine {
    /// Wire the byte-level stream hooks. Called exactly once, before the
    /// first run.
    fn install_streams(&mut self, stdin: InputHook, stdout: OutputHook, stderr: OutputHook);

    /// Wire the abort callback. Called exactly once, before the first run.
    fn install_abort_hook(&mut self, abort: AbortHook);

    /// Create `dir`/`name` in the virtual filesystem with the given bytes.
    fn create_file(
        &mut self,
        dir: &str,
        name: &str,
        bytes: &[u8],
        flags: FileFlags,
    ) -> Result<(), VfsError>;

    /// Remove the entry at `path`.
    fn remove(&mut self, path: &str) -> Result<(), VfsError>;

    /// Drive the binary at `path` to completion. Synchronous relative to
    /// the caller; raises only on fatal internal errors.
    fn run(&mut self, path: &str) -> Result<(), EngineFault>;
}

/// Shared handle to the process-wide module instance.
pub type EngineHandle = Rc<RefCell<Box<dyn Engine>>>;

type InitFuture = Shared<LocalBoxFuture<'static, Result<EngineHandle, InitError>>>;

/// One-shot readiness future for the module instance.
///
/// The wrapped init future is polled lazily and at most once; every clone
/// of the cell awaits the same result. A resolved `Err` stays resolved, so
/// an init failure is permanent for the context.
#[derive(Clone)]
pub struct EngineCell {
    init: InitFuture,
}

impl EngineCell {
    pub fn new<F>(init: F) -> Self
    where
        F: Future<Output = Result<EngineHandle, InitError>> + 'static,
    {
        Self {
            init: init.boxed_local().shared(),
        }
    }

    /// Wait for the module instance. Suspends until init completes, then
    /// resolves immediately on every later call.
    pub async fn ready(&self) -> Result<EngineHandle, InitError> {
        self.init.clone().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_init_error_display() {
        let err = InitError::new("no module");
        assert_eq!(err.to_string(), "engine initialization failed: no module");
    }

    #[test]
    fn test_vfs_error_display() {
        let err = VfsError::NotFound {
            path: "/upload.elf".to_string(),
        };
        assert_eq!(err.to_string(), "no such file: /upload.elf");
    }

    #[test]
    fn test_engine_cell_runs_init_once() {
        use std::cell::Cell;

        let runs = Rc::new(Cell::new(0u32));
        let counter = runs.clone();
        let cell = EngineCell::new(async move {
            counter.set(counter.get() + 1);
            let engine: Box<dyn Engine> = Box::new(stub::StubEngine::new());
            Ok(Rc::new(RefCell::new(engine)))
        });

        let first = block_on(cell.ready());
        let second = block_on(cell.ready());
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_engine_cell_caches_failure() {
        let cell = EngineCell::new(async { Err(InitError::new("boom")) });

        let first = block_on(cell.ready()).err().unwrap();
        let second = block_on(cell.ready()).err().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.message, "boom");
    }
}
