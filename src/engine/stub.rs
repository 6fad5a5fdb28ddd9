//! In-memory stand-in for the pre-built emulator module
//!
//! Used by the test suite and by native development builds, where the real
//! module (a wasm blob loaded into the worker) is not available. Staged
//! binaries are interpreted as tiny line-oriented scripts so tests can make
//! a "program" produce any stream behavior they need:
//!
//! ```text
//! out <text>     write text to stdout, byte at a time, no newline
//! outln <text>   write text + newline to stdout
//! errln <text>   write text + newline to stderr
//! echo           copy stdin to stdout until end-of-input
//! fault <msg>    raise an internal error with the given message
//! abort <msg>    signal an abort through the abort hook
//! ```
//!
//! Every run ends with a flush sentinel on both output hooks, the way the
//! real module flushes its streams on exit.

use super::{AbortHook, Engine, EngineFault, FileFlags, InputHook, OutputHook, VfsError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared view of the stub's virtual filesystem, handed out so tests can
/// check what a run left behind.
pub type StubFiles = Rc<RefCell<HashMap<String, Vec<u8>>>>;

/// Scriptable in-memory engine.
pub struct StubEngine {
    files: StubFiles,
    stdin: Option<InputHook>,
    stdout: Option<OutputHook>,
    stderr: Option<OutputHook>,
    abort: Option<AbortHook>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            files: Rc::new(RefCell::new(HashMap::new())),
            stdin: None,
            stdout: None,
            stderr: None,
            abort: None,
        }
    }

    /// Handle onto the virtual filesystem contents.
    pub fn files(&self) -> StubFiles {
        self.files.clone()
    }

    fn write_out(&mut self, bytes: &[u8]) {
        if let Some(hook) = self.stdout.as_mut() {
            for b in bytes {
                hook(Some(*b));
            }
        }
    }

    fn write_err(&mut self, bytes: &[u8]) {
        if let Some(hook) = self.stderr.as_mut() {
            for b in bytes {
                hook(Some(*b));
            }
        }
    }

    fn flush_streams(&mut self) {
        if let Some(hook) = self.stdout.as_mut() {
            hook(None);
        }
        if let Some(hook) = self.stderr.as_mut() {
            hook(None);
        }
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for StubEngine {
    fn install_streams(&mut self, stdin: InputHook, stdout: OutputHook, stderr: OutputHook) {
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
    }

    fn install_abort_hook(&mut self, abort: AbortHook) {
        self.abort = Some(abort);
    }

    fn create_file(
        &mut self,
        dir: &str,
        name: &str,
        bytes: &[u8],
        _flags: FileFlags,
    ) -> Result<(), VfsError> {
        let path = if dir.ends_with('/') {
            format!("{}{}", dir, name)
        } else {
            format!("{}/{}", dir, name)
        };
        let mut files = self.files.borrow_mut();
        if files.contains_key(&path) {
            // Mirrors the real module's filesystem, which refuses to
            // create over an existing entry.
            return Err(VfsError::AlreadyExists { path });
        }
        files.insert(path, bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), VfsError> {
        match self.files.borrow_mut().remove(path) {
            Some(_) => Ok(()),
            None => Err(VfsError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn run(&mut self, path: &str) -> Result<(), EngineFault> {
        let script = match self.files.borrow().get(path) {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => {
                return Err(EngineFault::Raised {
                    message: format!("failed to open '{}'", path),
                });
            }
        };

        for line in script.lines() {
            let (directive, rest) = match line.split_once(' ') {
                Some((d, r)) => (d, r),
                None => (line, ""),
            };
            match directive {
                "out" => self.write_out(rest.as_bytes()),
                "outln" => {
                    self.write_out(rest.as_bytes());
                    self.write_out(b"\n");
                }
                "errln" => {
                    self.write_err(rest.as_bytes());
                    self.write_err(b"\n");
                }
                "echo" => {
                    while let Some(byte) = self.stdin.as_mut().and_then(|hook| hook()) {
                        if let Some(hook) = self.stdout.as_mut() {
                            hook(Some(byte));
                        }
                    }
                }
                "fault" => {
                    self.flush_streams();
                    return Err(EngineFault::Raised {
                        message: rest.to_string(),
                    });
                }
                "abort" => {
                    if let Some(hook) = self.abort.as_mut() {
                        hook(rest);
                    }
                    self.flush_streams();
                    return Err(EngineFault::Aborted);
                }
                "" => {}
                other => {
                    self.flush_streams();
                    return Err(EngineFault::Raised {
                        message: format!("bad directive '{}'", other),
                    });
                }
            }
        }

        self.flush_streams();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_engine() -> (StubEngine, Rc<RefCell<Vec<Option<u8>>>>) {
        let mut engine = StubEngine::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let out = seen.clone();
        engine.install_streams(
            Box::new(|| None),
            Box::new(move |b| out.borrow_mut().push(b)),
            Box::new(|_| {}),
        );
        (engine, seen)
    }

    #[test]
    fn test_outln_emits_bytes_then_flush() {
        let (mut engine, seen) = collecting_engine();
        engine
            .create_file("/", "p", b"outln hi", FileFlags::default())
            .unwrap();
        engine.run("/p").unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![Some(b'h'), Some(b'i'), Some(b'\n'), None]
        );
    }

    #[test]
    fn test_fault_directive_raises() {
        let (mut engine, _) = collecting_engine();
        engine
            .create_file("/", "p", b"fault bad opcode", FileFlags::default())
            .unwrap();
        let fault = engine.run("/p").unwrap_err();
        assert_eq!(
            fault,
            EngineFault::Raised {
                message: "bad opcode".to_string()
            }
        );
    }

    #[test]
    fn test_missing_file_raises() {
        let (mut engine, _) = collecting_engine();
        let fault = engine.run("/nope").unwrap_err();
        assert!(fault.to_string().contains("/nope"));
    }

    #[test]
    fn test_create_over_existing_collides() {
        let mut engine = StubEngine::new();
        engine
            .create_file("/", "p", b"out x", FileFlags::default())
            .unwrap();
        let err = engine
            .create_file("/", "p", b"out y", FileFlags::default())
            .unwrap_err();
        assert_eq!(
            err,
            VfsError::AlreadyExists {
                path: "/p".to_string()
            }
        );
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut engine = StubEngine::new();
        let err = engine.remove("/p").unwrap_err();
        assert!(matches!(err, VfsError::NotFound { .. }));
    }
}
