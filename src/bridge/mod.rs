//! The emulation bridge
//!
//! Everything between "the page has the bytes of one uploaded binary" and
//! "the page has two display-safe output texts":
//!
//! - [`streams`]: byte-level capture of the emulated program's standard
//!   streams into display-safe buffers
//! - [`staging`]: scoped placement of the binary in the engine's virtual
//!   filesystem, one file per run
//! - [`invoker`]: the run sequence with in-band failure capture and a
//!   guaranteed unstage on every exit path
//! - [`worker`]: command dispatch and request serialization inside the
//!   isolated context
//!
//! The bridge never interprets the emulated program, never validates the
//! uploaded binary, and never times a run out; a program that does not
//! terminate produces no response.

pub mod invoker;
pub mod staging;
pub mod streams;
pub mod worker;

pub use invoker::{RunInvoker, RunOutput};
pub use streams::{CaptureContext, LINE_BREAK};
pub use worker::{ResponseSink, WorkerBridge};
