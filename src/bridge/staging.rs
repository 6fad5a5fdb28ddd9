//! Filesystem staging
//!
//! One uploaded binary is staged at a fixed path in the engine's virtual
//! filesystem for the duration of one run, then removed. Staging over a
//! leftover entry overwrites cleanly, and unstaging a path that is already
//! gone counts as success, so neither direction can wedge the bridge.

use crate::engine::{Engine, FileFlags, VfsError};

/// Directory the uploaded image is staged into.
pub const STAGE_DIR: &str = "/";
/// File name of the staged image.
pub const STAGE_NAME: &str = "upload.elf";
/// Full path of the staged image.
pub const STAGE_PATH: &str = "/upload.elf";

/// Stage the uploaded bytes at [`STAGE_PATH`], replacing any leftover
/// entry from an earlier run.
pub fn stage(engine: &mut dyn Engine, bytes: &[u8]) -> Result<(), VfsError> {
    // Best effort: there is usually nothing to remove, and a genuine
    // filesystem problem will surface in create_file anyway
    let _ = engine.remove(STAGE_PATH);
    engine.create_file(STAGE_DIR, STAGE_NAME, bytes, FileFlags::default())
}

/// Remove the staged image. A missing entry is success.
pub fn unstage(engine: &mut dyn Engine) -> Result<(), VfsError> {
    match engine.remove(STAGE_PATH) {
        Ok(()) | Err(VfsError::NotFound { .. }) => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::StubEngine;

    #[test]
    fn test_stage_creates_the_file() {
        let mut engine = StubEngine::new();
        let files = engine.files();
        stage(&mut engine, b"outln hi").unwrap();
        assert_eq!(
            files.borrow().get(STAGE_PATH).map(Vec::as_slice),
            Some(b"outln hi".as_slice())
        );
    }

    #[test]
    fn test_stage_overwrites_a_leftover() {
        let mut engine = StubEngine::new();
        let files = engine.files();
        stage(&mut engine, b"old").unwrap();
        stage(&mut engine, b"new").unwrap();
        assert_eq!(
            files.borrow().get(STAGE_PATH).map(Vec::as_slice),
            Some(b"new".as_slice())
        );
    }

    #[test]
    fn test_unstage_removes_the_file() {
        let mut engine = StubEngine::new();
        let files = engine.files();
        stage(&mut engine, b"bytes").unwrap();
        unstage(&mut engine).unwrap();
        assert!(!files.borrow().contains_key(STAGE_PATH));
    }

    #[test]
    fn test_unstage_missing_path_is_success() {
        let mut engine = StubEngine::new();
        unstage(&mut engine).unwrap();
        unstage(&mut engine).unwrap();
    }
}
