#![allow(dead_code)]

pub use buildpipe_test_utils::{init_tracing, with_timeout};

use std::path::PathBuf;

/// A scratch directory that exists for the life of the test.
pub fn scratch_dir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("creating temp dir");
    let path = dir.path().to_path_buf();
    (dir, path)
}
