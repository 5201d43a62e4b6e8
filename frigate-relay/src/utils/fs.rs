//! Filesystem helpers with operation + path error context.

use std::path::Path;

use crate::{Error, Result};

/// Create a directory (recursively), labelling failures with `op`.
pub fn ensure_dir_all_sync_with_op(op: &'static str, path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path(op, path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_operation_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, b"x").unwrap();

        let nested = file.join("logs");
        let err = ensure_dir_all_sync_with_op("creating log directory", &nested).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("creating log directory"), "{text}");
        assert!(text.contains("taken"), "{text}");

        let ok = dir.path().join("a/b");
        ensure_dir_all_sync_with_op("creating log directory", &ok).unwrap();
        assert!(ok.is_dir());
    }
}
