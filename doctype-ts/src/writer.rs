//! Output writing.
//!
//! The generated file is replaced through [`Storage::write_atomic`], so a
//! reader sees either the previous file or the new one. In dry-run mode
//! nothing touches storage and the would-be content is handed back instead.

use crate::error::{CliResult, WriteError};
use crate::storage::Storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What [`FileWriter::write`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { path: PathBuf, bytes: usize },
    /// Dry run: the content that would have been written to `path`.
    DryRun { content: String, path: PathBuf },
}

impl WriteResult {
    pub fn was_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}

/// Writes the output file, or reports what it would write.
pub struct FileWriter {
    storage: Arc<dyn Storage>,
    dry_run: bool,
}

impl FileWriter {
    pub fn new(storage: Arc<dyn Storage>, dry_run: bool) -> Self {
        Self { storage, dry_run }
    }

    /// Replace `path` with `content`, creating missing parent directories.
    pub async fn write(&self, path: &Path, content: &str) -> CliResult<WriteResult> {
        if self.dry_run {
            tracing::debug!(path = %path.display(), bytes = content.len(), "dry run, not writing");
            return Ok(WriteResult::DryRun {
                content: content.to_owned(),
                path: path.to_owned(),
            });
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.storage
                .create_dir_all(dir)
                .await
                .map_err(|source| WriteError::CreateDir {
                    path: dir.to_owned(),
                    source,
                })?;
        }

        self.storage
            .write_atomic(path, content.as_bytes())
            .await
            .map_err(|source| WriteError::WriteFile {
                path: path.to_owned(),
                source,
            })?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote output");
        Ok(WriteResult::Written {
            path: path.to_owned(),
            bytes: content.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use crate::storage::{FsStorage, MemoryStorage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parents_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frontend/src/types/doctypes.ts");

        let writer = FileWriter::new(Arc::new(FsStorage::new()), false);
        let result = writer.write(&path, "export {};\n").await.unwrap();

        assert_eq!(
            result,
            WriteResult::Written {
                path: path.clone(),
                bytes: 11
            }
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "export {};\n");
        assert!(!dir.path().join("frontend/src/types/doctypes.ts.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_replaces_previous_content() {
        let storage = Arc::new(MemoryStorage::new().with_file("/out/doctypes.ts", "old"));
        let writer = FileWriter::new(storage.clone(), false);

        writer.write(Path::new("/out/doctypes.ts"), "new").await.unwrap();

        assert_eq!(storage.contents("/out/doctypes.ts").as_deref(), Some("new"));
        assert_eq!(storage.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_storage_untouched() {
        let storage = Arc::new(MemoryStorage::new());
        let path = Path::new("/out/doctypes.ts");

        let result = FileWriter::new(storage.clone(), true)
            .write(path, "content")
            .await
            .unwrap();

        assert!(!result.was_written());
        assert_eq!(
            result,
            WriteResult::DryRun {
                content: "content".to_string(),
                path: path.to_path_buf(),
            }
        );
        assert_eq!(storage.stats().writes, 0);
        assert_eq!(storage.contents(path), None);
    }

    #[tokio::test]
    async fn test_write_failure_names_the_file() {
        let dir = TempDir::new().unwrap();
        // The target is an existing directory, so the rename fails.
        let path = dir.path().join("doctypes.ts");
        std::fs::create_dir(&path).unwrap();

        let err = FileWriter::new(Arc::new(FsStorage::new()), false)
            .write(&path, "x")
            .await
            .unwrap_err();

        match err {
            CliError::Write(WriteError::WriteFile { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("doctypes.ts.tmp").exists());
    }
}
