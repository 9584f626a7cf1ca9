//! Doctype schema file discovery.
//!
//! A doctype `item_tax` of application `erpnext` lives somewhere below
//! `<apps>/erpnext` at `.../doctype/item_tax/item_tax.json`. The locator walks
//! the application tree depth-first, in listing order, and returns the first
//! match. Results, including misses, are cached for the lifetime of the
//! locator.

use crate::error::{CliResult, LocateError};
use crate::storage::{DirEntry, Storage};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Finds doctype schema files below application roots.
///
/// Not `Sync`: one locator belongs to one generator run.
pub struct DoctypeLocator {
    storage: Arc<dyn Storage>,
    apps_path: PathBuf,
    cache: RefCell<HashMap<(String, String), Option<PathBuf>>>,
    walks: Cell<usize>,
}

impl DoctypeLocator {
    /// Create a locator searching below `apps_path`.
    pub fn new(storage: Arc<dyn Storage>, apps_path: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            apps_path: apps_path.into(),
            cache: RefCell::new(HashMap::new()),
            walks: Cell::new(0),
        }
    }

    /// Path suffix identifying the schema file of `doctype`.
    pub fn target_suffix(doctype: &str) -> PathBuf {
        Path::new("doctype")
            .join(doctype)
            .join(format!("{doctype}.json"))
    }

    /// Find the schema file of `doctype` in application `app`.
    ///
    /// Returns `Ok(None)` when no file matches, including when the application
    /// directory itself does not exist.
    pub async fn locate(&self, app: &str, doctype: &str) -> CliResult<Option<PathBuf>> {
        let key = (app.to_string(), doctype.to_string());
        if let Some(cached) = self.cache.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let found = self.walk(&self.apps_path.join(app), doctype).await?;
        tracing::debug!(
            app,
            doctype,
            found = ?found.as_ref().map(|p| p.display().to_string()),
            "located doctype"
        );

        self.cache.borrow_mut().insert(key, found.clone());
        Ok(found)
    }

    /// Number of directory walks performed (cache misses).
    pub fn walks(&self) -> usize {
        self.walks.get()
    }

    async fn walk(&self, root: &Path, doctype: &str) -> CliResult<Option<PathBuf>> {
        self.walks.set(self.walks.get() + 1);
        let target = Self::target_suffix(doctype);

        let root_entries = match self.storage.list_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(root = %root.display(), "application directory not found");
                return Ok(None);
            }
            Err(e) => return Err(LocateError::io(root, e).into()),
        };

        let mut stack: Vec<std::vec::IntoIter<DirEntry>> = vec![root_entries.into_iter()];
        while let Some(level) = stack.last_mut() {
            let Some(entry) = level.next() else {
                stack.pop();
                continue;
            };

            if entry.is_dir {
                let children = self
                    .storage
                    .list_dir(&entry.path)
                    .await
                    .map_err(|e| LocateError::io(&entry.path, e))?;
                stack.push(children.into_iter());
            } else if entry.path.ends_with(&target) {
                return Ok(Some(entry.path));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use crate::storage::{FsStorage, MemoryStorage};

    fn storage() -> Arc<MemoryStorage> {
        Arc::new(
            MemoryStorage::new()
                .with_file("/apps/erpnext/erpnext/accounts/doctype/item_tax/item_tax.json", "{}")
                .with_file("/apps/erpnext/erpnext/accounts/doctype/item_tax/item_tax.py", "")
                .with_file("/apps/erpnext/erpnext/stock/doctype/item/item.json", "{}")
                .with_file("/apps/erpnext/erpnext/stock/doctype/item/test_item.json", "{}")
                .with_file("/apps/frappe/frappe/core/doctype/user/user.json", "{}"),
        )
    }

    #[tokio::test]
    async fn test_locate_finds_nested_schema() {
        let locator = DoctypeLocator::new(storage(), "/apps");

        let path = locator.locate("erpnext", "item_tax").await.unwrap();

        assert_eq!(
            path,
            Some(PathBuf::from(
                "/apps/erpnext/erpnext/accounts/doctype/item_tax/item_tax.json"
            ))
        );
    }

    #[tokio::test]
    async fn test_locate_is_scoped_to_application() {
        let locator = DoctypeLocator::new(storage(), "/apps");

        assert!(locator.locate("erpnext", "user").await.unwrap().is_none());
        assert!(locator.locate("frappe", "user").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_locate_requires_full_components() {
        let storage = Arc::new(
            MemoryStorage::new().with_file("/apps/erp/mydoctype/item/item.json", "{}"),
        );
        let locator = DoctypeLocator::new(storage, "/apps");

        assert!(locator.locate("erp", "item").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_locate_caches_hits_and_misses() {
        let storage = storage();
        let locator = DoctypeLocator::new(storage.clone(), "/apps");

        locator.locate("erpnext", "item").await.unwrap();
        locator.locate("erpnext", "missing").await.unwrap();
        let listings = storage.stats().listings;

        assert!(locator.locate("erpnext", "item").await.unwrap().is_some());
        assert!(locator.locate("erpnext", "missing").await.unwrap().is_none());

        assert_eq!(locator.walks(), 2);
        assert_eq!(storage.stats().listings, listings);
    }

    #[tokio::test]
    async fn test_missing_application_is_not_found() {
        let locator = DoctypeLocator::new(storage(), "/apps");

        assert_eq!(locator.locate("hrms", "employee").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_fatal() {
        let storage = storage();
        storage.fail_listing("/apps/erpnext/erpnext/stock", io::ErrorKind::PermissionDenied);
        let locator = DoctypeLocator::new(storage, "/apps");

        let err = locator.locate("erpnext", "item").await.unwrap_err();

        match err {
            CliError::Locate(LocateError::Io { path, source }) => {
                assert_eq!(path, PathBuf::from("/apps/erpnext/erpnext/stock"));
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreadable_application_root_is_fatal() {
        let storage = storage();
        storage.fail_listing("/apps/frappe", io::ErrorKind::PermissionDenied);
        let locator = DoctypeLocator::new(storage, "/apps");

        assert!(matches!(
            locator.locate("frappe", "user").await,
            Err(CliError::Locate(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_does_not_hide_application() {
        let dir = tempfile::TempDir::new().unwrap();
        let schema_dir = dir.path().join("erp/erp/core/doctype/user");
        std::fs::create_dir_all(&schema_dir).unwrap();
        std::fs::write(schema_dir.join("user.json"), "{}").unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("erp/dangling")).unwrap();

        let locator = DoctypeLocator::new(Arc::new(FsStorage::new()), dir.path());

        assert_eq!(
            locator.locate("erp", "user").await.unwrap(),
            Some(schema_dir.join("user.json"))
        );
    }

    #[test]
    fn test_target_suffix() {
        assert_eq!(
            DoctypeLocator::target_suffix("item"),
            PathBuf::from("doctype/item/item.json")
        );
    }
}
