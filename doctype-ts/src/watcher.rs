//! Schema watching for `generate --watch`.
//!
//! Changes below the apps directory are debounced and delivered as one
//! [`WatchEvent::Changed`] batch per debounce window, so a burst of saves
//! triggers a single regeneration.

use crate::error::{CliResult, WatchError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

/// A schema file that changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    /// Application directory the file lives in.
    pub app: String,
    /// Doctype directory name, e.g. `sales_invoice`.
    pub doctype: String,
    pub path: PathBuf,
    /// The file no longer exists.
    pub removed: bool,
}

impl SchemaChange {
    /// Classify `path` below `root`.
    ///
    /// Only `<root>/<app>/**/doctype/<name>/<name>.json` qualifies; editor
    /// backups, controllers and fixtures are ignored.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let components: Vec<&str> = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;

        let [app, .., marker, dir, file] = components.as_slice() else {
            return None;
        };
        if *marker != "doctype" || file.strip_suffix(".json") != Some(*dir) {
            return None;
        }

        Some(Self {
            app: app.to_string(),
            doctype: dir.to_string(),
            path: path.to_path_buf(),
            removed: !path.exists(),
        })
    }
}

/// What the watcher delivers.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// Schema files changed within one debounce window.
    Changed(Vec<SchemaChange>),
    /// The underlying watcher reported an error.
    Error(String),
}

/// Debounced watcher over an apps directory.
pub struct FileWatcher {
    root: PathBuf,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            debounce: Duration::from_millis(500),
        }
    }

    /// Override the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start watching.
    ///
    /// The returned debouncer stops watching when dropped.
    pub fn watch(&self) -> CliResult<(Debouncer<RecommendedWatcher>, Receiver<WatchEvent>)> {
        let (tx, rx) = channel();
        let root = self.root.clone();

        let mut debouncer = new_debouncer(
            self.debounce,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| {
                let event = match result {
                    Ok(events) => {
                        let changes = collect_changes(&root, events.iter().map(|e| e.path.as_path()));
                        if changes.is_empty() {
                            return;
                        }
                        WatchEvent::Changed(changes)
                    }
                    Err(e) => WatchEvent::Error(e.to_string()),
                };
                let _ = tx.send(event);
            },
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Init(e.to_string()))?;

        tracing::debug!(root = %self.root.display(), debounce = ?self.debounce, "watching schemas");
        Ok((debouncer, rx))
    }
}

/// Schema changes among `paths`, deduplicated, in first-seen order.
pub fn collect_changes<'a>(root: &Path, paths: impl IntoIterator<Item = &'a Path>) -> Vec<SchemaChange> {
    let mut changes: Vec<SchemaChange> = Vec::new();
    for change in paths.into_iter().filter_map(|p| SchemaChange::from_path(root, p)) {
        if !changes.iter().any(|c| c.path == change.path) {
            changes.push(change);
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_change_from_path() {
        let root = Path::new("/bench/apps");
        let path = Path::new("/bench/apps/erpnext/erpnext/accounts/doctype/item_tax/item_tax.json");

        let change = SchemaChange::from_path(root, path).unwrap();
        assert_eq!(change.app, "erpnext");
        assert_eq!(change.doctype, "item_tax");
        assert_eq!(change.path, path);
        assert!(change.removed);
    }

    #[test]
    fn test_schema_change_ignores_other_files() {
        let root = Path::new("/apps");
        for path in [
            "/apps/erp/doctype/item/item.py",
            "/apps/erp/doctype/item/other.json",
            "/apps/erp/fixtures/item/item.json",
            "/apps/item.json",
            "/elsewhere/erp/doctype/item/item.json",
        ] {
            assert_eq!(SchemaChange::from_path(root, Path::new(path)), None, "{path}");
        }
    }

    #[test]
    fn test_collect_changes_dedups() {
        let root = Path::new("/apps");
        let paths = [
            Path::new("/apps/erp/doctype/item/item.json"),
            Path::new("/apps/erp/doctype/item/item.js"),
            Path::new("/apps/erp/doctype/item/item.json"),
            Path::new("/apps/crm/doctype/lead/lead.json"),
        ];

        let changes = collect_changes(root, paths);
        let doctypes: Vec<_> = changes.iter().map(|c| c.doctype.as_str()).collect();
        assert_eq!(doctypes, vec!["item", "lead"]);
    }

    #[test]
    fn test_schema_change_reports_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let schema_dir = dir.path().join("erp/doctype/item");
        std::fs::create_dir_all(&schema_dir).unwrap();
        let path = schema_dir.join("item.json");
        std::fs::write(&path, "{}").unwrap();

        let change = SchemaChange::from_path(dir.path(), &path).unwrap();
        assert!(!change.removed);
    }

    #[test]
    fn test_file_watcher_builder() {
        let watcher = FileWatcher::new("/apps").with_debounce(Duration::from_secs(1));
        assert_eq!(watcher.root(), Path::new("/apps"));
        assert_eq!(watcher.debounce, Duration::from_secs(1));
    }
}
