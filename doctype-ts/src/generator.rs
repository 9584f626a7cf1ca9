//! Incremental interface generation.
//!
//! [`DoctypeGenerator`] drives one run:
//!
//! 1. load the interfaces of the previous output file,
//! 2. resolve every requested doctype concurrently, following table fields
//!    into child doctypes,
//! 3. regenerate only the doctypes whose `modified` timestamp differs from the
//!    marker of their previous block,
//! 4. write the merged file once, or not at all when nothing changed.
//!
//! All futures of a run are polled on a single task, so the shared state is
//! kept in `RefCell`/`Cell` and no borrow is ever held across an `.await`.

use crate::emitter::InterfaceEmitter;
use crate::error::CliResult;
use crate::locator::DoctypeLocator;
use crate::output::{ExistingOutput, InterfaceSet};
use crate::schema::{doctype_dir_name, SchemaLoader};
use crate::status::StatusSink;
use crate::storage::Storage;
use crate::writer::{FileWriter, WriteResult};
use futures::future::{try_join_all, FutureExt, LocalBoxFuture};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Root doctypes to compile, per application.
pub type AppDoctypeMap = BTreeMap<String, Vec<String>>;

/// Inputs of a generator run.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Directory containing one subdirectory per application.
    pub apps_path: PathBuf,

    /// Generated TypeScript file, read at start and rewritten at the end.
    pub output_path: PathBuf,

    /// Compute everything but do not write.
    pub dry_run: bool,
}

impl GeneratorOptions {
    pub fn new(apps_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            apps_path: apps_path.into(),
            output_path: output_path.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Outcome of a generator run.
#[derive(Debug, Clone)]
pub struct GenerateReport {
    /// Interfaces emitted in this run.
    pub changed: usize,

    /// Doctypes whose previous block was still current.
    pub skipped: usize,

    /// Requested doctypes without a schema file, in discovery order.
    pub not_found: Vec<String>,

    /// Interfaces in the merged output.
    pub total: usize,

    /// The write, if anything changed.
    pub write: Option<WriteResult>,
}

impl GenerateReport {
    /// Whether the run produced any change.
    pub fn has_changes(&self) -> bool {
        self.changed > 0
    }
}

/// One incremental generation run.
///
/// A generator is consumed by [`DoctypeGenerator::run`]; its processed set
/// and locator cache never outlive the run.
pub struct DoctypeGenerator {
    storage: Arc<dyn Storage>,
    status: Arc<dyn StatusSink>,
    output_path: PathBuf,
    writer: FileWriter,
    locator: DoctypeLocator,
    emitter: InterfaceEmitter,
    processed: RefCell<HashSet<String>>,
    interfaces: RefCell<InterfaceSet>,
    not_found: RefCell<Vec<String>>,
    changed: Cell<usize>,
    skipped: Cell<usize>,
}

impl DoctypeGenerator {
    /// Create a generator for one run.
    pub fn new(
        storage: Arc<dyn Storage>,
        status: Arc<dyn StatusSink>,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            locator: DoctypeLocator::new(storage.clone(), options.apps_path),
            writer: FileWriter::new(storage.clone(), options.dry_run),
            storage,
            status,
            output_path: options.output_path,
            emitter: InterfaceEmitter::new(),
            processed: RefCell::new(HashSet::new()),
            interfaces: RefCell::new(InterfaceSet::new()),
            not_found: RefCell::new(Vec::new()),
            changed: Cell::new(0),
            skipped: Cell::new(0),
        }
    }

    /// Generate interfaces for every doctype in `apps` and their children.
    pub async fn run(self, apps: &AppDoctypeMap) -> CliResult<GenerateReport> {
        let existing = ExistingOutput::load(self.storage.as_ref(), &self.output_path).await?;
        *self.interfaces.borrow_mut() = existing;

        let generator = &self;
        let roots = apps.iter().flat_map(|(app, doctypes)| {
            doctypes
                .iter()
                .map(move |doctype| generator.resolve(app, doctype.clone()))
        });
        try_join_all(roots).await?;

        let changed = self.changed.get();
        let total = self.interfaces.borrow().len();
        tracing::info!(
            changed,
            skipped = self.skipped.get(),
            not_found = self.not_found.borrow().len(),
            total,
            "resolved doctypes"
        );

        let write = if changed == 0 {
            self.status.info("No new schema changes.");
            None
        } else {
            let content = self.interfaces.borrow().render();
            let result = self.writer.write(&self.output_path, &content).await?;
            let plural = if changed == 1 { "" } else { "s" };
            if result.was_written() {
                self.status.succeed(&format!(
                    "Updated {changed} interface{plural}. Output file updated."
                ));
            } else {
                self.status
                    .info(&format!("Would update {changed} interface{plural}."));
            }
            Some(result)
        };

        Ok(GenerateReport {
            changed,
            skipped: self.skipped.get(),
            not_found: self.not_found.take(),
            total,
            write,
        })
    }

    /// Resolve one doctype, then its child doctypes. Idempotent per run.
    fn resolve<'a>(&'a self, app: &'a str, doctype: String) -> LocalBoxFuture<'a, CliResult<()>> {
        async move {
            // Must happen before the first await.
            if !self.processed.borrow_mut().insert(doctype.clone()) {
                return Ok(());
            }

            let Some(path) = self.locator.locate(app, &doctype).await? else {
                self.status
                    .update(&format!("Processing: {doctype} [not found]"));
                self.not_found.borrow_mut().push(doctype);
                return Ok(());
            };

            let schema = SchemaLoader::new(self.storage.as_ref()).load(&path).await?;
            let name = schema.interface_name();

            if self.interfaces.borrow().is_current(&name, &schema.modified) {
                self.skipped.set(self.skipped.get() + 1);
                self.status.update(&format!("Processing: {doctype} [skipped]"));
                return Ok(());
            }

            let emitted = self.emitter.emit(&schema);
            let children: Vec<String> = emitted.related.iter().map(|c| doctype_dir_name(c)).collect();
            self.status.update(&format!("Processing: {doctype} [updated]"));
            tracing::debug!(app, doctype = %doctype, interface = %name, children = children.len(), "emitted interface");

            try_join_all(children.into_iter().map(|child| self.resolve(app, child))).await?;

            // Children first, so a fresh file declares them before their parent.
            self.interfaces.borrow_mut().insert(emitted.into());
            self.changed.set(self.changed.get() + 1);
            Ok(())
        }
        .boxed_local()
    }
}
