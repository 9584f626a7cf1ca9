//! # doctype-ts
//!
//! Incremental compiler from doctype JSON schemas to TypeScript interfaces.
//!
//! Doctypes are described by JSON files spread across application
//! directories (`<apps>/<app>/**/doctype/<name>/<name>.json`). This crate
//! turns a set of root doctypes, plus every child doctype reachable through
//! table fields, into one TypeScript file of `export interface` blocks, and
//! on later runs regenerates only the blocks whose schema `modified`
//! timestamp changed.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`mapper`] - Field kind to TypeScript type mapping
//! - [`schema`] - Doctype schema model and loading
//! - [`locator`] - Schema file discovery below application roots
//! - [`emitter`] - Interface block rendering
//! - [`output`] - Parsing of previously generated output
//! - [`generator`] - Concurrent resolution and incremental merge
//! - [`writer`] - Atomic output with dry-run support
//! - [`storage`] - File system abstraction
//! - [`status`] - Progress reporting
//! - [`config`] - Configuration management and TOML parsing
//! - [`watcher`] - File system watching for development mode
//! - [`error`] - Error types and handling

pub mod config;
pub mod emitter;
pub mod error;
pub mod generator;
pub mod locator;
pub mod mapper;
pub mod output;
pub mod schema;
pub mod status;
pub mod storage;
pub mod watcher;
pub mod writer;

// Re-export main types for convenience
pub use config::{Config, ConfigManager};
pub use emitter::InterfaceEmitter;
pub use error::{CliError, CliResult};
pub use generator::{AppDoctypeMap, DoctypeGenerator, GenerateReport, GeneratorOptions};
pub use locator::DoctypeLocator;
pub use output::{ExistingOutput, GeneratedInterface, InterfaceSet};
pub use schema::{DoctypeSchema, FieldSchema};
pub use status::{StatusSink, TracingStatus};
pub use storage::{FsStorage, MemoryStorage, Storage};
pub use watcher::FileWatcher;
pub use writer::FileWriter;
