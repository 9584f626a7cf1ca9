//! Generated output model and the parser for previously generated files.
//!
//! The output file is plain TypeScript, not a serialization format, so the
//! previous run's blocks are recovered by shape: a marker line immediately
//! followed by an exported interface declaration, up to the closing brace
//! line. Anything else in the file (the base declarations, hand edits) is
//! ignored.

use crate::emitter::{EmittedInterface, BASE_INTERFACES};
use crate::error::{CliResult, WriteError};
use crate::storage::Storage;
use regex::Regex;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

/// One interface block of the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedInterface {
    /// Interface name.
    pub name: String,

    /// Timestamp carried by the marker line.
    pub last_updated: String,

    /// Verbatim block text, ending with a newline.
    pub block: String,
}

impl From<EmittedInterface> for GeneratedInterface {
    fn from(emitted: EmittedInterface) -> Self {
        Self {
            name: emitted.name,
            last_updated: emitted.last_updated,
            block: emitted.block,
        }
    }
}

/// Interface blocks keyed by name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSet {
    order: Vec<String>,
    entries: HashMap<String, GeneratedInterface>,
}

impl InterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a block. A replaced block keeps its position.
    pub fn insert(&mut self, interface: GeneratedInterface) {
        if !self.entries.contains_key(&interface.name) {
            self.order.push(interface.name.clone());
        }
        self.entries.insert(interface.name.clone(), interface);
    }

    pub fn get(&self, name: &str) -> Option<&GeneratedInterface> {
        self.entries.get(name)
    }

    /// Whether a block for `name` exists and was generated from `modified`.
    pub fn is_current(&self, name: &str, modified: &str) -> bool {
        self.get(name)
            .is_some_and(|existing| existing.last_updated == modified)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Blocks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedInterface> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    /// Interface names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Render the full output file: base declarations, then every block.
    pub fn render(&self) -> String {
        std::iter::once(BASE_INTERFACES)
            .chain(self.iter().map(|i| i.block.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^// Last updated: (.+)$").expect("valid marker regex"))
}

fn declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^export interface\s+(\w+)\s+extends\s+\w+\s+\{$")
            .expect("valid declaration regex")
    })
}

fn strip_newline(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Parser for previously generated output.
pub struct ExistingOutput;

impl ExistingOutput {
    /// Extract every interface block from `content`, in file order.
    pub fn parse(content: &str) -> InterfaceSet {
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let mut set = InterfaceSet::new();
        let mut i = 0;

        while i + 1 < lines.len() {
            let header = marker_regex()
                .captures(strip_newline(lines[i]))
                .zip(declaration_regex().captures(strip_newline(lines[i + 1])));

            let Some((marker, declaration)) = header else {
                i += 1;
                continue;
            };

            let Some(close) = (i + 2..lines.len()).find(|&j| strip_newline(lines[j]) == "}") else {
                i += 1;
                continue;
            };

            let mut block: String = lines[i..=close].concat();
            if !block.ends_with('\n') {
                block.push('\n');
            }

            set.insert(GeneratedInterface {
                name: declaration[1].to_string(),
                last_updated: marker[1].to_string(),
                block,
            });
            i = close + 1;
        }

        set
    }

    /// Load and parse the output file at `path`.
    ///
    /// A missing file is an empty baseline; any other read failure is an error.
    pub async fn load(storage: &dyn Storage, path: &Path) -> CliResult<InterfaceSet> {
        match storage.read(path).await {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                let set = Self::parse(&content);
                tracing::debug!(
                    path = %path.display(),
                    interfaces = set.len(),
                    "loaded existing output"
                );
                Ok(set)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no existing output");
                Ok(InterfaceSet::new())
            }
            Err(source) => Err(WriteError::ReadExisting {
                path: path.to_path_buf(),
                source,
            }
            .into()),
        }
    }
}
