//! TypeScript interface emitter.
//!
//! Renders a [`DoctypeSchema`] into one self-contained interface block:
//!
//! ```text
//! // Last updated: 2024-01-01 10:00:00
//! export interface ItemTax extends ChildDocType {
//!   /** Tax Type: Link (Account) */
//!   tax_type: string;
//! }
//! ```
//!
//! The first line is the change marker that the incremental merge compares
//! against on the next run.

use crate::mapper::map_field;
use crate::schema::DoctypeSchema;

/// Prefix of the marker line that opens every generated block.
pub const MARKER_PREFIX: &str = "// Last updated: ";

/// Base interface extended by regular doctypes.
pub const DOCTYPE_BASE: &str = "DocType";

/// Base interface extended by child table doctypes.
pub const CHILD_DOCTYPE_BASE: &str = "ChildDocType";

/// The two base declarations written at the top of every output file.
pub const BASE_INTERFACES: &str = "interface DocType {
  name: string;
  creation: string;
  modified: string;
  owner: string;
  modified_by: string;
}

interface ChildDocType extends DocType {
  parent?: string;
  parentfield?: string;
  parenttype?: string;
  idx?: number;
}
";

const INDENT: &str = "  ";

/// An emitted interface block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedInterface {
    /// Interface name.
    pub name: String,

    /// The `modified` timestamp embedded in the marker line.
    pub last_updated: String,

    /// Full block text, ending with a newline.
    pub block: String,

    /// Child doctypes referenced by table fields, in field order, as written
    /// in the schema.
    pub related: Vec<String>,
}

/// Render the marker line for a timestamp (without newline).
pub fn marker_line(modified: &str) -> String {
    format!("{MARKER_PREFIX}{modified}")
}

/// Emits interface blocks from doctype schemas.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterfaceEmitter;

impl InterfaceEmitter {
    pub fn new() -> Self {
        Self
    }

    /// Render the interface block for `schema`.
    pub fn emit(&self, schema: &DoctypeSchema) -> EmittedInterface {
        let name = schema.interface_name();
        let base = if schema.is_table {
            CHILD_DOCTYPE_BASE
        } else {
            DOCTYPE_BASE
        };

        let mut block = format!(
            "{}\nexport interface {} extends {} {{\n",
            marker_line(&schema.modified),
            name,
            base
        );
        let mut related = Vec::new();

        for mapped in schema.fields.iter().filter_map(map_field) {
            block.push_str(&mapped.render(INDENT));
            if let Some(child) = mapped.related {
                related.push(child);
            }
        }
        block.push_str("}\n");

        EmittedInterface {
            name,
            last_updated: schema.modified.clone(),
            block,
            related,
        }
    }
}
