//! Field kind to TypeScript type mapping.
//!
//! Every doctype field kind maps to a rendering rule through the closed
//! [`FieldKind`] enum. Kinds this compiler does not know about fall back to
//! `any` instead of failing.

use crate::schema::{strip_whitespace, FieldSchema};

/// Doctype field kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    // Layout only, never rendered.
    SectionBreak,
    ColumnBreak,
    TabBreak,
    Html,
    Button,

    // Rendered as `string`.
    Data,
    TextEditor,
    Link,
    DynamicLink,
    /// `"YYYY-MM-DD HH:MM:SS"`
    Datetime,
    /// `"YYYY-MM-DD"`
    Date,
    AttachImage,
    SmallText,
    Color,
    Text,
    Autocomplete,
    Password,
    Code,
    ReadOnly,

    // Rendered as `number`.
    Percent,
    Int,
    Float,

    Check,
    Select,
    Table,
    TableMultiSelect,

    /// Any kind not listed above.
    Other(String),
}

impl FieldKind {
    /// Parse the `fieldtype` string of a field.
    pub fn parse(fieldtype: &str) -> Self {
        match fieldtype {
            "Section Break" => Self::SectionBreak,
            "Column Break" => Self::ColumnBreak,
            "Tab Break" => Self::TabBreak,
            "HTML" => Self::Html,
            "Button" => Self::Button,
            "Data" => Self::Data,
            "Text Editor" => Self::TextEditor,
            "Link" => Self::Link,
            "Dynamic Link" => Self::DynamicLink,
            "Datetime" => Self::Datetime,
            "Date" => Self::Date,
            "Attach Image" => Self::AttachImage,
            "Small Text" => Self::SmallText,
            "Color" => Self::Color,
            "Text" => Self::Text,
            "Autocomplete" => Self::Autocomplete,
            "Password" => Self::Password,
            "Code" => Self::Code,
            "Read Only" => Self::ReadOnly,
            "Percent" => Self::Percent,
            "Int" => Self::Int,
            "Float" => Self::Float,
            "Check" => Self::Check,
            "Select" => Self::Select,
            "Table" => Self::Table,
            "Table MultiSelect" => Self::TableMultiSelect,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the kind only affects form layout.
    pub fn is_layout(&self) -> bool {
        matches!(
            self,
            Self::SectionBreak | Self::ColumnBreak | Self::TabBreak | Self::Html | Self::Button
        )
    }

    /// Whether the kind holds rows of another (child) doctype.
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::TableMultiSelect)
    }

    /// Whether the kind points at another doctype through `options`.
    pub fn is_relational(&self) -> bool {
        self.is_table() || matches!(self, Self::Link | Self::DynamicLink)
    }

    /// Base TypeScript type, ignoring `options`.
    fn base_type(&self) -> &'static str {
        match self {
            Self::Data
            | Self::TextEditor
            | Self::Link
            | Self::DynamicLink
            | Self::Datetime
            | Self::Date
            | Self::AttachImage
            | Self::SmallText
            | Self::Color
            | Self::Text
            | Self::Autocomplete
            | Self::Password
            | Self::Code
            | Self::ReadOnly => "string",
            Self::Percent | Self::Int | Self::Float => "number",
            Self::Check => "0 | 1",
            Self::Table | Self::TableMultiSelect => "any[]",
            _ => "any",
        }
    }
}

/// A field rendered as an interface member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedField {
    /// Member name.
    pub name: String,

    /// TypeScript type expression.
    pub ts_type: String,

    /// Doc comment, including the `/** */` delimiters.
    pub doc: String,

    /// Whether the member carries the `?` marker.
    pub optional: bool,

    /// Child doctype to resolve, for table fields with `options`.
    pub related: Option<String>,
}

impl MappedField {
    /// Render the two member lines (doc comment and declaration), indented.
    pub fn render(&self, indent: &str) -> String {
        format!(
            "{indent}{}\n{indent}{}{}: {};\n",
            self.doc,
            self.name,
            if self.optional { "?" } else { "" },
            self.ts_type
        )
    }
}

/// Map a field to its interface member. Layout-only fields yield `None`.
pub fn map_field(field: &FieldSchema) -> Option<MappedField> {
    let kind = FieldKind::parse(&field.fieldtype);
    if kind.is_layout() {
        return None;
    }

    let options = field.options();
    let mut related = None;

    let ts_type = match (&kind, options) {
        (FieldKind::Select, Some(options)) => select_union(options),
        (k, Some(options)) if k.is_table() => {
            related = Some(options.to_string());
            format!("{}[]", strip_whitespace(options))
        }
        (k, _) => k.base_type().to_string(),
    };

    let doc = match options {
        Some(options) if kind.is_relational() => {
            format!("/** {}: {} ({}) */", field.label, field.fieldtype, options)
        }
        _ => format!("/** {}: {} */", field.label, field.fieldtype),
    };

    Some(MappedField {
        name: field.fieldname.clone(),
        ts_type,
        doc,
        optional: !(field.required || kind == FieldKind::Check),
        related,
    })
}

/// `'A' | 'B' | ...` over newline-delimited options, order and duplicates kept.
fn select_union(options: &str) -> String {
    options
        .split('\n')
        .map(|option| format!("'{}'", option))
        .collect::<Vec<_>>()
        .join(" | ")
}
