//! Doctype schema model and loader.
//!
//! A doctype is described by a JSON file such as
//! `erpnext/accounts/doctype/item_tax/item_tax.json`. Only the keys the
//! compiler needs are modelled; everything else in the file is ignored.

use crate::error::{CliResult, SchemaError};
use crate::storage::Storage;
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// A parsed doctype schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DoctypeSchema {
    /// Display name, e.g. `"Sales Invoice Item"`.
    pub name: String,

    /// Last modification timestamp, used verbatim as the change marker.
    pub modified: String,

    /// Whether this doctype is a child table.
    #[serde(rename = "istable", default, deserialize_with = "flag")]
    pub is_table: bool,

    /// Fields in file order.
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// A single field of a doctype.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSchema {
    pub fieldname: String,

    /// Field kind, e.g. `"Data"`, `"Select"`, `"Table"`.
    pub fieldtype: String,

    #[serde(default, deserialize_with = "nullable_string")]
    pub label: String,

    /// Select choices (newline-delimited) or the related doctype name.
    #[serde(default)]
    pub options: Option<String>,

    #[serde(rename = "reqd", default, deserialize_with = "flag")]
    pub required: bool,
}

impl DoctypeSchema {
    /// Parse a schema from JSON text.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Name of the generated interface: the doctype name without whitespace.
    pub fn interface_name(&self) -> String {
        strip_whitespace(&self.name)
    }
}

impl FieldSchema {
    /// The `options` value, treating an empty string as absent.
    pub fn options(&self) -> Option<&str> {
        self.options.as_deref().filter(|o| !o.is_empty())
    }
}

/// Remove every whitespace character from a name.
pub fn strip_whitespace(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalize a related doctype name to its on-disk directory name:
/// `"Sales Taxes"` becomes `"sales_taxes"`.
pub fn doctype_dir_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// A string that may also be written as `null`.
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `true`/`false`, `0`/`1`, `null` and numeric strings.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty() && s != "0",
        Some(_) => true,
    })
}

/// Reads doctype schemas through a [`Storage`].
pub struct SchemaLoader<'a> {
    storage: &'a dyn Storage,
}

impl<'a> SchemaLoader<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Read and parse the schema at `path`.
    ///
    /// Both unreadable files and malformed JSON are errors: the file was
    /// located, so its absence or corruption is not expected.
    pub async fn load(&self, path: &Path) -> CliResult<DoctypeSchema> {
        let content = self
            .storage
            .read_to_string(path)
            .await
            .map_err(|source| SchemaError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let schema = DoctypeSchema::from_json(&content)
            .map_err(|e| SchemaError::invalid_json(path, e.to_string()))?;

        tracing::trace!(path = %path.display(), doctype = %schema.name, "loaded schema");
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use crate::storage::MemoryStorage;

    const ITEM_TAX: &str = r#"{
        "name": "Item Tax",
        "modified": "2024-01-01 10:00:00",
        "istable": 1,
        "doctype": "DocType",
        "fields": [
            {"fieldname": "tax_type", "fieldtype": "Link", "label": "Tax Type", "options": "Account", "reqd": 1},
            {"fieldname": "tax_rate", "fieldtype": "Float", "label": "Tax Rate"}
        ]
    }"#;

    #[test]
    fn test_parse_schema() {
        let schema = DoctypeSchema::from_json(ITEM_TAX).unwrap();

        assert_eq!(schema.name, "Item Tax");
        assert_eq!(schema.modified, "2024-01-01 10:00:00");
        assert!(schema.is_table);
        assert_eq!(schema.fields.len(), 2);
        assert!(schema.fields[0].required);
        assert_eq!(schema.fields[0].options(), Some("Account"));
        assert!(!schema.fields[1].required);
        assert_eq!(schema.fields[1].options(), None);
    }

    #[test]
    fn test_flags_accept_booleans_and_absence() {
        let schema = DoctypeSchema::from_json(
            r#"{"name": "User", "modified": "x", "istable": false,
                "fields": [{"fieldname": "a", "fieldtype": "Data", "reqd": true},
                           {"fieldname": "b", "fieldtype": "Data", "reqd": 0},
                           {"fieldname": "c", "fieldtype": "Data", "reqd": null}]}"#,
        )
        .unwrap();

        assert!(!schema.is_table);
        assert!(schema.fields[0].required);
        assert!(!schema.fields[1].required);
        assert!(!schema.fields[2].required);
        assert_eq!(schema.fields[0].label, "");
    }

    #[test]
    fn test_null_label_and_options_are_empty() {
        let schema = DoctypeSchema::from_json(
            r#"{"name": "Note", "modified": "x",
                "fields": [{"fieldname": "title", "fieldtype": "Data", "label": null, "options": null}]}"#,
        )
        .unwrap();

        assert_eq!(schema.fields[0].label, "");
        assert_eq!(schema.fields[0].options(), None);
    }

    #[test]
    fn test_missing_fields_is_empty() {
        let schema = DoctypeSchema::from_json(r#"{"name": "Note", "modified": "x"}"#).unwrap();
        assert!(schema.fields.is_empty());
        assert!(!schema.is_table);
    }

    #[test]
    fn test_empty_options_are_absent() {
        let field = FieldSchema {
            fieldname: "status".to_string(),
            fieldtype: "Select".to_string(),
            label: "Status".to_string(),
            options: Some(String::new()),
            required: false,
        };
        assert_eq!(field.options(), None);
    }

    #[test]
    fn test_interface_name_strips_whitespace() {
        let schema = DoctypeSchema::from_json(
            r#"{"name": "Sales Invoice\tItem ", "modified": "x"}"#,
        )
        .unwrap();
        assert_eq!(schema.interface_name(), "SalesInvoiceItem");
    }

    #[test]
    fn test_doctype_dir_name() {
        assert_eq!(doctype_dir_name("Sales Taxes and Charges"), "sales_taxes_and_charges");
        assert_eq!(doctype_dir_name("Item"), "item");
    }

    #[tokio::test]
    async fn test_loader_reads_schema() {
        let storage = MemoryStorage::new().with_file("/apps/erp/item_tax.json", ITEM_TAX);
        let loader = SchemaLoader::new(&storage);

        let schema = loader.load(Path::new("/apps/erp/item_tax.json")).await.unwrap();

        assert_eq!(schema.interface_name(), "ItemTax");
    }

    #[tokio::test]
    async fn test_loader_rejects_malformed_json() {
        let storage = MemoryStorage::new().with_file("/apps/erp/broken.json", "{\"name\": ");
        let loader = SchemaLoader::new(&storage);

        let err = loader.load(Path::new("/apps/erp/broken.json")).await.unwrap_err();

        assert!(matches!(err, CliError::Schema(SchemaError::InvalidJson { .. })));
    }

    #[tokio::test]
    async fn test_loader_reports_missing_file() {
        let storage = MemoryStorage::new();
        let loader = SchemaLoader::new(&storage);

        let err = loader.load(Path::new("/gone.json")).await.unwrap_err();

        assert!(matches!(err, CliError::Schema(SchemaError::Io { .. })));
    }
}
